//! ndnstream Core - Shared domain types for live NDN publishing sessions
//!
//! This crate provides the domain types shared between the session
//! runtime and the command-line front end:
//! - `video` - Target resolution parsing
//! - `stats` - Statistics lines produced by the publisher
//! - `overlay` - Rendering statistics into the preview overlay text
//! - `naming` - Publishing prefixes and statistics file names
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod error;
pub mod naming;
pub mod overlay;
pub mod stats;
pub mod video;

// Re-exports for convenience
pub use error::{DomainError, DomainResult};
pub use naming::{escape_overlay_text, stat_file_name, PublishingPrefix};
pub use overlay::{caption_for, format_stat_line, render_overlay, CAPTIONS};
pub use stats::{ParseWarning, StatRecord};
pub use video::VideoSize;
