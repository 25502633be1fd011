//! ndnstream Session - Runtime for live NDN publishing sessions
//!
//! This crate wires a camera encoder, a preview player and an NDN publisher
//! together for the duration of one session:
//! - `workspace` - Per-session scratch directory
//! - `pipe` - Named pipes between the children
//! - `atomic` - Crash-safe whole-file replacement
//! - `tailer` - Statistics file follower and overlay renderer
//! - `supervisor` - Child spawning, output draining, ordered shutdown
//! - `invocation` - Command lines for the encoder, player and publisher
//! - `producer` - Publisher configuration document and trust policy
//! - `identity` - Signing identity resolution
//! - `session` - The orchestrator driving all of the above
//! - `command` - Command dispatch for the binary
//!
//! # Architecture
//!
//! ```text
//!                   ┌──────────────┐  camera   ┌────────────────┐
//!   capture ──────▶ │   encoder    │ ────────▶ │   publisher    │
//!   device          │   (ffmpeg)   │   FIFO    │ (ndnrtc-client)│
//!                   └──────┬───────┘           └───────┬────────┘
//!                          │ preview FIFO              │ .stat file
//!                          ▼                           ▼
//!                   ┌──────────────┐  overlay  ┌────────────────┐
//!                   │    player    │ ◀──────── │   StatTailer   │
//!                   │   (ffplay)   │   .txt    │ OverlayRenderer│
//!                   └──────┬───────┘           └────────────────┘
//!                          │ stderr (monitored)
//!                          ▼
//!                   PublishSession
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Teardown failures are logged, never propagated

pub mod atomic;
pub mod command;
pub mod error;
pub mod identity;
pub mod invocation;
pub mod pipe;
pub mod producer;
pub mod session;
pub mod settings;
pub mod supervisor;
pub mod tailer;
pub mod workspace;

// Re-exports for convenience
pub use atomic::write_atomic;
pub use command::{build, CommandKind, CommandRequest, SessionCommand};
pub use error::{Result, SessionError, SetupError};
pub use identity::{resolve_signing_identity, IdentityStore, Ndnsec};
pub use pipe::{create_pipe, Pipe};
pub use producer::ProducerConfig;
pub use session::{PublishOptions, PublishSession, SessionConfig, SessionReport};
pub use settings::{LoadReport, Settings};
pub use supervisor::{
    monitor_primary, InputBinding, MonitorExit, MonitorOptions, OutputBinding, ProcessSpec, ProcessSupervisor, Role,
};
pub use tailer::{LineHandler, OverlayRenderer, StatTailer, TailerState};
pub use workspace::Workspace;
