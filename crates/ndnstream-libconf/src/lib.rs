//! ndnstream Libconf - Libconfig codec for publisher configuration
//!
//! ndnrtc-client reads its settings from a libconfig document. This crate
//! reads such documents into an order-preserving tree, lets callers mutate
//! a few known settings, and writes the tree back out.
//!
//! ```
//! use ndnstream_libconf::{parse, to_string, Value};
//!
//! let mut doc = parse("general = { log_level = \"default\"; };").unwrap();
//! if let Some(general) = doc.get_mut("general").and_then(Value::as_group_mut) {
//!     general.set("log_path", "/tmp/session");
//! }
//! assert!(to_string(&doc).contains("log_path = \"/tmp/session\";"));
//! ```

pub mod emit;
pub mod error;
pub mod parse;
pub mod value;

pub use emit::to_string;
pub use error::{LibconfError, Result};
pub use parse::parse;
pub use value::{Group, Value};
