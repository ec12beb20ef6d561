//! Interpretation side of the message pipeline.
//!
//! - `classifier` decides whether a message is an unambiguous, registry-confirmed
//!   command or needs enhanced interpretation.
//! - `catalog` is the in-memory command registry with the standard command set.
//! - `executor` holds the task executor clients the router delegates to.
//!
//! The executor is a black box: it receives the normalized execution context and
//! returns a reply. Nothing here decides registration or admission.

pub mod catalog;
pub mod classifier;
pub mod executor;

pub use catalog::CommandCatalog;
pub use classifier::{Classification, ClassificationReason, CommandClassifier};
pub use executor::{EchoTaskExecutor, HttpTaskExecutor};
