//! Chat Integration - message dispatch and admission control
//!
//! This crate sits between the chat platform and the task executor:
//! - **Ingress** (`ingress`) - turns raw platform updates into inbound messages
//! - **Admission** (`admission`) - per-sender rate limit and bounded processing slots
//! - **Registration** (`registration`) - player / team member lookup with timeouts
//! - **Router** (`router`) - the per-message pipeline producing a `RoutingResult`
//! - **Runner** (`runner`) - update loop with reconnection and per-message isolation
//!
//! # Architecture
//!
//! ```text
//! Transport → ingress → MessageRouter → admission → registration → classifier → executor
//!                             ↓
//!                    RoutingResult → send_reply
//! ```
//!
//! Admission is always released: the request token and processing slot are
//! RAII guards dropped on every exit path of `MessageRouter::route`.

pub mod admission;
pub mod ingress;
pub mod registration;
pub mod router;
pub mod runner;

pub use admission::{AdmissionGovernor, AdmissionMetrics, AdmissionSettings, RequestToken, SlotPermit};
pub use ingress::{inbound_from_update, ChatRouting, IngressError};
pub use registration::RegistrationResolver;
pub use router::{MessageRouter, RouterMetrics, RouterSettings};
pub use runner::{NoopUpdateTransport, TransportError, UpdateRunner, UpdateTransport};
