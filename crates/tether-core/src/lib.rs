//! # Tether Core
//!
//! The result model and resolution machinery behind Tether's handler adapter.
//!
//! A handler returns a [`Reply`]. The reply is admitted through [`resolve`],
//! driven to a [`Resolved`] value by [`settle`] (mappings fan out through
//! [`deep_resolve`]), tagged by [`classify`] and finally written by [`emit`]:
//!
//! ```text
//! Reply ──resolve/settle──▶ Resolved ──classify──▶ Outcome ──emit──▶ ResponseSink
//! ```
//!
//! Routing, error formatting and cancellation live one layer up, in
//! `tether-framework`.

pub mod error;
pub mod exchange;
pub mod outcome;
pub mod reply;
pub mod resolve;
pub mod sink;

pub use error::{BoxError, DomainError, ExtractError, ExtractResult, Failure, InternalWarning};
pub use exchange::{Exchange, Flow, Params, Request, ResponseHandle};
pub use outcome::{Outcome, classify};
pub use reply::{IntoReply, Json, Next, Reply, Respond};
pub use resolve::{Resolved, deep_resolve, resolve, settle};
pub use sink::{Body, BufferedResponse, ResponseSink, emit};

// Re-exported so downstream crates name the same status and method types.
pub use http::{Method, StatusCode};
