//! # Tether Framework
//!
//! Value-returning route handlers on top of a native router.
//!
//! This layer provides:
//! - Handler trait for Axum-style parameter extraction ([`Handler`], [`FromExchange`])
//! - The error pipeline: success/error formatting, fallback, warning reporting
//! - The handler-wrapping adapter with cancellation and pass-to-next
//! - The [`Router`] registration surface over any [`NativeRouter`]
//!
//! The result model itself (replies, resolution, classification, emission)
//! lives in `tether-core`.

pub mod adapter;
pub mod dispatcher;
pub mod extractor;
pub mod handler;
pub mod pipeline;
pub mod router;
pub mod settings;

pub use adapter::{Convention, HandlerService, ParamService, drive};
pub use dispatcher::{Dispatcher, NativeHandler, NativeParamHandler, NativeRouter};
pub use extractor::{FromExchange, JsonBody, Params, ResolvedParam};
pub use handler::{Handler, ParamHandler};
pub use router::{Endpoint, METHODS, Route, Router};
pub use settings::{
    ErrorFormatter, RouterSettings, SharedSettings, SuccessFormatter, WarningSink, default_fallback,
};
