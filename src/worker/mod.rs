//! # Worker Access
//!
//! How the balancer talks to remote fog nodes.
//!
//! ## Modules
//!
//! - [`proxy`]: The [`WorkerProxy`](proxy::WorkerProxy) trait and its HTTP
//!   implementation

pub mod proxy;

pub use proxy::{HttpWorkerProxy, WorkerError, WorkerProxy};
