//! # Fog Dispatch
//!
//! Chunked file encryption over a pool of remote fog nodes. A file is split
//! into fixed-size chunks, every chunk is dispatched to one worker for
//! independent encryption (with retry across the pool on failure), and the
//! returned ciphertexts are reassembled in original order together with the
//! key/nonce manifest needed to decrypt them.
//!
//! ## Crate layout
//!
//! - [`balancer`]: The dispatch engine and its HTTP API
//! - [`worker`]: The balancer's client-side view of one fog node
//! - [`node`]: The fog node process (chunk encryption + telemetry)
//! - [`client`]: CLI client support (submit, reassemble, persist)
//! - [`common`]: Shared data types, configuration and logging

pub mod balancer;
pub mod client;
pub mod common;
pub mod node;
pub mod worker;

pub use balancer::{BalancerConfig, Dispatcher, LbPolicy};
pub use worker::WorkerProxy;
