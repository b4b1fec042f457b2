//! # Fog Node Components
//!
//! The worker process side of the system: accepts raw chunks over HTTP,
//! encrypts each under a fresh key/nonce, and reports its own load.
//!
//! ## Modules
//!
//! - [`encryption`]: Semaphore-bounded AES-256-GCM chunk encryption
//! - [`telemetry`]: CPU/RAM/task-count figures served via `/health`
//! - [`api`]: The HTTP interface (`/task`, `/health`)

pub mod api;
pub mod encryption;
pub mod telemetry;

pub use encryption::EncryptionService;
pub use telemetry::NodeTelemetry;
