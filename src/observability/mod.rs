//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, per-connection spans)
//!
//! Consumers:
//!     → stdout (human-readable or JSON lines)
//! ```

pub mod logging;
