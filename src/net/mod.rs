//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → connection.rs (id, lifecycle tracking for shutdown)
//!     → Hand off to a blocking worker running http::session
//! ```
//!
//! # Design Decisions
//! - The connection limit doubles as the worker pool bound
//! - Accepting never waits for an unrelated connection to finish
//! - Each connection tracked for graceful shutdown

pub mod connection;
pub mod listener;
