//! Single-application HTTP/1.x server.
//!
//! Each accepted connection carries exactly one request: the request head is
//! parsed, one [`Application`](app::Application) is invoked with the request
//! environment, and its response is streamed back before the connection closes.

pub mod app;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use app::{Application, MessageApp};
pub use config::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
