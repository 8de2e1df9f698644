//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (accept loop, one blocking worker per connection)
//!     → session.rs (one request per connection)
//!         → request_line.rs, headers.rs (parse)
//!         → environ.rs (request context)
//!         → invoker.rs + response.rs (application call, head staging, body)
//!     → Send to client
//! ```

pub mod environ;
pub mod error;
pub mod headers;
pub mod invoker;
pub mod line;
pub mod request_line;
pub mod response;
pub mod server;
pub mod session;
pub mod status;

pub use environ::{ConnectionInfo, EnvValue, Environ};
pub use error::{ProtocolError, ProtocolResult};
pub use headers::HeaderSet;
pub use invoker::{BodyWriter, InvokerState, Responder};
pub use request_line::RequestLine;
pub use response::{HeadBuffer, ResponseHead};
pub use server::HttpServer;
pub use session::{ConnectionSession, SessionOutcome, SessionSettings};
