//! Built-in application serving a fixed message.

use crate::app::{AppResult, Application, Chunks, ResponseBody};
use crate::http::environ::Environ;
use crate::http::invoker::Responder;

/// Answers every request with `200 OK` and the configured message as plain text.
#[derive(Debug, Clone)]
pub struct MessageApp {
    message: String,
}

impl MessageApp {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

impl Application for MessageApp {
    fn call<'e>(
        &self,
        environ: &'e mut Environ<'_>,
        responder: &mut Responder<'_>,
    ) -> AppResult<Box<dyn ResponseBody + 'e>> {
        tracing::debug!(
            method = environ.method(),
            path = environ.path_info(),
            "Serving message"
        );

        let body = self.message.clone().into_bytes();
        responder.start_response(
            "200 OK",
            [
                ("Content-Type", "text/plain; charset=utf-8".to_string()),
                ("Content-Length", body.len().to_string()),
            ],
        )?;
        Ok(Box::new(Chunks::once(body)))
    }
}
