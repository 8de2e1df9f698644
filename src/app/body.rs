//! Response body contract.

use crate::app::ApplicationError;

/// A finite, non-restartable sequence of byte chunks.
///
/// `close` is called exactly once by the server after iteration ends, whether
/// the body was exhausted, failed, or the server gave up on it.
pub trait ResponseBody {
    /// Produce the next chunk, or `None` once the body is exhausted.
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, ApplicationError>>;

    /// Release resources held by the body.
    fn close(&mut self) {}
}

/// Body backed by an iterator of chunks, with an optional close hook.
pub struct Chunks<I> {
    iter: I,
    on_close: Option<Box<dyn FnOnce()>>,
}

impl<I> Chunks<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    pub fn new<C>(chunks: C) -> Self
    where
        C: IntoIterator<IntoIter = I>,
    {
        Self { iter: chunks.into_iter(), on_close: None }
    }

    /// Run `f` when the server closes the body.
    pub fn on_close(mut self, f: impl FnOnce() + 'static) -> Self {
        self.on_close = Some(Box::new(f));
        self
    }
}

impl Chunks<std::iter::Once<Vec<u8>>> {
    /// A body made of a single chunk.
    pub fn once(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(std::iter::once(bytes.into()))
    }
}

impl Chunks<std::iter::Empty<Vec<u8>>> {
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }
}

impl<I> ResponseBody for Chunks<I>
where
    I: Iterator<Item = Vec<u8>>,
{
    fn next_chunk(&mut self) -> Option<Result<Vec<u8>, ApplicationError>> {
        self.iter.next().map(Ok)
    }

    fn close(&mut self) {
        if let Some(f) = self.on_close.take() {
            f();
        }
    }
}
