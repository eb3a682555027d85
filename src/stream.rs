use bytes::Bytes;
use futures_util::future::poll_fn;
use spin::Mutex;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

/// The receiving end of a push-stream.
///
/// A source delivers its data by calling [`on_data`](Sink::on_data) zero or
/// more times followed by [`on_end`](Sink::on_end), or by a single
/// [`on_error`](Sink::on_error) if the stream aborts. A sink that fails returns the error to the
/// caller, which then delivers no more data or end to it, only a single
/// `on_error` carrying that same error.
pub trait Sink {
    /// Receives the next chunk of data.
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()>;

    /// Signals that no more data will follow.
    fn on_end(&mut self) -> crate::Result<()>;

    /// Signals that the stream was aborted, possibly by an error this sink
    /// returned itself. No further events follow.
    fn on_error(&mut self, _err: &crate::Error) {}
}

impl<S: Sink + ?Sized> Sink for &mut S {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        (**self).on_data(chunk)
    }

    fn on_end(&mut self) -> crate::Result<()> {
        (**self).on_end()
    }

    fn on_error(&mut self, err: &crate::Error) {
        (**self).on_error(err)
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        (**self).on_data(chunk)
    }

    fn on_end(&mut self) -> crate::Result<()> {
        (**self).on_end()
    }

    fn on_error(&mut self, err: &crate::Error) {
        (**self).on_error(err)
    }
}

impl Sink for Vec<Bytes> {
    fn on_data(&mut self, chunk: Bytes) -> crate::Result<()> {
        self.push(chunk);
        Ok(())
    }

    fn on_end(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

/// A shared pause/resume switch between a source and everything built on it.
///
/// Every [`Part`](crate::Part) and filter of one parse holds a clone of the same
/// `Flow`, so pausing any of them asks the source feeding the parser to hold
/// back further chunks. The source checks [`is_paused`](Flow::is_paused) or
/// awaits [`ready`](Flow::ready) before pushing more data.
#[derive(Clone, Default)]
pub struct Flow {
    inner: Arc<Mutex<FlowState>>,
}

#[derive(Default)]
struct FlowState {
    paused: bool,
    waker: Option<Waker>,
}

impl Flow {
    /// Creates a new, unpaused `Flow`.
    pub fn new() -> Flow {
        Flow::default()
    }

    /// Asks the source to stop delivering data.
    pub fn pause(&self) {
        self.inner.lock().paused = true;
    }

    /// Lets the source deliver data again.
    pub fn resume(&self) {
        let waker = {
            let mut state = self.inner.lock();
            state.paused = false;
            state.waker.take()
        };

        if let Some(waker) = waker {
            waker.wake();
        }
    }

    /// Returns `true` while the stream is paused.
    pub fn is_paused(&self) -> bool {
        self.inner.lock().paused
    }

    /// Polls whether the source may deliver data.
    pub fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<()> {
        let mut state = self.inner.lock();

        if state.paused {
            state.waker = Some(cx.waker().clone());
            Poll::Pending
        } else {
            Poll::Ready(())
        }
    }

    /// Waits until the stream is not paused.
    pub async fn ready(&self) {
        poll_fn(|cx| self.poll_ready(cx)).await
    }
}

impl Debug for Flow {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow").field("paused", &self.is_paused()).finish()
    }
}
