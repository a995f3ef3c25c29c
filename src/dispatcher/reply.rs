//! Reply sinks handed in with each dispatched call.

use futures::channel::oneshot;

use crate::codec::WireValue;

/// What a dispatched call answered.
#[derive(Clone, Debug, PartialEq)]
pub enum Reply {
    Success(Option<WireValue>),
    Error(String),
}

impl Reply {
    pub fn is_success(&self) -> bool {
        matches!(self, Reply::Success(_))
    }
}

/// Receives the single answer of a dispatched call.
///
/// Both methods consume the sink, so a call answers at most once and never both ways.
pub trait ReplySink: Send + 'static {
    fn success(self: Box<Self>, value: Option<WireValue>);
    fn error(self: Box<Self>, message: String);
}

impl<F> ReplySink for F
where
    F: FnOnce(Reply) + Send + 'static,
{
    fn success(self: Box<Self>, value: Option<WireValue>) {
        (*self)(Reply::Success(value))
    }

    fn error(self: Box<Self>, message: String) {
        (*self)(Reply::Error(message))
    }
}

/// Receiving end of [`reply_channel`].
#[derive(Debug)]
pub struct ReplyReceiver {
    inner: oneshot::Receiver<Reply>,
}

impl ReplyReceiver {
    /// Waits for the answer. `None` means the sink was dropped unanswered, which is what happens
    /// to calls the dispatcher does not handle.
    pub async fn recv(self) -> Option<Reply> {
        self.inner.await.ok()
    }

    /// Non-blocking check; `None` while pending or when dropped unanswered.
    pub fn try_recv(&mut self) -> Option<Reply> {
        self.inner.try_recv().ok().flatten()
    }
}

/// A sink paired with a receiver, for hosts that await answers instead of taking callbacks.
pub fn reply_channel() -> (Box<dyn ReplySink>, ReplyReceiver) {
    let (tx, rx) = oneshot::channel();
    let sink = move |reply: Reply| {
        let _ = tx.send(reply);
    };
    (Box::new(sink), ReplyReceiver { inner: rx })
}
