use std::time::Duration;

use tokio::{
    sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::{sleep_until, Instant},
};

/// Collapses bursts of input into the last value once input has been quiet
/// for `delay`. Requires a tokio runtime.
pub struct Debouncer<T> {
    delay: Duration,
    sender: UnboundedSender<T>,
    pending: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> Debouncer<T> {
    pub fn new(delay: Duration) -> (Self, UnboundedReceiver<T>) {
        let (sender, receiver) = unbounded_channel();
        let debouncer = Self {
            delay,
            sender,
            pending: None,
        };

        (debouncer, receiver)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Restarts the quiet period with `value` as the candidate output.
    pub fn push(&mut self, value: T) {
        self.cancel();

        let deadline = Instant::now() + self.delay;
        let sender = self.sender.clone();
        self.pending = Some(tokio::spawn(async move {
            sleep_until(deadline).await;
            if sender.send(value).is_err() {
                log::trace!("> Debounced value dropped, receiver closed");
            }
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .map(|pending| !pending.is_finished())
            .unwrap_or(false)
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}
