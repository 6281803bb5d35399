//! Deadlines and cancellation for blocking exchanges.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

use crate::error::{Error, Result};

/// Bounds how long a blocking operation may wait.
///
/// Cloning yields a context observing the same deadline and cancellation.
#[derive(Clone, Debug)]
pub struct Context {
    deadline: Option<Instant>,
    // disconnected once cancelled, never receives a value
    cancelled: Receiver<()>,
    // keeps the channel open until cancelled explicitly
    _canceller: Option<Canceller>,
}

/// Cancels every [`Context`] derived from [`Context::cancellable`].
#[derive(Clone, Debug)]
pub struct Canceller {
    sender: Arc<Mutex<Option<Sender<()>>>>,
}

impl Canceller {
    pub fn cancel(&self) {
        self.sender.lock().take();
    }
}

impl Context {
    /// Never expires.
    pub fn background() -> Self {
        Self {
            deadline: None,
            cancelled: channel::never(),
            _canceller: None,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::background().timeout(timeout)
    }

    pub fn with_deadline(deadline: Instant) -> Self {
        Self::background().deadline(deadline)
    }

    pub fn cancellable() -> (Self, Canceller) {
        let (sender, cancelled) = channel::bounded(0);
        let canceller = Canceller {
            sender: Arc::new(Mutex::new(Some(sender))),
        };
        let context = Self {
            deadline: None,
            cancelled,
            _canceller: Some(canceller.clone()),
        };
        (context, canceller)
    }

    /// Tightens the deadline to at most `timeout` from now.
    pub fn timeout(self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.deadline(deadline),
            None => self,
        }
    }

    /// Tightens the deadline; an earlier existing deadline is kept.
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn get_deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Fails with the cause if the context is already done.
    pub fn check(&self) -> Result<()> {
        if let Err(TryRecvError::Disconnected) = self.cancelled.try_recv() {
            return Err(Error::Cancelled);
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Error::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Fires once the deadline passes.
    pub(crate) fn expired(&self) -> Receiver<Instant> {
        match self.deadline {
            Some(deadline) => channel::at(deadline),
            None => channel::never(),
        }
    }

    /// Waits for a value on `receiver` until the context is done.
    pub(crate) fn recv<T>(&self, receiver: &Receiver<T>) -> Result<T> {
        let expired = self.expired();
        crossbeam::select! {
            recv(receiver) -> value => value.map_err(|_| Error::Closed),
            recv(self.cancelled) -> _ => Err(Error::Cancelled),
            recv(expired) -> _ => Err(Error::DeadlineExceeded),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_never_expires() {
        let context = Context::background();
        assert!(context.check().is_ok());
        assert!(context.get_deadline().is_none());
    }

    #[test]
    fn deadline_only_tightens() {
        let near = Instant::now() + Duration::from_millis(10);
        let far = near + Duration::from_secs(10);
        let context = Context::with_deadline(near).deadline(far);
        assert_eq!(context.get_deadline(), Some(near));
    }

    #[test]
    fn times_out() {
        let context = Context::with_timeout(Duration::from_millis(20));
        let (_sender, receiver) = channel::bounded::<u8>(1);
        let started = Instant::now();
        assert!(matches!(context.recv(&receiver), Err(Error::DeadlineExceeded)));
        assert!(started.elapsed() >= Duration::from_millis(20));
        assert!(matches!(context.check(), Err(Error::DeadlineExceeded)));
    }

    #[test]
    fn cancellation_wakes_waiter() {
        let (context, canceller) = Context::cancellable();
        let (_sender, receiver) = channel::bounded::<u8>(1);
        let waiter = std::thread::spawn(move || context.recv(&receiver));
        std::thread::sleep(Duration::from_millis(10));
        canceller.cancel();
        assert!(matches!(waiter.join().unwrap(), Err(Error::Cancelled)));
    }

    #[test]
    fn delivers_value() {
        let context = Context::with_timeout(Duration::from_secs(5));
        let (sender, receiver) = channel::bounded(1);
        sender.send(7u8).unwrap();
        assert_eq!(context.recv(&receiver).unwrap(), 7);
    }

    #[test]
    fn dropping_canceller_does_not_cancel() {
        let (context, canceller) = Context::cancellable();
        drop(canceller);
        assert!(context.check().is_ok());
    }

    #[test]
    fn clones_share_cancellation() {
        let (context, canceller) = Context::cancellable();
        let clone = context.clone().timeout(Duration::from_secs(60));
        canceller.cancel();
        assert!(matches!(context.check(), Err(Error::Cancelled)));
        assert!(matches!(clone.check(), Err(Error::Cancelled)));
    }
}
