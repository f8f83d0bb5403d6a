//! Listener shutdown signalling
//!
//! A one-shot, broadcast stop flag built on a tokio watch channel. The
//! controller keeps the [`Closer`]; the engine's accept loop and every
//! connection task hold clones of the [`ShutdownSignal`].

use tokio::sync::watch;

/// Creates a connected closer/signal pair.
pub fn shutdown_channel() -> (Closer, ShutdownSignal) {
    let (sender, receiver) = watch::channel(false);
    (Closer { sender }, ShutdownSignal { receiver })
}

/// Trigger side, owned by the listener controller.
#[derive(Debug)]
pub struct Closer {
    sender: watch::Sender<bool>,
}

impl Closer {
    /// Asks the accept loop and all open connections to stop. Idempotent.
    pub fn close_all(&self) {
        self.sender.send_replace(true);
    }
}

/// Observer side, cloned into every task that must stop with the listener.
#[derive(Clone, Debug)]
pub struct ShutdownSignal {
    receiver: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// Resolves once shutdown was requested or the closer was dropped.
    pub async fn triggered(&mut self) {
        loop {
            if *self.receiver.borrow_and_update() {
                return;
            }
            if self.receiver.changed().await.is_err() {
                return;
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.receiver.borrow()
    }
}
