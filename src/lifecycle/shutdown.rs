//! Stop flag shared by the listener and background tasks.
//!
//! Backed by a `watch` channel so the flag is sticky: a task that subscribes
//! after the trigger still sees it and stops at once.

use tokio::sync::watch;

/// Owner side of the stop flag.
pub struct Shutdown {
    flag: watch::Sender<bool>,
}

/// Subscriber side, handed to the server and to spawned tasks.
#[derive(Clone)]
pub struct ShutdownSignal {
    flag: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self { flag }
    }

    pub fn subscribe(&self) -> ShutdownSignal {
        ShutdownSignal {
            flag: self.flag.subscribe(),
        }
    }

    /// Raise the flag. Repeated calls are no-ops.
    pub fn trigger(&self) {
        self.flag.send_if_modified(|stopped| !std::mem::replace(stopped, true));
    }

    pub fn is_triggered(&self) -> bool {
        *self.flag.borrow()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownSignal {
    /// Resolve once the flag is raised, or when the owner is dropped.
    pub async fn wait(mut self) {
        let _ = self.flag.wait_for(|stopped| *stopped).await;
    }
}
