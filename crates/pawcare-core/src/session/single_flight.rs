//! Coalescing of concurrent calls into one in-flight operation.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;

/// The call leading the flight was dropped before it produced a value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("in-flight operation was abandoned before completing")]
pub struct Abandoned;

enum Role<T> {
    Leader(watch::Sender<Option<T>>),
    Follower(watch::Receiver<Option<T>>),
}

/// At most one operation in flight at a time; callers arriving while it runs
/// wait for it and receive a clone of its output.
///
/// Each `SingleFlight` is its own dedup scope. Nothing is shared between
/// instances.
pub struct SingleFlight<T> {
    in_flight: Mutex<Option<watch::Receiver<Option<T>>>>,
}

impl<T> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            in_flight: Mutex::new(None),
        }
    }
}

impl<T> std::fmt::Debug for SingleFlight<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleFlight")
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

/// Clears the in-flight slot when the leader finishes or is dropped.
struct ClearOnDrop<'a, T> {
    slot: &'a Mutex<Option<watch::Receiver<Option<T>>>>,
}

impl<T> Drop for ClearOnDrop<'_, T> {
    fn drop(&mut self) {
        lock(self.slot).take();
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<T> SingleFlight<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_in_flight(&self) -> bool {
        lock(&self.in_flight).is_some()
    }
}

impl<T: Clone> SingleFlight<T> {
    /// Run `work`, or join the run already in flight.
    ///
    /// `work` is only invoked by the caller that starts the flight; every
    /// other caller drops its closure unused.
    pub async fn run<F, Fut>(&self, work: F) -> Result<T, Abandoned>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let role = {
            let mut slot = lock(&self.in_flight);
            match slot.as_ref() {
                Some(rx) => Role::Follower(rx.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    *slot = Some(rx);
                    Role::Leader(tx)
                }
            }
        };

        match role {
            Role::Leader(tx) => {
                let clear = ClearOnDrop {
                    slot: &self.in_flight,
                };
                let value = work().await;
                drop(clear);
                // Followers hold their own receivers; with none left the
                // send has nobody to reach.
                let _ = tx.send(Some(value.clone()));
                Ok(value)
            }
            Role::Follower(mut rx) => {
                let done = rx.wait_for(Option::is_some).await.map_err(|_| Abandoned)?;
                done.as_ref().cloned().ok_or(Abandoned)
            }
        }
    }
}
