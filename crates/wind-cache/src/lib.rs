//! Single-flight result cache with stale-while-revalidate reads.
//!
//! One writer refreshes the value in the background; any number of readers
//! wait for the refresh in progress, up to a deadline, and fall back to the
//! previous value when it takes too long.
//!
//! Refreshes are numbered. Starting a new refresh supersedes any older one
//! still running, and only the newest refresh's result is ever stored.

mod error;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::watch;
use tracing::{debug, warn};

pub use error::{CacheError, RefreshError};

struct State<T> {
    value: Option<Arc<T>>,
    error: Option<RefreshError>,
    /// At least one refresh has completed.
    completed: bool,
    in_flight: bool,
    generation: u64,
}

impl<T> State<T> {
    fn settled(&self) -> bool {
        self.completed && !self.in_flight
    }
}

/// What a reader observed.
#[derive(Debug)]
pub struct CacheRead<T> {
    /// Latest successfully refreshed value, if any
    pub value: Option<Arc<T>>,
    /// Error of the latest refresh, if it failed
    pub error: Option<RefreshError>,
    /// A refresh was still running when the deadline passed
    pub stale: bool,
}

/// Shared cache of the latest refresh result.
pub struct ResultCache<T> {
    state: Arc<watch::Sender<State<T>>>,
}

impl<T> Default for ResultCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ResultCache<T> {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(State {
            value: None,
            error: None,
            completed: false,
            in_flight: false,
            generation: 0,
        });
        Self {
            state: Arc::new(tx),
        }
    }

    /// Wait until no refresh is running and one has completed, for at most
    /// `deadline` (`None` waits forever).
    ///
    /// When the deadline passes first, the previous result is returned with
    /// `stale` set, or [`CacheError::NotYetAvailable`] if there is none.
    pub async fn get(&self, deadline: Option<Duration>) -> Result<CacheRead<T>, CacheError> {
        let mut rx = self.state.subscribe();
        let timed_out = match deadline {
            Some(limit) => tokio::time::timeout(limit, wait_settled(&mut rx))
                .await
                .is_err(),
            None => {
                wait_settled(&mut rx).await;
                false
            }
        };

        let state = rx.borrow();
        if !state.completed {
            return Err(CacheError::NotYetAvailable);
        }
        Ok(CacheRead {
            value: state.value.clone(),
            error: state.error.clone(),
            stale: timed_out,
        })
    }

    /// The current result without waiting.
    pub fn peek(&self) -> Option<CacheRead<T>> {
        let state = self.state.borrow();
        state.completed.then(|| CacheRead {
            value: state.value.clone(),
            error: state.error.clone(),
            stale: state.in_flight,
        })
    }

    /// Whether a refresh is running.
    pub fn is_updating(&self) -> bool {
        self.state.borrow().in_flight
    }

    /// Start a refresh. Readers block (up to their deadline) until it, or a
    /// newer one, completes.
    pub fn begin_update(&self) -> UpdateHandle<T> {
        let mut generation = 0;
        self.state.send_modify(|state| {
            state.generation += 1;
            state.in_flight = true;
            generation = state.generation;
        });
        debug!(generation, "Refresh started");
        UpdateHandle {
            state: Some(self.state.clone()),
            generation,
        }
    }

    /// Run `refresh` as a new update, storing its result. A panic inside the
    /// future is caught and stored as [`RefreshError::Panicked`].
    pub async fn update_with<F>(&self, refresh: F) -> Result<(), RefreshError>
    where
        F: Future<Output = Result<T, RefreshError>>,
    {
        let handle = self.begin_update();
        let result = match AssertUnwindSafe(refresh).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => Err(RefreshError::Panicked(panic_message(&*panic).into())),
        };
        let outcome = match &result {
            Ok(_) => Ok(()),
            Err(err) => Err(err.clone()),
        };
        handle.complete(result);
        outcome
    }
}

/// An in-progress refresh. Complete it exactly once; dropping it without
/// completing stores [`RefreshError::Abandoned`].
pub struct UpdateHandle<T> {
    state: Option<Arc<watch::Sender<State<T>>>>,
    generation: u64,
}

impl<T> UpdateHandle<T> {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Store the refresh result. Returns false if a newer refresh has
    /// started since, in which case the result is discarded.
    ///
    /// A failure keeps the previous value and records the error; a success
    /// replaces the value and clears the error.
    pub fn complete(mut self, result: Result<T, RefreshError>) -> bool {
        self.finish(result.map(Arc::new))
    }

    fn finish(&mut self, result: Result<Arc<T>, RefreshError>) -> bool {
        let Some(state) = self.state.take() else {
            return false;
        };
        let generation = self.generation;
        let applied = state.send_if_modified(|state| {
            if state.generation != generation {
                return false;
            }
            match result {
                Ok(value) => {
                    state.value = Some(value);
                    state.error = None;
                }
                Err(err) => state.error = Some(err),
            }
            state.completed = true;
            state.in_flight = false;
            true
        });
        if !applied {
            debug!(generation, "Discarding superseded refresh result");
        }
        applied
    }
}

impl<T> Drop for UpdateHandle<T> {
    fn drop(&mut self) {
        if self.state.is_some() {
            warn!(generation = self.generation, "Refresh dropped without completing");
            self.finish(Err(RefreshError::Abandoned));
        }
    }
}

async fn wait_settled<T>(rx: &mut watch::Receiver<State<T>>) {
    // The sender lives in the cache, so this only returns once settled.
    let _ = rx.wait_for(State::settled).await;
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
