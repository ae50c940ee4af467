//! Single-assignment result handles.
//!
//! [`result_handle`] creates a connected pair: the [`Completer`] travels with
//! the command to the transport's I/O context, the [`ResultHandle`] goes back
//! to the caller and implements [`Future`]. Completing consumes the
//! `Completer`, so a handle can be resolved at most once; dropping an unused
//! `Completer` fails the handle with [`Error::ConnectionClosed`], so it is
//! never left unresolved either.
//!
//! Observers registered with [`ResultHandle::observe`] run in two phases on
//! the completing thread. The inspect phase sees the result by reference while
//! it is being published; the record phase runs after the caller has been
//! woken and only sees what the inspection extracted.

use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, Waker};

use parking_lot::Mutex;
use tracing::warn;

use crate::Error;

type Deferred = Box<dyn FnOnce() + Send>;
type Probe<T> = Box<dyn FnOnce(&Result<T, Error>) -> Deferred + Send>;

enum State<T> {
    Pending {
        waker: Option<Waker>,
        observers: Vec<Probe<T>>,
    },
    Ready(Result<T, Error>),
    Taken,
}

struct Shared<T> {
    state: Mutex<State<T>>,
}

/// Create a connected completer/handle pair.
pub fn result_handle<T: Send + 'static>() -> (Completer<T>, ResultHandle<T>) {
    let shared = Arc::new(Shared {
        state: Mutex::new(State::Pending {
            waker: None,
            observers: Vec::new(),
        }),
    });
    (
        Completer {
            shared: Some(shared.clone()),
        },
        ResultHandle { shared },
    )
}

/// Producer half of a result handle.
pub struct Completer<T: Send + 'static> {
    shared: Option<Arc<Shared<T>>>,
}

impl<T: Send + 'static> Completer<T> {
    /// Resolve the handle with a value.
    pub fn succeed(self, value: T) {
        self.complete(Ok(value));
    }

    /// Resolve the handle with an error.
    pub fn fail(self, error: Error) {
        self.complete(Err(error));
    }

    /// Resolve the handle.
    pub fn complete(mut self, result: Result<T, Error>) {
        if let Some(shared) = self.shared.take() {
            shared.complete(result);
        }
    }
}

impl<T: Send + 'static> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.take() {
            warn!("command released without a reply");
            shared.complete(Err(Error::ConnectionClosed));
        }
    }
}

impl<T: Send + 'static> Shared<T> {
    fn complete(&self, result: Result<T, Error>) {
        let (waker, deferred) = {
            let mut state = self.state.lock();
            let State::Pending { waker, observers } = &mut *state else {
                // Only a Completer resolves, and completing consumes it.
                unreachable!("result handle resolved twice");
            };
            let waker = waker.take();
            let deferred: Vec<Deferred> = observers
                .drain(..)
                .map(|inspect| inspect(&result))
                .collect();
            *state = State::Ready(result);
            (waker, deferred)
        };

        if let Some(waker) = waker {
            waker.wake();
        }
        for record in deferred {
            record();
        }
    }
}

/// Consumer half of a result handle. Resolves to the command's result.
#[must_use = "result handles do nothing unless awaited"]
pub struct ResultHandle<T: Send + 'static> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + 'static> ResultHandle<T> {
    /// A handle that is already resolved.
    pub fn ready(result: Result<T, Error>) -> Self {
        let (completer, handle) = result_handle();
        completer.complete(result);
        handle
    }

    /// Returns true once the handle has been resolved.
    pub fn is_complete(&self) -> bool {
        !matches!(*self.shared.state.lock(), State::Pending { .. })
    }

    /// Register a completion observer.
    ///
    /// `inspect` reads the result and must not block; `record` receives the
    /// inspection's output after the result has been handed to the caller. Both
    /// run exactly once on the thread that resolves the handle, or
    /// immediately on this thread if the handle is already resolved.
    pub fn observe<S, P, F>(&self, inspect: P, record: F)
    where
        S: Send + 'static,
        P: FnOnce(&Result<T, Error>) -> S + Send + 'static,
        F: FnOnce(S) + Send + 'static,
    {
        let summary = {
            let mut state = self.shared.state.lock();
            match &mut *state {
                State::Pending { observers, .. } => {
                    observers.push(Box::new(move |result: &Result<T, Error>| -> Deferred {
                        let summary = inspect(result);
                        Box::new(move || record(summary))
                    }));
                    return;
                }
                State::Ready(result) => inspect(result),
                State::Taken => {
                    warn!("observer registered after the result was consumed");
                    return;
                }
            }
        };
        record(summary);
    }
}

impl<T: Send + 'static> Future for ResultHandle<T> {
    type Output = Result<T, Error>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut state = self.shared.state.lock();
        if let State::Pending { waker, .. } = &mut *state {
            if !waker.as_ref().is_some_and(|w| w.will_wake(cx.waker())) {
                *waker = Some(cx.waker().clone());
            }
            return Poll::Pending;
        }
        match mem::replace(&mut *state, State::Taken) {
            State::Ready(result) => Poll::Ready(result),
            _ => panic!("ResultHandle polled after completion"),
        }
    }
}
