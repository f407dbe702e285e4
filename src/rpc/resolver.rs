use std::fmt::Display;
use std::sync::{Arc, Mutex};

use thiserror::Error;
use tokio::sync::Notify;

use crate::util::bytes_to_text;

/// Why a pending operation was rejected.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct Rejection(pub String);

/// Observable state of a pending operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverStatus {
    Pending,
    Resolved,
    Rejected,
}

/// Discrete reply record posted by an executor.
///
/// `payload` carries the result when `error` is false and the fault reason
/// (as raw bytes) when it is true.
#[derive(Debug, Clone)]
pub struct ReplyMessage<T> {
    pub kind: &'static str,
    pub error: bool,
    pub payload: T,
}

impl<T> ReplyMessage<T> {
    pub fn ok(kind: &'static str, payload: T) -> Self {
        Self {
            kind,
            error: false,
            payload,
        }
    }

    pub fn fault(kind: &'static str, payload: T) -> Self {
        Self {
            kind,
            error: true,
            payload,
        }
    }
}

enum Cell<T> {
    Pending,
    Resolved(T),
    Rejected(Rejection),
}

struct Inner<T> {
    cell: Mutex<Cell<T>>,
    notify: Notify,
}

/// Single-assignment awaitable result cell.
///
/// Any number of completion sources may race; the first wins and the state
/// never changes again. Clones share the same cell, so one half can be
/// handed to a completion source while the caller awaits the other.
pub struct Resolver<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Resolver<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                cell: Mutex::new(Cell::Pending),
                notify: Notify::new(),
            }),
        }
    }

    /// Current state, without suspending.
    pub fn status(&self) -> ResolverStatus {
        match *self.inner.cell.lock().expect("resolver poisoned") {
            Cell::Pending => ResolverStatus::Pending,
            Cell::Resolved(_) => ResolverStatus::Resolved,
            Cell::Rejected(_) => ResolverStatus::Rejected,
        }
    }

    /// Complete with a value. Returns false if already completed (no-op).
    pub fn resolve(&self, value: T) -> bool {
        self.finish(Cell::Resolved(value))
    }

    /// Complete with a rejection. Returns false if already completed.
    pub fn reject<R: Into<String>>(&self, reason: R) -> bool {
        self.finish(Cell::Rejected(Rejection(reason.into())))
    }

    fn finish(&self, outcome: Cell<T>) -> bool {
        {
            let mut cell = self.inner.cell.lock().expect("resolver poisoned");
            if !matches!(*cell, Cell::Pending) {
                return false;
            }
            *cell = outcome;
        }
        self.inner.notify.notify_waiters();
        true
    }

    /// Wire this handle to an asynchronous computation: its success
    /// resolves, its failure rejects. Exactly one fires.
    pub fn attach_future<F, E>(&self, future: F)
    where
        T: Send + 'static,
        E: Display,
        F: Future<Output = std::result::Result<T, E>> + Send + 'static,
    {
        let handle = self.clone();
        tokio::spawn(async move {
            match future.await {
                Ok(value) => handle.resolve(value),
                Err(e) => handle.reject(e.to_string()),
            };
        });
    }

    /// Feed a discrete reply record: `error == false` resolves with the
    /// payload, `error == true` rejects with the payload decoded as text.
    /// Later completion attempts of either kind are ignored.
    pub fn attach_message(&self, message: ReplyMessage<T>)
    where
        T: AsRef<[u8]>,
    {
        if message.error {
            self.reject(bytes_to_text(message.payload.as_ref()));
        } else {
            self.resolve(message.payload);
        }
    }

    /// Suspend until the cell is completed, then return the outcome.
    ///
    /// There is no built-in timeout; a resolver whose completion source
    /// vanished stays pending until the caller stops waiting.
    pub async fn wait(&self) -> std::result::Result<T, Rejection> {
        loop {
            // Register for notification before inspecting the cell, so a
            // completion between the two cannot be missed.
            let notified = self.inner.notify.notified();
            {
                let cell = self.inner.cell.lock().expect("resolver poisoned");
                match &*cell {
                    Cell::Resolved(value) => return Ok(value.clone()),
                    Cell::Rejected(rejection) => return Err(rejection.clone()),
                    Cell::Pending => {},
                }
            }
            notified.await;
        }
    }
}

impl<T: Clone> Default for Resolver<T> {
    fn default() -> Self {
        Self::new()
    }
}
