//! Request/response bridge to an out-of-line executor.
//!
//! A [`Resolver`] is a single-assignment result cell: created pending,
//! completed exactly once, terminal thereafter. Completion can come from an
//! ordinary future ([`Resolver::attach_future`]) or from a discrete reply
//! record ([`Resolver::attach_message`]) posted back by a remote executor.
//! [`RpcChannel`] is the pending-operation table that matches such replies
//! to their resolver by correlation id; unmatched replies are dropped.

mod inflate;
mod resolver;

pub use inflate::{InflateExecutor, InflateReply, InflateRequest};
pub use resolver::{Rejection, ReplyMessage, Resolver, ResolverStatus};

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use tracing::debug;

/// Pending-operation table keyed by correlation id.
///
/// Requests are registered before dispatch and removed on completion, so
/// the table only ever holds in-flight operations. The channel has no
/// timeout of its own; an operation whose reply is lost stays pending until
/// the caller gives up on the handle.
pub struct RpcChannel<T> {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, Resolver<T>>>,
}

impl<T: Clone> RpcChannel<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Allocate a correlation id and register a pending resolver under it.
    ///
    /// The caller sends the id with its request and awaits the returned
    /// handle.
    pub fn register(&self) -> (u64, Resolver<T>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let resolver = Resolver::new();
        self.pending
            .lock()
            .expect("pending table poisoned")
            .insert(id, resolver.clone());
        (id, resolver)
    }

    /// Number of operations still awaiting a reply.
    pub fn in_flight(&self) -> usize {
        self.pending.lock().expect("pending table poisoned").len()
    }

    /// Feed an inbound reply to the operation it correlates with.
    ///
    /// Returns false for an unknown id (late or duplicate reply); the
    /// message is dropped in that case.
    pub fn complete(&self, id: u64, message: ReplyMessage<T>) -> bool
    where
        T: AsRef<[u8]>,
    {
        let resolver = self
            .pending
            .lock()
            .expect("pending table poisoned")
            .remove(&id);
        match resolver {
            Some(resolver) => {
                resolver.attach_message(message);
                true
            },
            None => {
                debug!(id, "dropping reply for unknown operation");
                false
            },
        }
    }
}

impl<T: Clone> Default for RpcChannel<T> {
    fn default() -> Self {
        Self::new()
    }
}
