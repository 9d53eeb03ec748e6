//! Outbound call bookkeeping.

use std::collections::HashMap;
use std::io::Read;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::error::{ChannelError, Result};
use crate::header::CALL_ID_BITS;

/// Pending two-way calls keyed by call id.
///
/// Ids are handed out by scanning forward from a rolling cursor for the first
/// free one, wrapping at `2^bits`. The caller holds the table's lock across
/// [`allocate`](Self::allocate), so choosing an id and claiming it are one
/// step.
#[derive(Debug)]
pub struct CallTable<T> {
    pending: HashMap<u32, T>,
    next: u32,
    bits: u32,
}

impl<T> CallTable<T> {
    /// A table for ids of `bits` width (at most 24).
    pub fn new(bits: u32) -> Self {
        Self {
            pending: HashMap::new(),
            next: 1,
            bits: bits.min(CALL_ID_BITS),
        }
    }

    /// Number of distinct ids.
    pub fn capacity(&self) -> usize {
        1usize << self.bits
    }

    /// Claim the next free id for `entry`.
    pub fn allocate(&mut self, entry: T) -> Result<u32> {
        let capacity = self.capacity();
        if self.pending.len() >= capacity {
            return Err(ChannelError::CallTableExhausted { capacity });
        }
        let mask = (capacity - 1) as u32;
        loop {
            let id = self.next;
            self.next = (self.next + 1) & mask;
            if let std::collections::hash_map::Entry::Vacant(slot) = self.pending.entry(id) {
                slot.insert(entry);
                return Ok(id);
            }
        }
    }

    pub fn get(&self, id: u32) -> Option<&T> {
        self.pending.get(&id)
    }

    pub fn remove(&mut self, id: u32) -> Option<T> {
        self.pending.remove(&id)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Remove every pending entry.
    pub fn drain(&mut self) -> Vec<(u32, T)> {
        self.pending.drain().collect()
    }
}

impl<T> Default for CallTable<T> {
    fn default() -> Self {
        Self::new(CALL_ID_BITS)
    }
}

/// A response body handed to the caller.
pub type ResponseStream = Box<dyn Read + Send>;

/// Why a pending call ended without a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Failure {
    Aborted(String),
    Closed,
}

impl Failure {
    fn to_error(&self) -> ChannelError {
        match self {
            Self::Aborted(message) => ChannelError::Aborted(message.clone()),
            Self::Closed => ChannelError::ChannelClosed,
        }
    }
}

enum Outcome {
    Waiting,
    Responded(ResponseStream),
    Failed(Failure),
    Taken,
}

/// Rendezvous between the caller waiting on a two-way call and the receive
/// loop that delivers its response.
pub(crate) struct PendingCall {
    outcome: Mutex<Outcome>,
    ready: Condvar,
}

impl PendingCall {
    pub(crate) fn new() -> Self {
        Self {
            outcome: Mutex::new(Outcome::Waiting),
            ready: Condvar::new(),
        }
    }

    /// Deliver the response. Returns the stream back if the call already
    /// ended.
    pub(crate) fn complete(&self, response: ResponseStream) -> std::result::Result<(), ResponseStream> {
        let mut outcome = self.outcome.lock();
        if !matches!(*outcome, Outcome::Waiting) {
            return Err(response);
        }
        *outcome = Outcome::Responded(response);
        self.ready.notify_all();
        Ok(())
    }

    /// End the call with `failure`. No effect once a response arrived.
    pub(crate) fn fail(&self, failure: Failure) -> bool {
        let mut outcome = self.outcome.lock();
        if !matches!(*outcome, Outcome::Waiting) {
            return false;
        }
        *outcome = Outcome::Failed(failure);
        self.ready.notify_all();
        true
    }

    pub(crate) fn is_waiting(&self) -> bool {
        matches!(*self.outcome.lock(), Outcome::Waiting)
    }

    /// Block until the call resolves. A timeout leaves it pending.
    pub(crate) fn wait(&self, timeout: Option<Duration>) -> Result<ResponseStream> {
        let deadline = timeout.map(|limit| (limit, Instant::now() + limit));
        let mut outcome = self.outcome.lock();
        loop {
            match std::mem::replace(&mut *outcome, Outcome::Taken) {
                Outcome::Waiting => *outcome = Outcome::Waiting,
                Outcome::Responded(response) => return Ok(response),
                Outcome::Failed(failure) => {
                    let err = failure.to_error();
                    *outcome = Outcome::Failed(failure);
                    return Err(err);
                }
                Outcome::Taken => {
                    return Err(ChannelError::InvalidState("the response was already taken"))
                }
            }
            match deadline {
                Some((limit, deadline)) => {
                    if self.ready.wait_until(&mut outcome, deadline).timed_out()
                        && matches!(*outcome, Outcome::Waiting)
                    {
                        return Err(ChannelError::Timeout(limit));
                    }
                }
                None => self.ready.wait(&mut outcome),
            }
        }
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("waiting", &self.is_waiting())
            .finish()
    }
}
