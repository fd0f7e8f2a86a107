//! Request/response correlation.
//!
//! Each request awaiting a reply owns an entry in a pending table keyed by
//! frame id, holding the sending half of a one-shot channel. The reader
//! thread removes the entry when a reply with that id arrives and hands the
//! response over. A caller that gives up removes its own entry under the
//! same lock, so a reply arriving afterwards finds no entry and is routed to
//! the event sink instead of a later, unrelated request.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use crossbeam_channel::{Receiver, Sender};
use tracing::{debug, trace};
use xbee_api::Response;

use crate::error::{DeviceError, Result};

/// Number of usable frame ids (1..=255).
pub const FRAME_ID_COUNT: usize = 255;

/// Where a received response went.
#[derive(Debug)]
pub enum Dispatch {
    /// Handed to the waiting request.
    Delivered,
    /// Reply to a request that already timed out.
    Late(Response),
    /// No request was waiting for it.
    Unsolicited(Response),
}

#[derive(Debug)]
struct Pending {
    waiters: HashMap<u8, Sender<Response>>,
    /// Ids whose requests timed out and that have not been reused yet.
    abandoned: HashSet<u8>,
    next_id: u8,
    closed: bool,
}

/// Pending-request table and frame id allocator.
#[derive(Debug)]
pub struct Coordinator {
    pending: Mutex<Pending>,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Pending {
                waiters: HashMap::new(),
                abandoned: HashSet::new(),
                next_id: 1,
                closed: false,
            }),
        }
    }

    /// Allocate a frame id and register a waiter for it.
    ///
    /// Ids are handed out round-robin from 1 to 255, skipping 0 and any id
    /// still awaiting a reply. An id abandoned on timeout is passed over
    /// while a clean one is available.
    pub fn register(&self) -> Result<(u8, Receiver<Response>)> {
        let mut pending = self.lock();
        if pending.closed {
            return Err(DeviceError::Closed);
        }

        let id = pending.allocate().ok_or(DeviceError::FrameIdsExhausted)?;
        let (tx, rx) = crossbeam_channel::bounded(1);
        pending.waiters.insert(id, tx);
        pending.abandoned.remove(&id);
        trace!(frame_id = id, "registered waiter");
        Ok((id, rx))
    }

    /// Drop the waiter for `frame_id` without marking it abandoned (the
    /// request never reached the link).
    pub fn cancel(&self, frame_id: u8) {
        self.lock().waiters.remove(&frame_id);
    }

    /// Give up on `frame_id` after a timeout.
    ///
    /// Returns false if the reply was delivered (or the table closed) before
    /// the entry could be removed; the caller's receiver then holds the
    /// outcome.
    pub fn abandon(&self, frame_id: u8) -> bool {
        let mut pending = self.lock();
        if pending.waiters.remove(&frame_id).is_some() {
            pending.abandoned.insert(frame_id);
            true
        } else {
            false
        }
    }

    /// Route a received response to its waiter, if any.
    pub fn dispatch(&self, response: Response) -> Dispatch {
        let Some(frame_id) = response.frame_id() else {
            return Dispatch::Unsolicited(response);
        };

        let mut pending = self.lock();
        match pending.waiters.remove(&frame_id) {
            Some(tx) => match tx.send(response) {
                Ok(()) => Dispatch::Delivered,
                // Receiver dropped without abandoning: treat as unclaimed.
                Err(err) => Dispatch::Unsolicited(err.into_inner()),
            },
            None if pending.abandoned.remove(&frame_id) => {
                debug!(frame_id, "late response for abandoned request");
                Dispatch::Late(response)
            }
            None => Dispatch::Unsolicited(response),
        }
    }

    /// Refuse new requests and fail every pending one.
    ///
    /// Dropping the senders disconnects each waiter's receiver.
    pub fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        let failed = pending.waiters.len();
        pending.waiters.clear();
        pending.abandoned.clear();
        if failed > 0 {
            debug!(failed, "failed pending requests on close");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of requests currently awaiting a reply.
    pub fn pending_count(&self) -> usize {
        self.lock().waiters.len()
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Pending {
    /// Next free id in round-robin order. Ids abandoned on timeout are only
    /// reused once no clean id is left.
    fn allocate(&mut self) -> Option<u8> {
        let id = self
            .scan(|p, id| !p.waiters.contains_key(&id) && !p.abandoned.contains(&id))
            .or_else(|| self.scan(|p, id| !p.waiters.contains_key(&id)))?;
        self.next_id = if id == u8::MAX { 1 } else { id + 1 };
        Some(id)
    }

    fn scan(&self, free: impl Fn(&Self, u8) -> bool) -> Option<u8> {
        let mut id = self.next_id;
        for _ in 0..FRAME_ID_COUNT {
            if free(self, id) {
                return Some(id);
            }
            id = if id == u8::MAX { 1 } else { id + 1 };
        }
        None
    }
}
