use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::scheduler::pool::JobHandle;

/// Identifies one admission of a task into the registry.
///
/// A task id can be started, cancelled and started again; the ticket lets a
/// stale ticker release only its own slot, never the one of a newer job.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

struct Slot {
    ticket: Ticket,
    /// `None` between admission and the pool returning a handle.
    handle: Option<JobHandle>,
}

/// In-memory map of task id -> live periodic job.
///
/// Guarantees:
/// - At most one slot per task id (`try_reserve` is the admission gate).
/// - A slot exists iff, to our knowledge, a ticker is scheduled for that id.
/// - Handles are cancelled outside the lock.
#[derive(Default)]
pub struct JobRegistry {
    slots: Mutex<HashMap<Uuid, Slot>>,
    next_ticket: AtomicU64,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic put-if-absent. Returns `None` when a job is already registered.
    #[instrument(skip(self), target = "registry", fields(task_id = %id))]
    pub fn try_reserve(&self, id: Uuid) -> Option<Ticket> {
        let mut slots = self.slots.lock();
        if slots.contains_key(&id) {
            debug!("slot already taken");
            return None;
        }

        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        slots.insert(
            id,
            Slot {
                ticket,
                handle: None,
            },
        );
        debug!(ticket = ticket.0, "slot reserved");
        Some(ticket)
    }

    /// Stores the pool handle in the slot admitted with `ticket`.
    ///
    /// If that slot is already gone (the job stopped itself before the handle
    /// arrived, or was cancelled) the handle is cancelled right away and `false`
    /// is returned.
    pub fn attach(&self, id: Uuid, ticket: Ticket, handle: JobHandle) -> bool {
        {
            let mut slots = self.slots.lock();
            if let Some(slot) = slots.get_mut(&id) {
                if slot.ticket == ticket {
                    slot.handle = Some(handle);
                    return true;
                }
            }
        }

        debug!(task_id = %id, ticket = ticket.0, "slot gone before attach; cancelling job");
        handle.cancel();
        false
    }

    /// Remove-and-cancel, only if the slot still belongs to `ticket`.
    pub fn release(&self, id: Uuid, ticket: Ticket) -> bool {
        let slot = {
            let mut slots = self.slots.lock();
            match slots.get(&id) {
                Some(s) if s.ticket == ticket => slots.remove(&id),
                _ => None,
            }
        };

        match slot {
            Some(s) => {
                if let Some(h) = s.handle {
                    h.cancel();
                }
                true
            }
            None => false,
        }
    }

    /// Unconditional remove-and-cancel. Returns whether a slot existed.
    pub fn remove_and_cancel(&self, id: Uuid) -> bool {
        let slot = self.slots.lock().remove(&id);

        match slot {
            Some(s) => {
                if let Some(h) = s.handle {
                    h.cancel();
                }
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &Uuid) -> bool {
        self.slots.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }

    /// Cancels every registered job and empties the registry.
    pub fn cancel_all(&self) -> usize {
        let drained: Vec<Slot> = self.slots.lock().drain().map(|(_, s)| s).collect();
        let count = drained.len();

        for s in drained {
            if let Some(h) = s.handle {
                h.cancel();
            }
        }

        info!(count, "cancelled all registered jobs");
        count
    }
}
