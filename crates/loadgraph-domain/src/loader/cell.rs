//! Write-once result cell with an explicit waiter list.

use parking_lot::Mutex;
use tokio::sync::oneshot;

enum CellState<T> {
    Pending(Vec<oneshot::Sender<T>>),
    Resolved(T),
}

/// Outcome of subscribing to a cell.
pub(crate) enum Subscription<T> {
    /// The cell already holds a value.
    Ready(T),
    /// The cell is pending; the receiver fires on resolution.
    Waiting(oneshot::Receiver<T>),
}

/// Single-assignment cell shared by every caller waiting on one key.
///
/// The first `resolve` wins and fans the value out to all registered
/// waiters. Later subscribers read the stored value directly.
pub(crate) struct ResultCell<T> {
    state: Mutex<CellState<T>>,
}

impl<T: Clone> ResultCell<T> {
    pub(crate) fn pending() -> Self {
        Self {
            state: Mutex::new(CellState::Pending(Vec::new())),
        }
    }

    pub(crate) fn resolved(value: T) -> Self {
        Self {
            state: Mutex::new(CellState::Resolved(value)),
        }
    }

    pub(crate) fn subscribe(&self) -> Subscription<T> {
        let mut state = self.state.lock();
        match &mut *state {
            CellState::Resolved(value) => Subscription::Ready(value.clone()),
            CellState::Pending(waiters) => {
                let (tx, rx) = oneshot::channel();
                waiters.push(tx);
                Subscription::Waiting(rx)
            }
        }
    }

    /// Stores the value and wakes every waiter.
    ///
    /// Returns `false` when the cell was already resolved; the stored
    /// value is left untouched in that case.
    pub(crate) fn resolve(&self, value: T) -> bool {
        let waiters = {
            let mut state = self.state.lock();
            let waiters = match &mut *state {
                CellState::Resolved(_) => return false,
                CellState::Pending(waiters) => std::mem::take(waiters),
            };
            *state = CellState::Resolved(value.clone());
            waiters
        };

        // Receivers dropped by cancelled callers are ignored.
        for waiter in waiters {
            let _ = waiter.send(value.clone());
        }
        true
    }

    pub(crate) fn is_resolved(&self) -> bool {
        matches!(&*self.state.lock(), CellState::Resolved(_))
    }
}

impl<T> ResultCell<T> {
    /// Drops every waiter without a value; their receivers observe a closed
    /// channel. Used when the owning loader goes away.
    pub(crate) fn abandon(&self) {
        if let CellState::Pending(waiters) = &mut *self.state.lock() {
            waiters.clear();
        }
    }
}
