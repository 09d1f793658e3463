//! Optimistic edit state for a synced entity.
//!
//! Every mutation follows the same protocol: apply the new value locally
//! (`begin`), await the store write, then `confirm` on acknowledgment or
//! `roll_back` to the last known-good value on failure. The subscription
//! echo of a confirmed write is idempotent with respect to the optimistic
//! value, so readers never observe a glitch on success.

#[derive(Debug, Clone)]
pub enum EditState<T> {
    /// No write in flight; this value matches the store (or the default
    /// before any write).
    Settled(T),
    /// A write is in flight. `prior` is the last known-good value to restore
    /// on failure; `optimistic` is what callers currently see.
    Pending { prior: T, optimistic: T },
}

impl<T: Clone> EditState<T> {
    pub fn new(value: T) -> Self {
        EditState::Settled(value)
    }

    /// The value a caller should see right now.
    pub fn current(&self) -> &T {
        match self {
            EditState::Settled(value) => value,
            EditState::Pending { optimistic, .. } => optimistic,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, EditState::Pending { .. })
    }

    /// Start an optimistic edit. If one is already pending, the original
    /// known-good value is kept so a later rollback restores the state from
    /// before the first unconfirmed write.
    pub fn begin(&mut self, optimistic: T) {
        *self = match std::mem::replace(self, EditState::Settled(optimistic.clone())) {
            EditState::Settled(prior) => EditState::Pending { prior, optimistic },
            EditState::Pending { prior, .. } => EditState::Pending { prior, optimistic },
        };
    }

    /// The store acknowledged the write; `value` becomes the new known-good.
    pub fn confirm(&mut self, value: T) {
        *self = EditState::Settled(value);
    }

    /// The write failed; restore and return the prior known-good value.
    pub fn roll_back(&mut self) -> T {
        let restored = match std::mem::replace(self, EditState::Settled(self.current().clone())) {
            EditState::Pending { prior, .. } => prior,
            EditState::Settled(value) => value,
        };
        *self = EditState::Settled(restored.clone());
        restored
    }
}
