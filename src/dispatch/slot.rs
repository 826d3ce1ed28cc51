//! Per-key dispatch slot state machine.
//!
//! Pure state: the slot decides what a new submission or a transport
//! completion means, and the dispatcher performs the I/O. All transitions for
//! one key happen under that key's map entry, so caller submissions and
//! completions never interleave within a transition.

/// What the dispatcher must do after a submission.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SlotAction<V> {
    /// Nothing was outstanding: start a transport call with this value.
    Send(V),
    /// A different value is outstanding: the new value waits.
    /// `superseded` is true when an older waiting value was overwritten.
    Queued { superseded: bool },
    /// The outstanding value already equals the new one.
    /// `dropped_pending` is true when a waiting value was discarded.
    Collapsed { dropped_pending: bool },
}

#[derive(Debug)]
pub(crate) struct DispatchSlot<V> {
    in_transit: Option<V>,
    pending: Option<V>,
}

impl<V> Default for DispatchSlot<V> {
    fn default() -> Self {
        Self {
            in_transit: None,
            pending: None,
        }
    }
}

impl<V: Clone + PartialEq> DispatchSlot<V> {
    pub(crate) fn submit(&mut self, value: V) -> SlotAction<V> {
        match &self.in_transit {
            None => {
                self.in_transit = Some(value.clone());
                SlotAction::Send(value)
            }
            Some(current) if *current != value => SlotAction::Queued {
                superseded: self.pending.replace(value).is_some(),
            },
            Some(_) => SlotAction::Collapsed {
                dropped_pending: self.pending.take().is_some(),
            },
        }
    }

    /// Record the end of the outstanding call, success or failure alike.
    ///
    /// Returns the promoted pending value, which is now in transit and must
    /// be sent, or `None` when the slot went idle.
    pub(crate) fn complete(&mut self) -> Option<V> {
        self.in_transit = self.pending.take();
        self.in_transit.clone()
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.in_transit.is_none()
    }

    #[cfg(test)]
    pub(crate) fn pending(&self) -> Option<&V> {
        self.pending.as_ref()
    }
}
