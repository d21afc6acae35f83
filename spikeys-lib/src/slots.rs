use crate::{ErrorKind, RequestOutcome, Result};

/// Fixed-size storage for the outcomes of one run.
///
/// Every request is assigned its slot index when it is submitted, so the
/// order of [`ResultSlots::into_outcomes`] matches submission order no matter
/// in which order requests complete.
#[derive(Debug)]
pub(crate) struct ResultSlots {
    slots: Vec<Option<RequestOutcome>>,
}

impl ResultSlots {
    /// Create `len` empty slots
    pub(crate) fn new(len: usize) -> Self {
        Self {
            slots: std::iter::repeat_with(|| None).take(len).collect(),
        }
    }

    /// Store the outcome of request `index`.
    ///
    /// Each slot accepts exactly one write.
    pub(crate) fn fill(&mut self, index: usize, outcome: RequestOutcome) -> Result<()> {
        match self.slots.get_mut(index) {
            Some(slot) if slot.is_none() => {
                *slot = Some(outcome);
                Ok(())
            }
            // Out of range can only mean a bookkeeping bug, same as a double write
            _ => Err(ErrorKind::DuplicateOutcome(index)),
        }
    }

    /// All outcomes in slot order, or the index of the first empty slot
    pub(crate) fn into_outcomes(self) -> Result<Vec<RequestOutcome>> {
        self.slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| slot.ok_or(ErrorKind::MissingOutcome(index)))
            .collect()
    }
}
