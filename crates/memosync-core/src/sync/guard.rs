//! Per-data-type serialization of sync cycles.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::error::{Error, Result};
use crate::models::DataType;

#[derive(Debug, Default)]
struct Slot {
    in_flight: bool,
    last_started: Option<Instant>,
}

/// Admits at most one cycle per data type and throttles re-entry.
#[derive(Debug)]
pub struct CycleGuard {
    slots: Mutex<HashMap<DataType, Slot>>,
    cooldown: Duration,
}

/// Outcome of [`CycleGuard::try_begin`]
#[derive(Debug)]
pub enum Admission<'a> {
    /// The cycle may run; it ends when the permit is dropped
    Admitted(CyclePermit<'a>),
    /// The previous cycle started within the cooldown
    CoolingDown,
}

/// Held for the duration of one cycle
#[derive(Debug)]
pub struct CyclePermit<'a> {
    guard: &'a CycleGuard,
    data_type: DataType,
}

impl CycleGuard {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
            cooldown,
        }
    }

    /// Start a cycle for `data_type`.
    ///
    /// Fails with [`Error::CycleInProgress`] while another cycle for the same
    /// data type holds a permit.
    pub fn try_begin(&self, data_type: DataType) -> Result<Admission<'_>> {
        let mut slots = self
            .slots
            .lock()
            .map_err(|_| Error::Store("Cycle guard lock poisoned".to_string()))?;
        let slot = slots.entry(data_type).or_default();

        if slot.in_flight {
            return Err(Error::CycleInProgress(data_type));
        }
        let now = Instant::now();
        if slot
            .last_started
            .is_some_and(|started| now.duration_since(started) < self.cooldown)
        {
            return Ok(Admission::CoolingDown);
        }

        slot.in_flight = true;
        slot.last_started = Some(now);
        Ok(Admission::Admitted(CyclePermit {
            guard: self,
            data_type,
        }))
    }

    pub fn is_in_flight(&self, data_type: DataType) -> bool {
        self.slots
            .lock()
            .map(|slots| slots.get(&data_type).is_some_and(|slot| slot.in_flight))
            .unwrap_or(false)
    }
}

impl Drop for CyclePermit<'_> {
    fn drop(&mut self) {
        let mut slots = match self.guard.slots.lock() {
            Ok(slots) => slots,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(slot) = slots.get_mut(&self.data_type) {
            slot.in_flight = false;
        }
    }
}
