use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use study_core::Session;
use study_core::model::Modality;

use crate::error::SessionError;

#[derive(Default)]
struct Slot {
    session: Option<Session>,
    busy: bool,
    /// Bumped by every reset; an in-flight operation only commits if it still matches.
    epoch: u64,
}

/// Live sessions, one slot per modality, plus the per-modality busy flag.
///
/// Injected into `SessionManager`; the lock is never held across an await.
#[derive(Default)]
pub struct SessionStore {
    slots: Mutex<HashMap<Modality, Slot>>,
}

impl SessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<Modality, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// A copy of the live session, if any.
    #[must_use]
    pub fn snapshot(&self, modality: Modality) -> Option<Session> {
        self.slots()
            .get(&modality)
            .and_then(|slot| slot.session.clone())
    }

    /// True while a remote call for `modality` is outstanding.
    #[must_use]
    pub fn is_busy(&self, modality: Modality) -> bool {
        self.slots().get(&modality).is_some_and(|slot| slot.busy)
    }

    /// Mark `modality` busy. The flag clears when the guard drops.
    pub(crate) fn lock(&self, modality: Modality) -> Result<BusyGuard<'_>, SessionError> {
        let mut slots = self.slots();
        let slot = slots.entry(modality).or_default();
        if slot.busy {
            return Err(SessionError::Busy { modality });
        }
        slot.busy = true;
        Ok(BusyGuard {
            store: self,
            modality,
            epoch: slot.epoch,
            session: slot.session.clone(),
        })
    }

    /// Write the result of a guarded operation back, unless a reset happened meanwhile.
    pub(crate) fn commit(&self, guard: &BusyGuard<'_>, session: Session) -> Result<(), SessionError> {
        let mut slots = self.slots();
        let slot = slots.entry(guard.modality).or_default();
        if slot.epoch != guard.epoch {
            return Err(SessionError::Superseded {
                modality: guard.modality,
            });
        }
        slot.session = Some(session);
        Ok(())
    }

    /// False once a reset has happened since `guard` was taken.
    pub(crate) fn is_current(&self, guard: &BusyGuard<'_>) -> bool {
        self.slots()
            .get(&guard.modality)
            .is_some_and(|slot| slot.epoch == guard.epoch)
    }

    /// Install a session restored from storage, only into an idle, empty slot.
    pub(crate) fn install_if_empty(&self, session: Session) -> Option<Session> {
        let mut slots = self.slots();
        let slot = slots.entry(session.modality()).or_default();
        if slot.busy || slot.session.is_some() {
            return slot.session.clone();
        }
        slot.session = Some(session.clone());
        Some(session)
    }

    /// Drop the live session and supersede any in-flight operation.
    pub(crate) fn clear(&self, modality: Modality) -> Option<Session> {
        let mut slots = self.slots();
        let slot = slots.entry(modality).or_default();
        slot.epoch += 1;
        slot.busy = false;
        slot.session.take()
    }
}

/// Held for the duration of one manager operation.
pub(crate) struct BusyGuard<'a> {
    store: &'a SessionStore,
    modality: Modality,
    epoch: u64,
    session: Option<Session>,
}

impl BusyGuard<'_> {
    /// Working copy of the session as it was when the guard was taken.
    pub(crate) fn session(&self) -> Result<Session, SessionError> {
        self.session.clone().ok_or(SessionError::NoSession {
            modality: self.modality,
        })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        let mut slots = self.store.slots();
        if let Some(slot) = slots.get_mut(&self.modality) {
            if slot.epoch == self.epoch {
                slot.busy = false;
            }
        }
    }
}
