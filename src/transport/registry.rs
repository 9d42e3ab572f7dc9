//! Peers whose simultaneous connect is currently being resolved

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::crypto::PeerId;

/// At most one resolution per remote peer may be in flight
#[derive(Debug, Default)]
pub(crate) struct RaceRegistry {
    active: Mutex<HashSet<PeerId>>,
}

impl RaceRegistry {
    /// Claim `peer`, or `None` if a resolution with it is already running
    pub(crate) fn try_enter(&self, peer: PeerId) -> Option<RaceTicket<'_>> {
        if !self.lock().insert(peer) {
            return None;
        }
        Some(RaceTicket {
            registry: self,
            peer,
        })
    }

    #[cfg(test)]
    pub(crate) fn is_active(&self, peer: &PeerId) -> bool {
        self.lock().contains(peer)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PeerId>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases the claim on drop
#[derive(Debug)]
pub(crate) struct RaceTicket<'a> {
    registry: &'a RaceRegistry,
    peer: PeerId,
}

impl Drop for RaceTicket<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.peer);
    }
}
