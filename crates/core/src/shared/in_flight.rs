use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Single best-effort "request pending" flag.
///
/// Guards a UI-level resource against a second concurrent submission. It is
/// not a lock: another process can still race the same remote entity.
#[derive(Debug, Default)]
pub struct InFlightFlag {
    busy: Arc<AtomicBool>,
}

impl InFlightFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag, or returns `None` when it is already set.
    pub fn try_claim(&self) -> Option<FlagClaim> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlagClaim {
                busy: self.busy.clone(),
            })
    }

    pub fn is_set(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Whether `claim` was taken from this flag.
    pub fn owns(&self, claim: &FlagClaim) -> bool {
        Arc::ptr_eq(&self.busy, &claim.busy)
    }
}

/// Clears its flag on drop.
#[derive(Debug)]
pub struct FlagClaim {
    busy: Arc<AtomicBool>,
}

impl Drop for FlagClaim {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Per-key variant of [`InFlightFlag`], keyed by person name.
#[derive(Debug, Default, Clone)]
pub struct InFlightSet {
    keys: Arc<Mutex<HashSet<String>>>,
}

impl InFlightSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_claim(&self, key: &str) -> Option<KeyClaim> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        if !keys.insert(key.to_string()) {
            return None;
        }
        Some(KeyClaim {
            keys: self.keys.clone(),
            key: key.to_string(),
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(key)
    }
}

/// Removes its key from the owning set on drop.
#[derive(Debug)]
pub struct KeyClaim {
    keys: Arc<Mutex<HashSet<String>>>,
    key: String,
}

impl Drop for KeyClaim {
    fn drop(&mut self) {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}
