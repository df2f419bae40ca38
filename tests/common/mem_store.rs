//! A simple, volatile, in-memory implementation of [`StatePersister`], plus a digest-based
//! [`StateProtector`] used to exercise the tamper-signal path.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use sha2::{Digest, Sha256};
use viewstate_rs::persistence::{
    PersistError, ProtectionError, StateField, StatePersister, StateProtector,
};

/// An in-memory implementation of [`StatePersister`]. Clones share storage, so the "client"
/// side of a test can hand the same blobs to the next request's engine.
#[derive(Clone)]
pub(crate) struct MemStore(Arc<Mutex<HashMap<StateField, Vec<u8>>>>);

impl MemStore {
    /// Create a new, empty `MemStore`.
    pub(crate) fn new() -> MemStore {
        MemStore(Arc::new(Mutex::new(HashMap::new())))
    }

    /// Overwrite a stored blob directly, simulating a tampering client.
    pub(crate) fn tamper(&self, field: StateField, mutate: impl FnOnce(&mut Vec<u8>)) {
        let mut fields = self.0.lock().unwrap();
        let blob = fields.entry(field).or_default();
        mutate(blob);
    }

    pub(crate) fn raw(&self, field: StateField) -> Option<Vec<u8>> {
        self.0.lock().unwrap().get(&field).cloned()
    }
}

impl StatePersister for MemStore {
    fn save(&mut self, field: StateField, bytes: &[u8]) {
        self.0.lock().unwrap().insert(field, bytes.to_vec());
    }

    fn load(&self, field: StateField) -> Result<Option<Vec<u8>>, PersistError> {
        Ok(self.0.lock().unwrap().get(&field).cloned())
    }
}

/// A [`StateProtector`] that appends a SHA-256 digest on the way out and verifies and strips
/// it on the way in. Not a keyed MAC; only good for detecting accidental or test-injected
/// corruption.
pub(crate) struct DigestProtector;

impl StateProtector for DigestProtector {
    fn protect(&self, mut bytes: Vec<u8>) -> Vec<u8> {
        let digest = Sha256::digest(&bytes);
        bytes.extend_from_slice(&digest);
        bytes
    }

    fn unprotect(&self, mut bytes: Vec<u8>) -> Result<Vec<u8>, ProtectionError> {
        if bytes.len() < 32 {
            return Err(ProtectionError::ValidationFailed);
        }
        let payload_len = bytes.len() - 32;
        let digest = Sha256::digest(&bytes[..payload_len]);
        if digest.as_slice() != &bytes[payload_len..] {
            return Err(ProtectionError::ValidationFailed);
        }
        bytes.truncate(payload_len);
        Ok(bytes)
    }
}
