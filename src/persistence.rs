/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Pluggable persistence for serialized state blobs, and the transparent protection stage.
//!
//! The engine does not care where blobs live between requests; the user provides a
//! [StatePersister]. The standard [HiddenFieldPersister] keeps each field as a base64 string
//! the host embeds in a hidden form field and feeds back from the posted form. Server-side
//! stores implement the same trait.
//!
//! A [StateProtector], when configured, sees every blob on its way out and back in. The engine
//! treats it as bytes-in/bytes-out; the only signal it reacts to is
//! [ProtectionError::ValidationFailed], which aborts the load as a fatal error.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// The independently persisted state channels.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum StateField {
    TreeState,
    EventValidation,
}

impl StateField {
    /// The conventional hidden-field name for this channel.
    pub fn hidden_field_name(&self) -> &'static str {
        match self {
            StateField::TreeState => "__VIEWSTATE",
            StateField::EventValidation => "__EVENTVALIDATION",
        }
    }
}

impl Display for StateField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.hidden_field_name())
    }
}

/// Opaque sink and source for serialized blobs. Saving happens exactly once per field, at the
/// very end of a successful capture pass; a failed pass must not overwrite a previously saved
/// blob.
pub trait StatePersister {
    fn save(&mut self, field: StateField, bytes: &[u8]);
    fn load(&self, field: StateField) -> Result<Option<Vec<u8>>, PersistError>;
}

/// The standard persister: each field is a base64 string destined for a hidden form field.
pub struct HiddenFieldPersister {
    fields: HashMap<StateField, String>,
}

impl HiddenFieldPersister {
    pub fn new() -> HiddenFieldPersister {
        HiddenFieldPersister {
            fields: HashMap::new(),
        }
    }

    /// The encoded value the host should emit into markup for a field, if any.
    pub fn field_value(&self, field: StateField) -> Option<&str> {
        self.fields.get(&field).map(String::as_str)
    }

    /// Feed a value posted back by the client into the persister, so the next
    /// [load](StatePersister::load) sees it.
    pub fn set_field_value(&mut self, field: StateField, value: impl Into<String>) {
        self.fields.insert(field, value.into());
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }
}

impl Default for HiddenFieldPersister {
    fn default() -> Self {
        HiddenFieldPersister::new()
    }
}

impl StatePersister for HiddenFieldPersister {
    fn save(&mut self, field: StateField, bytes: &[u8]) {
        self.fields.insert(field, STANDARD.encode(bytes));
    }

    fn load(&self, field: StateField) -> Result<Option<Vec<u8>>, PersistError> {
        match self.fields.get(&field) {
            None => Ok(None),
            Some(value) => STANDARD
                .decode(value)
                .map(Some)
                .map_err(|source| PersistError::InvalidEncoding { field, source }),
        }
    }
}

/// Failure inside a persister. Always fatal for the load concerned.
#[derive(Debug)]
pub enum PersistError {
    /// A hidden-field value was not valid base64.
    InvalidEncoding {
        field: StateField,
        source: base64::DecodeError,
    },
    /// A user-provided store failed.
    Store { context: String },
}

impl Display for PersistError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            PersistError::InvalidEncoding { field, source } => {
                write!(f, "persisted value for {} is not valid base64: {}", field, source)
            }
            PersistError::Store { context } => write!(f, "state store failure: {}", context),
        }
    }
}

/// Optional sign/encrypt stage applied to blobs before save and inverted after load. The
/// engine treats it as transparent.
pub trait StateProtector {
    fn protect(&self, bytes: Vec<u8>) -> Vec<u8>;
    fn unprotect(&self, bytes: Vec<u8>) -> Result<Vec<u8>, ProtectionError>;
}

/// The protection stage rejected a blob. Always fatal; the load is aborted with no state
/// applied.
#[derive(Debug)]
pub enum ProtectionError {
    ValidationFailed,
}

impl Display for ProtectionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ProtectionError::ValidationFailed => write!(f, "unable to validate data"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hidden_field_round_trips_bytes_through_base64_text() {
        let mut persister = HiddenFieldPersister::new();
        let payload: Vec<u8> = (0u8..=255).collect();
        persister.save(StateField::TreeState, &payload);

        let text = persister.field_value(StateField::TreeState).unwrap().to_string();
        let mut posted = HiddenFieldPersister::new();
        posted.set_field_value(StateField::TreeState, text);
        assert_eq!(
            posted.load(StateField::TreeState).unwrap(),
            Some(payload)
        );
        assert_eq!(posted.load(StateField::EventValidation).unwrap(), None);
    }

    #[test]
    fn corrupted_field_value_is_a_load_error() {
        let mut persister = HiddenFieldPersister::new();
        persister.set_field_value(StateField::TreeState, "not!base64@@");
        assert!(persister.load(StateField::TreeState).is_err());
    }
}
