/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The per-node view-state container contract and its standard implementation.

use crate::codec::Value;
use crate::tree::TreeError;

/// Contract between the tree walk and a node's state store. The walk only ever reads a delta
/// out ([delta](Self::delta)), plays a delta back in ([apply_delta](Self::apply_delta)), and
/// arms change tracking once construction is done ([begin_tracking](Self::begin_tracking)).
///
/// Delta blobs are values encodable by the codec; the standard implementation produces a
/// heterogeneous ordered map of changed entries only.
pub trait StateContainer {
    fn delta(&self) -> Option<Value>;
    fn apply_delta(&mut self, delta: &Value) -> Result<(), TreeError>;
    fn begin_tracking(&mut self);
}

/// Adapter-specific state attached to a node, captured and restored alongside the node's own
/// delta. Implementations own their state and interpret their own blobs.
pub trait StateAdapter {
    fn capture(&self) -> Option<Value>;
    fn restore(&mut self, state: &Value);
}

struct BagItem {
    key: String,
    value: Value,
    dirty: bool,
}

/// Insertion-ordered key→value store with per-entry change tracking.
///
/// Until [begin_tracking](StateBag::begin_tracking) is called, writes are considered part of
/// construction and are not recorded as changes; afterwards every write marks its entry dirty,
/// and only dirty entries make it into the delta. Setting `Null` while not tracking removes
/// the entry.
pub struct StateBag {
    items: Vec<BagItem>,
    tracking: bool,
}

impl StateBag {
    pub fn new() -> StateBag {
        StateBag {
            items: Vec::new(),
            tracking: false,
        }
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| item.key == key)
            .map(|item| &item.value)
    }

    /// Insert or update an entry. While tracking, the entry is marked dirty; a `Null` written
    /// while not tracking removes the entry instead.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        let value = value.into();
        if value.is_null() && !self.tracking {
            self.remove(key);
            return;
        }
        let tracking = self.tracking;
        match self.items.iter_mut().find(|item| item.key == key) {
            Some(item) => {
                item.value = value;
                item.dirty |= tracking;
            }
            None => self.items.push(BagItem {
                key: key.to_string(),
                value,
                dirty: tracking,
            }),
        }
    }

    pub fn remove(&mut self, key: &str) {
        self.items.retain(|item| item.key != key);
    }

    pub fn is_item_dirty(&self, key: &str) -> bool {
        self.items
            .iter()
            .find(|item| item.key == key)
            .map(|item| item.dirty)
            .unwrap_or(false)
    }

    pub fn set_item_dirty(&mut self, key: &str, dirty: bool) {
        if let Some(item) = self.items.iter_mut().find(|item| item.key == key) {
            item.dirty = dirty;
        }
    }

    /// Mark every entry dirty or clean at once.
    pub fn set_dirty(&mut self, dirty: bool) {
        for item in &mut self.items {
            item.dirty = dirty;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.items
            .iter()
            .map(|item| (item.key.as_str(), &item.value))
    }
}

impl Default for StateBag {
    fn default() -> Self {
        StateBag::new()
    }
}

impl StateContainer for StateBag {
    /// The changed entries as an ordered map, or `None` when nothing changed.
    fn delta(&self) -> Option<Value> {
        let entries: Vec<(Value, Value)> = self
            .items
            .iter()
            .filter(|item| item.dirty)
            .map(|item| (Value::String(item.key.clone()), item.value.clone()))
            .collect();
        if entries.is_empty() {
            None
        } else {
            Some(Value::Map(entries))
        }
    }

    /// Replay a delta produced by [delta](Self::delta). Entries land via [set](StateBag::set),
    /// so a delta applied after tracking began stays dirty and survives the next capture.
    fn apply_delta(&mut self, delta: &Value) -> Result<(), TreeError> {
        let entries = match delta {
            Value::Map(entries) => entries,
            _ => {
                return Err(TreeError::MalformedDelta {
                    context: "state-bag delta is not a map",
                })
            }
        };
        for (key, value) in entries {
            let key = match key {
                Value::String(key) => key,
                _ => {
                    return Err(TreeError::MalformedDelta {
                        context: "state-bag delta key is not a string",
                    })
                }
            };
            self.set(key, value.clone());
        }
        Ok(())
    }

    fn begin_tracking(&mut self) {
        self.tracking = true;
    }
}
