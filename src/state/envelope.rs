/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The captured-state units: per-node envelopes, child locators, and their codec form.

use std::fmt::{self, Display, Formatter};

use crate::codec::Value;
use crate::tree::TreeError;

/// How a child envelope is matched back to a live child: by position in the child list, or by
/// local name when the parent keys its children by name.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ChildLocator {
    Position(u32),
    Name(String),
}

impl Display for ChildLocator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ChildLocator::Position(index) => write!(f, "[{}]", index),
            ChildLocator::Name(name) => write!(f, "'{}'", name),
        }
    }
}

/// One node's captured state: its own delta, its adapter's delta, and the envelopes of the
/// children that produced one. An envelope with nothing in it is never materialized; absence
/// means "nothing changed, nothing to restore".
#[derive(Clone, Debug, PartialEq)]
pub struct StateEnvelope {
    pub own: Option<Value>,
    pub adapter: Option<Value>,
    pub children: Vec<(ChildLocator, StateEnvelope)>,
}

impl StateEnvelope {
    pub fn is_trivial(&self) -> bool {
        self.own.is_none() && self.adapter.is_none() && self.children.is_empty()
    }

    /// Wire shape: `Pair(Pair(own, adapter), List[Pair(locator, child)])`, with `Null` standing
    /// in for each absent half.
    pub fn to_value(&self) -> Value {
        let own = self.own.clone().unwrap_or(Value::Null);
        let adapter = self.adapter.clone().unwrap_or(Value::Null);
        let children = if self.children.is_empty() {
            Value::Null
        } else {
            Value::List(
                self.children
                    .iter()
                    .map(|(locator, child)| {
                        Value::pair(locator_to_value(locator), child.to_value())
                    })
                    .collect(),
            )
        };
        Value::pair(Value::pair(own, adapter), children)
    }

    pub fn from_value(value: &Value) -> Result<StateEnvelope, TreeError> {
        let (head, children_value) = match value {
            Value::Pair(head, children) => (head.as_ref(), children.as_ref()),
            _ => {
                return Err(TreeError::MalformedEnvelope {
                    context: "envelope is not a pair",
                })
            }
        };
        let (own, adapter) = match head {
            Value::Pair(own, adapter) => (own.as_ref(), adapter.as_ref()),
            _ => {
                return Err(TreeError::MalformedEnvelope {
                    context: "envelope head is not a pair",
                })
            }
        };
        let mut children = Vec::new();
        match children_value {
            Value::Null => {}
            Value::List(items) => {
                for item in items {
                    match item {
                        Value::Pair(locator, child) => {
                            children.push((
                                locator_from_value(locator)?,
                                StateEnvelope::from_value(child)?,
                            ));
                        }
                        _ => {
                            return Err(TreeError::MalformedEnvelope {
                                context: "child entry is not a pair",
                            })
                        }
                    }
                }
            }
            _ => {
                return Err(TreeError::MalformedEnvelope {
                    context: "child list is neither absent nor a list",
                })
            }
        }
        Ok(StateEnvelope {
            own: non_null(own),
            adapter: non_null(adapter),
            children,
        })
    }
}

fn non_null(value: &Value) -> Option<Value> {
    if value.is_null() {
        None
    } else {
        Some(value.clone())
    }
}

fn locator_to_value(locator: &ChildLocator) -> Value {
    match locator {
        ChildLocator::Position(index) => Value::I32(*index as i32),
        ChildLocator::Name(name) => Value::String(name.clone()),
    }
}

fn locator_from_value(value: &Value) -> Result<ChildLocator, TreeError> {
    match value {
        Value::I32(index) if *index >= 0 => Ok(ChildLocator::Position(*index as u32)),
        Value::String(name) => Ok(ChildLocator::Name(name.clone())),
        _ => Err(TreeError::MalformedEnvelope {
            context: "child locator is neither a position nor a name",
        }),
    }
}

/// Fold the root envelope and the forced-postback identifier list into the single value that
/// gets serialized. `None` when there is nothing at all to persist.
pub(crate) fn root_to_value(
    envelope: Option<&StateEnvelope>,
    requires_postback: &[String],
) -> Option<Value> {
    if envelope.is_none() && requires_postback.is_empty() {
        return None;
    }
    let envelope_value = envelope.map(StateEnvelope::to_value).unwrap_or(Value::Null);
    let postback_value = if requires_postback.is_empty() {
        Value::Null
    } else {
        Value::List(
            requires_postback
                .iter()
                .map(|id| Value::String(id.clone()))
                .collect(),
        )
    };
    Some(Value::pair(envelope_value, postback_value))
}

pub(crate) fn root_from_value(
    value: &Value,
) -> Result<(Option<StateEnvelope>, Vec<String>), TreeError> {
    let (envelope_value, postback_value) = match value {
        Value::Pair(envelope, postback) => (envelope.as_ref(), postback.as_ref()),
        _ => {
            return Err(TreeError::MalformedEnvelope {
                context: "root state is not a pair",
            })
        }
    };
    let envelope = match envelope_value {
        Value::Null => None,
        value => Some(StateEnvelope::from_value(value)?),
    };
    let mut requires_postback = Vec::new();
    match postback_value {
        Value::Null => {}
        Value::List(items) => {
            for item in items {
                match item {
                    Value::String(id) => requires_postback.push(id.clone()),
                    _ => {
                        return Err(TreeError::MalformedEnvelope {
                            context: "forced-postback entry is not a string",
                        })
                    }
                }
            }
        }
        _ => {
            return Err(TreeError::MalformedEnvelope {
                context: "forced-postback list is neither absent nor a list",
            })
        }
    }
    Ok((envelope, requires_postback))
}
