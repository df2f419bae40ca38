/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! The event-integrity guard: only postback and callback events the server actually offered
//! during rendering are accepted on the next request.
//!
//! While a response renders, every event reference emitted to the client is
//! [registered](EventValidator::register) as an [EventToken], a non-cryptographic fingerprint
//! of the target's hierarchical identifier and the optional argument string. The accumulated
//! set is serialized with the captured state; on the next request it is restored read-only and
//! every incoming event must be [validated](EventValidator::validate) against it before
//! dispatch. A token that was never offered is treated as a tamper or staleness signal and
//! fails loudly.
//!
//! Registration is only legal inside the Accepting window (between
//! [begin_render](EventValidator::begin_render) and [end_render](EventValidator::end_render))
//! for interactive requests. Out-of-band (callback) requests may register after rendering
//! concludes; whether anything was registered at all then gates whether a token set is emitted
//! for the follow-up round trip.

use std::collections::hash_map::DefaultHasher;
use std::fmt::{self, Display, Formatter};
use std::hash::{Hash, Hasher};

use crate::codec::{TypeDescriptor, Value};

/// Fingerprint of one offered (identifier, argument) event pair.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct EventToken(u32);

impl EventToken {
    /// hash(identifier) XOR hash(argument); an absent or empty argument contributes nothing.
    pub fn compute(unique_id: &str, argument: Option<&str>) -> EventToken {
        let mut hasher = DefaultHasher::new();
        unique_id.hash(&mut hasher);
        let id_hash = hasher.finish() as u32;
        let argument_hash = match argument {
            Some(argument) if !argument.is_empty() => {
                let mut hasher = DefaultHasher::new();
                argument.hash(&mut hasher);
                hasher.finish() as u32
            }
            _ => 0,
        };
        EventToken(id_hash ^ argument_hash)
    }

    pub const fn int(&self) -> u32 {
        self.0
    }
}

impl Display for EventToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// The flavor of the request being processed.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RequestKind {
    /// A normal postback round trip. Registration must happen during rendering.
    Interactive,
    /// An out-of-band callback. Registration may happen after rendering concludes.
    OutOfBand,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum RenderPhase {
    Idle,
    Accepting,
    Closed,
}

pub struct EventValidator {
    enabled: bool,
    request_kind: RequestKind,
    phase: RenderPhase,
    /// Tokens offered during this request's render pass, in registration order, deduplicated.
    offered: Vec<EventToken>,
    /// The token set restored from the previous request, read-only.
    restored: Option<Vec<EventToken>>,
    /// Whether an out-of-band request registered anything at all; gates state emission.
    registered_out_of_band: bool,
}

impl EventValidator {
    pub fn new(enabled: bool, request_kind: RequestKind) -> EventValidator {
        EventValidator {
            enabled,
            request_kind,
            phase: RenderPhase::Idle,
            offered: Vec::new(),
            restored: None,
            registered_out_of_band: false,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Open the Accepting window. The offered set resets; it accumulates once per render pass.
    pub fn begin_render(&mut self) {
        self.phase = RenderPhase::Accepting;
        self.offered.clear();
    }

    /// Close the Accepting window. The accumulated set is read-only from here on (except for
    /// out-of-band registrations).
    pub fn end_render(&mut self) {
        self.phase = RenderPhase::Closed;
    }

    /// Offer an event to the client. Returns the token on first registration, `None` when the
    /// identical (identifier, argument) pair was already offered or the guard is disabled.
    ///
    /// For interactive requests, calling this outside the Accepting window is a programming
    /// error and fails loudly. Out-of-band requests may register at any time.
    pub fn register(
        &mut self,
        unique_id: &str,
        argument: Option<&str>,
    ) -> Result<Option<EventToken>, ValidationError> {
        if !self.enabled || unique_id.is_empty() {
            return Ok(None);
        }
        match self.request_kind {
            RequestKind::OutOfBand => self.registered_out_of_band = true,
            RequestKind::Interactive => {
                if self.phase != RenderPhase::Accepting {
                    return Err(ValidationError::RegisteredOutsideRenderWindow);
                }
            }
        }
        let token = EventToken::compute(unique_id, argument);
        if self.offered.contains(&token) {
            return Ok(None);
        }
        self.offered.push(token);
        Ok(Some(token))
    }

    /// Check an incoming event against the set restored from the previous request. A missing
    /// set (nothing was ever offered) and an unknown token both fail: absence of an offer is
    /// indistinguishable from tampering.
    pub fn validate(
        &self,
        unique_id: &str,
        argument: Option<&str>,
    ) -> Result<Option<EventToken>, ValidationError> {
        if unique_id.is_empty() {
            return Err(ValidationError::EmptyTarget);
        }
        if !self.enabled {
            return Ok(None);
        }
        let token = EventToken::compute(unique_id, argument);
        let restored = self
            .restored
            .as_ref()
            .ok_or(ValidationError::UnknownEventToken { token })?;
        if restored.contains(&token) {
            Ok(Some(token))
        } else {
            Err(ValidationError::UnknownEventToken { token })
        }
    }

    /// The offered set as a codec value, or `None` when there is nothing to emit: guard
    /// disabled, nothing registered, or an out-of-band pass that never registered.
    pub fn state_value(&self) -> Option<Value> {
        if !self.enabled || self.offered.is_empty() {
            return None;
        }
        if self.request_kind == RequestKind::OutOfBand && !self.registered_out_of_band {
            return None;
        }
        Some(Value::Array {
            elem: TypeDescriptor::new("i32"),
            items: self
                .offered
                .iter()
                .map(|token| Value::I32(token.int() as i32))
                .collect(),
        })
    }

    /// Restore the previous request's token set from its decoded codec value.
    ///
    /// The restored tokens also seed the accumulating set: an out-of-band request that never
    /// re-renders carries the previous offer forward (plus anything it registers), while an
    /// interactive request discards it when [begin_render](Self::begin_render) resets the set.
    pub fn restore_state(&mut self, value: &Value) -> Result<(), ValidationError> {
        let items = match value {
            Value::Array { items, .. } => items,
            _ => return Err(ValidationError::MalformedState),
        };
        let mut tokens = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Value::I32(raw) => tokens.push(EventToken(*raw as u32)),
                _ => return Err(ValidationError::MalformedState),
            }
        }
        self.offered = tokens.clone();
        self.restored = Some(tokens);
        Ok(())
    }
}

/// Integrity-guard violations. [UnknownEventToken](Self::UnknownEventToken) is
/// security-relevant and must never be silently ignored.
#[derive(Debug)]
pub enum ValidationError {
    /// An interactive request registered a token outside the Accepting window.
    RegisteredOutsideRenderWindow,
    /// Validation was attempted with an empty target identifier.
    EmptyTarget,
    /// The incoming event was not in the offered set; a tamper or staleness signal.
    UnknownEventToken { token: EventToken },
    /// The restored token set did not have the expected shape.
    MalformedState,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::RegisteredOutsideRenderWindow => write!(
                f,
                "events may only be registered for validation while rendering"
            ),
            ValidationError::EmptyTarget => {
                write!(f, "event validation target must not be empty")
            }
            ValidationError::UnknownEventToken { token } => write!(
                f,
                "invalid postback or callback argument: token {} was not offered by the server",
                token
            ),
            ValidationError::MalformedState => {
                write!(f, "restored event-validation state is malformed")
            }
        }
    }
}
