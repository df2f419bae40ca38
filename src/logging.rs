/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Functions that log out events.
//!
//! The logs defined in this module are printed if the user enabled them via the engine's
//! [configuration](crate::config::Configuration).
//!
//! The engine logs using the [log](https://docs.rs/log/latest/log/) crate. To get these
//! messages printed onto a terminal or to a file, set up a
//! [logging implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
//!
//! ## Log message format
//!
//! Log messages are CSVs (Comma Separated Values) with at least two values. The first two
//! values are always:
//! 1. The name of the [event](crate::events) in PascalCase (defined in this module as
//!    constants).
//! 2. The time the event was emitted (as number of seconds since the Unix Epoch).
//!
//! The rest of the values differ depending on the kind of event. For example, the following
//! snippet is how a [DistributeCompleted](crate::events::DistributeCompletedEvent) is printed:
//!
//! ```text
//! DistributeCompleted, 1701329264, 17, 2
//! ```
//!
//! In the snippet, the third value is the number of nodes that received state and the fourth
//! is the number of envelopes parked for nodes not yet constructed.

use std::time::SystemTime;

use crate::events::*;

// Names of each event in PascalCase for printing:
pub const STATE_LOADED: &str = "StateLoaded";
pub const STATE_SAVED: &str = "StateSaved";
pub const DISTRIBUTE_COMPLETED: &str = "DistributeCompleted";
pub const CAPTURE_COMPLETED: &str = "CaptureCompleted";
pub const PENDING_STATE_APPLIED: &str = "PendingStateApplied";
pub const TOKEN_REGISTERED: &str = "TokenRegistered";
pub const TOKEN_VALIDATED: &str = "TokenValidated";

/// Implemented by event types. Used to get a closure that logs the event.
pub(crate) trait Logger {
    /// Returns a pointer to the default logging handler for a given event type.
    fn get_logger() -> Box<dyn Fn(&Self) + Send>;
}

impl Logger for StateLoadedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |state_loaded_event: &StateLoadedEvent| {
            log::info!(
                "{}, {}, {}",
                STATE_LOADED,
                secs_since_unix_epoch(state_loaded_event.timestamp),
                state_loaded_event.byte_len
            )
        };
        Box::new(logger)
    }
}

impl Logger for StateSavedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |state_saved_event: &StateSavedEvent| {
            log::info!(
                "{}, {}, {}",
                STATE_SAVED,
                secs_since_unix_epoch(state_saved_event.timestamp),
                state_saved_event.byte_len
            )
        };
        Box::new(logger)
    }
}

impl Logger for DistributeCompletedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |distribute_completed_event: &DistributeCompletedEvent| {
            log::info!(
                "{}, {}, {}, {}",
                DISTRIBUTE_COMPLETED,
                secs_since_unix_epoch(distribute_completed_event.timestamp),
                distribute_completed_event.applied,
                distribute_completed_event.deferred
            )
        };
        Box::new(logger)
    }
}

impl Logger for CaptureCompletedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |capture_completed_event: &CaptureCompletedEvent| {
            log::info!(
                "{}, {}, {}",
                CAPTURE_COMPLETED,
                secs_since_unix_epoch(capture_completed_event.timestamp),
                capture_completed_event.captured
            )
        };
        Box::new(logger)
    }
}

impl Logger for PendingStateAppliedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |pending_state_applied_event: &PendingStateAppliedEvent| {
            log::info!(
                "{}, {}, {}",
                PENDING_STATE_APPLIED,
                secs_since_unix_epoch(pending_state_applied_event.timestamp),
                pending_state_applied_event.locator
            )
        };
        Box::new(logger)
    }
}

impl Logger for TokenRegisteredEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |token_registered_event: &TokenRegisteredEvent| {
            log::debug!(
                "{}, {}, {}",
                TOKEN_REGISTERED,
                secs_since_unix_epoch(token_registered_event.timestamp),
                token_registered_event.token
            )
        };
        Box::new(logger)
    }
}

impl Logger for TokenValidatedEvent {
    fn get_logger() -> Box<dyn Fn(&Self) + Send> {
        let logger = |token_validated_event: &TokenValidatedEvent| {
            log::debug!(
                "{}, {}, {}",
                TOKEN_VALIDATED,
                secs_since_unix_epoch(token_validated_event.timestamp),
                token_validated_event.token
            )
        };
        Box::new(logger)
    }
}

fn secs_since_unix_epoch(timestamp: SystemTime) -> u64 {
    timestamp
        .duration_since(SystemTime::UNIX_EPOCH)
        .expect("Event occured before the Unix Epoch.")
        .as_secs()
}
