/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Definitions of engine events for event handling and logging.
//! Note: an event for a given action indicates that the action has been completed.

use std::sync::mpsc::Sender;
use std::time::SystemTime;

use crate::event_validation::EventToken;
use crate::state::ChildLocator;

pub enum Event {
    // Events at the persistence boundary.
    StateLoaded(StateLoadedEvent),
    StateSaved(StateSavedEvent),
    // Events completing a tree walk.
    DistributeCompleted(DistributeCompletedEvent),
    CaptureCompleted(CaptureCompletedEvent),
    // A backlog entry matched a late-attached node.
    PendingStateApplied(PendingStateAppliedEvent),
    // Integrity-guard activity.
    TokenRegistered(TokenRegisteredEvent),
    TokenValidated(TokenValidatedEvent),
}

impl Event {
    pub(crate) fn publish(event_publisher: &Option<Sender<Event>>, event: Event) {
        if let Some(event_publisher) = event_publisher {
            // The subscriber lives in the engine; if it is gone there is nobody left to
            // notify.
            let _ = event_publisher.send(event);
        }
    }
}

pub struct StateLoadedEvent {
    pub timestamp: SystemTime,
    pub byte_len: usize,
}

pub struct StateSavedEvent {
    pub timestamp: SystemTime,
    pub byte_len: usize,
}

pub struct DistributeCompletedEvent {
    pub timestamp: SystemTime,
    pub applied: usize,
    pub deferred: usize,
}

pub struct CaptureCompletedEvent {
    pub timestamp: SystemTime,
    pub captured: usize,
}

pub struct PendingStateAppliedEvent {
    pub timestamp: SystemTime,
    pub locator: ChildLocator,
}

pub struct TokenRegisteredEvent {
    pub timestamp: SystemTime,
    pub token: EventToken,
}

pub struct TokenValidatedEvent {
    pub timestamp: SystemTime,
    pub token: EventToken,
}
