/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Dispatch of engine events to registered handler closures.
//!
//! The engine is single-request, single-thread-of-control, so there is no bus thread: events
//! queue on a channel while a pass runs and are drained synchronously at the pass boundary.

use std::sync::mpsc::Receiver;

use crate::events::*;
use crate::logging::Logger;

pub(crate) type HandlerPtr<T> = Box<dyn Fn(&T) + Send>;

pub(crate) struct EventHandlers {
    pub(crate) state_loaded_handlers: Vec<HandlerPtr<StateLoadedEvent>>,
    pub(crate) state_saved_handlers: Vec<HandlerPtr<StateSavedEvent>>,
    pub(crate) distribute_completed_handlers: Vec<HandlerPtr<DistributeCompletedEvent>>,
    pub(crate) capture_completed_handlers: Vec<HandlerPtr<CaptureCompletedEvent>>,
    pub(crate) pending_state_applied_handlers: Vec<HandlerPtr<PendingStateAppliedEvent>>,
    pub(crate) token_registered_handlers: Vec<HandlerPtr<TokenRegisteredEvent>>,
    pub(crate) token_validated_handlers: Vec<HandlerPtr<TokenValidatedEvent>>,
}

impl EventHandlers {
    pub(crate) fn new() -> EventHandlers {
        EventHandlers {
            state_loaded_handlers: Vec::new(),
            state_saved_handlers: Vec::new(),
            distribute_completed_handlers: Vec::new(),
            capture_completed_handlers: Vec::new(),
            pending_state_applied_handlers: Vec::new(),
            token_registered_handlers: Vec::new(),
            token_validated_handlers: Vec::new(),
        }
    }

    /// Prepend the default logging handler for every event type.
    pub(crate) fn install_loggers(&mut self) {
        self.state_loaded_handlers.push(StateLoadedEvent::get_logger());
        self.state_saved_handlers.push(StateSavedEvent::get_logger());
        self.distribute_completed_handlers
            .push(DistributeCompletedEvent::get_logger());
        self.capture_completed_handlers
            .push(CaptureCompletedEvent::get_logger());
        self.pending_state_applied_handlers
            .push(PendingStateAppliedEvent::get_logger());
        self.token_registered_handlers
            .push(TokenRegisteredEvent::get_logger());
        self.token_validated_handlers
            .push(TokenValidatedEvent::get_logger());
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.state_loaded_handlers.is_empty()
            && self.state_saved_handlers.is_empty()
            && self.distribute_completed_handlers.is_empty()
            && self.capture_completed_handlers.is_empty()
            && self.pending_state_applied_handlers.is_empty()
            && self.token_registered_handlers.is_empty()
            && self.token_validated_handlers.is_empty()
    }

    pub(crate) fn fire_handlers(&self, event: Event) {
        match event {
            Event::StateLoaded(state_loaded_event) => self
                .state_loaded_handlers
                .iter()
                .for_each(|handler| handler(&state_loaded_event)),

            Event::StateSaved(state_saved_event) => self
                .state_saved_handlers
                .iter()
                .for_each(|handler| handler(&state_saved_event)),

            Event::DistributeCompleted(distribute_completed_event) => self
                .distribute_completed_handlers
                .iter()
                .for_each(|handler| handler(&distribute_completed_event)),

            Event::CaptureCompleted(capture_completed_event) => self
                .capture_completed_handlers
                .iter()
                .for_each(|handler| handler(&capture_completed_event)),

            Event::PendingStateApplied(pending_state_applied_event) => self
                .pending_state_applied_handlers
                .iter()
                .for_each(|handler| handler(&pending_state_applied_event)),

            Event::TokenRegistered(token_registered_event) => self
                .token_registered_handlers
                .iter()
                .for_each(|handler| handler(&token_registered_event)),

            Event::TokenValidated(token_validated_event) => self
                .token_validated_handlers
                .iter()
                .for_each(|handler| handler(&token_validated_event)),
        }
    }
}

/// Drain every queued event into the handlers. Called at pass boundaries.
pub(crate) fn drain_events(event_handlers: &EventHandlers, event_subscriber: &Receiver<Event>) {
    while let Ok(event) = event_subscriber.try_recv() {
        event_handlers.fire_handlers(event);
    }
}
