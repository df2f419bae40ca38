/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Methods to build and drive the state engine across one request.
//!
//! The engine ties the subsystems together at the two request boundaries:
//!
//! - [restore](StateEngine::restore): persister load → protection stage → codec decode →
//!   distribute over the tree, then the same for the integrity guard's token set.
//! - [persist](StateEngine::persist): capture from the tree → codec encode → protection stage
//!   → persister save, then the same for the token set.
//!
//! Between the two, the host runs its normal lifecycle: posted-data processing, event
//! dispatch (validated through [validate_event](StateEngine::validate_event)), rendering
//! (with [register_event](StateEngine::register_event) inside the
//! [begin_render](StateEngine::begin_render)/[end_render](StateEngine::end_render) window).
//!
//! A persister save happens only after every fallible step of a pass has succeeded; a failure
//! anywhere leaves the previously persisted blobs untouched, so an abandoned request never
//! produces a partially-written blob.
//!
//! ## Building an engine
//!
//! The builder-pattern interface mirrors the configuration type:
//!
//! ```ignore
//! let mut engine =
//!     EngineSpec::builder()
//!     .persister(HiddenFieldPersister::new())
//!     .configuration(configuration)
//!     .on_state_loaded(|event| println!("loaded {} bytes", event.byte_len))
//!     .build()
//!     .initialize();
//! ```
//!
//! ### Required setters
//!
//! - `.persister(...)`
//! - `.configuration(...)`
//!
//! ### Optional setters
//!
//! - `.protector(...)`
//! - `.request_kind(...)`
//! - `.on_state_loaded(...)`
//! - `.on_state_saved(...)`
//! - `.on_distribute_completed(...)`
//! - `.on_capture_completed(...)`
//! - `.on_pending_state_applied(...)`
//! - `.on_token_registered(...)`
//! - `.on_token_validated(...)`

use std::fmt::{self, Display, Formatter};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::SystemTime;

use typed_builder::TypedBuilder;

use crate::codec::{CodecError, FormatterRegistry, ObjectGraphCodec};
use crate::config::Configuration;
use crate::event_bus::{drain_events, EventHandlers, HandlerPtr};
use crate::event_validation::{EventValidator, RequestKind, ValidationError};
use crate::events::*;
use crate::persistence::{
    PersistError, ProtectionError, StateField, StatePersister, StateProtector,
};
use crate::state::{capture_root, distribute_root};
use crate::tree::{ControlTree, NodeId, TreeError};

/// Stores all necessary parameters and trait implementations required to run a [StateEngine].
#[derive(TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building an [EngineSpec]. On the builder call the following methods to construct a valid [EngineSpec].

    Required:
    - `.persister(...)`
    - `.configuration(...)`

    Optional:
    - `.protector(...)`
    - `.request_kind(...)`
    - `.on_state_loaded(...)`
    - `.on_state_saved(...)`
    - `.on_distribute_completed(...)`
    - `.on_capture_completed(...)`
    - `.on_pending_state_applied(...)`
    - `.on_token_registered(...)`
    - `.on_token_validated(...)`
"))]
pub struct EngineSpec<P: StatePersister> {
    // Required parameters
    #[builder(setter(doc = "Set the persistence provider for serialized state blobs. The argument must implement the [StatePersister](crate::persistence::StatePersister) trait. Required."))]
    persister: P,
    #[builder(setter(doc = "Set the [configuration](Configuration), which contains the necessary parameters to run the engine. Required."))]
    configuration: Configuration,
    // Optional parameters
    #[builder(default, setter(transform = |protector: impl StateProtector + 'static| Some(Box::new(protector) as Box<dyn StateProtector>),
    doc = "Set the transparent sign/encrypt stage applied to blobs around persistence. Optional."))]
    protector: Option<Box<dyn StateProtector>>,
    #[builder(default = RequestKind::Interactive, setter(doc = "Set the flavor of the request being processed. Defaults to Interactive."))]
    request_kind: RequestKind,
    #[builder(default, setter(transform = |handler: impl Fn(&StateLoadedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StateLoadedEvent>),
    doc = "Register a handler closure to be invoked after a persisted blob is decoded and distributed. Optional."))]
    on_state_loaded: Option<HandlerPtr<StateLoadedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&StateSavedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<StateSavedEvent>),
    doc = "Register a handler closure to be invoked after a captured blob is handed to the persister. Optional."))]
    on_state_saved: Option<HandlerPtr<StateSavedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&DistributeCompletedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<DistributeCompletedEvent>),
    doc = "Register a handler closure to be invoked after a distribute pass completes. Optional."))]
    on_distribute_completed: Option<HandlerPtr<DistributeCompletedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&CaptureCompletedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<CaptureCompletedEvent>),
    doc = "Register a handler closure to be invoked after a capture pass completes. Optional."))]
    on_capture_completed: Option<HandlerPtr<CaptureCompletedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&PendingStateAppliedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<PendingStateAppliedEvent>),
    doc = "Register a handler closure to be invoked after a backlog entry is applied to a late-attached node. Optional."))]
    on_pending_state_applied: Option<HandlerPtr<PendingStateAppliedEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TokenRegisteredEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TokenRegisteredEvent>),
    doc = "Register a handler closure to be invoked after an event token is offered to the client. Optional."))]
    on_token_registered: Option<HandlerPtr<TokenRegisteredEvent>>,
    #[builder(default, setter(transform = |handler: impl Fn(&TokenValidatedEvent) + Send + 'static| Some(Box::new(handler) as HandlerPtr<TokenValidatedEvent>),
    doc = "Register a handler closure to be invoked after an incoming event passes validation. Optional."))]
    on_token_validated: Option<HandlerPtr<TokenValidatedEvent>>,
}

impl<P: StatePersister> EngineSpec<P> {
    /// Assemble the engine for one request.
    pub fn initialize(self) -> StateEngine<P> {
        let mut event_handlers = EventHandlers::new();
        if self.configuration.log_events {
            event_handlers.install_loggers();
        }
        if let Some(handler) = self.on_state_loaded {
            event_handlers.state_loaded_handlers.push(handler);
        }
        if let Some(handler) = self.on_state_saved {
            event_handlers.state_saved_handlers.push(handler);
        }
        if let Some(handler) = self.on_distribute_completed {
            event_handlers.distribute_completed_handlers.push(handler);
        }
        if let Some(handler) = self.on_capture_completed {
            event_handlers.capture_completed_handlers.push(handler);
        }
        if let Some(handler) = self.on_pending_state_applied {
            event_handlers.pending_state_applied_handlers.push(handler);
        }
        if let Some(handler) = self.on_token_registered {
            event_handlers.token_registered_handlers.push(handler);
        }
        if let Some(handler) = self.on_token_validated {
            event_handlers.token_validated_handlers.push(handler);
        }

        let (event_publisher, event_subscriber) = if event_handlers.is_empty() {
            (None, None)
        } else {
            let (publisher, subscriber) = mpsc::channel();
            (Some(publisher), Some(subscriber))
        };

        let validator =
            EventValidator::new(self.configuration.enable_event_validation, self.request_kind);

        StateEngine {
            persister: self.persister,
            protector: self.protector,
            configuration: self.configuration,
            registry: FormatterRegistry::standard(),
            validator,
            event_handlers,
            event_publisher,
            event_subscriber,
        }
    }
}

/// One request's state-processing engine.
pub struct StateEngine<P: StatePersister> {
    persister: P,
    protector: Option<Box<dyn StateProtector>>,
    configuration: Configuration,
    registry: FormatterRegistry,
    validator: EventValidator,
    event_handlers: EventHandlers,
    event_publisher: Option<Sender<Event>>,
    event_subscriber: Option<Receiver<Event>>,
}

impl<P: StatePersister> StateEngine<P> {
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    pub fn registry(&self) -> &FormatterRegistry {
        &self.registry
    }

    pub fn persister(&self) -> &P {
        &self.persister
    }

    pub fn persister_mut(&mut self) -> &mut P {
        &mut self.persister
    }

    pub fn validator(&self) -> &EventValidator {
        &self.validator
    }

    /// Route tree-originated events (backlog hits on late attach) to this engine's handlers.
    pub fn bind(&self, tree: &mut ControlTree) {
        if let Some(publisher) = &self.event_publisher {
            tree.set_event_publisher(publisher.clone());
        }
    }

    /// Load the persisted blobs, decode them, and distribute state over the tree. Nothing
    /// persisted is not an error; the tree is simply left untouched.
    pub fn restore(&mut self, tree: &mut ControlTree) -> Result<(), StateError> {
        let result = self.restore_inner(tree);
        self.drain();
        result
    }

    fn restore_inner(&mut self, tree: &mut ControlTree) -> Result<(), StateError> {
        if let Some(raw) = self.persister.load(StateField::TreeState)? {
            if !raw.is_empty() {
                let raw = self.unprotect(raw)?;
                let byte_len = raw.len();
                let value = ObjectGraphCodec::new(&self.registry).decode(&raw)?;
                let outcome = distribute_root(tree, &value)?;
                Event::publish(
                    &self.event_publisher,
                    Event::StateLoaded(StateLoadedEvent {
                        timestamp: SystemTime::now(),
                        byte_len,
                    }),
                );
                Event::publish(
                    &self.event_publisher,
                    Event::DistributeCompleted(DistributeCompletedEvent {
                        timestamp: SystemTime::now(),
                        applied: outcome.applied,
                        deferred: outcome.deferred,
                    }),
                );
            }
        }
        if self.validator.is_enabled() {
            if let Some(raw) = self.persister.load(StateField::EventValidation)? {
                if !raw.is_empty() {
                    let raw = self.unprotect(raw)?;
                    let value = ObjectGraphCodec::new(&self.registry).decode(&raw)?;
                    self.validator.restore_state(&value)?;
                }
            }
        }
        Ok(())
    }

    /// Capture state from the tree, encode it, and hand the blobs to the persister. Every
    /// fallible step runs before the first save, so a failure cannot leave a partially
    /// written blob behind.
    pub fn persist(&mut self, tree: &mut ControlTree) -> Result<(), StateError> {
        let result = self.persist_inner(tree);
        self.drain();
        result
    }

    fn persist_inner(&mut self, tree: &mut ControlTree) -> Result<(), StateError> {
        let (root_value, captured) = capture_root(tree)?;
        let tree_bytes = match &root_value {
            Some(value) => {
                let bytes = ObjectGraphCodec::new(&self.registry).encode(value)?;
                Some(self.protect(bytes))
            }
            None => None,
        };
        let validation_bytes = match self.validator.state_value() {
            Some(value) => {
                let bytes = ObjectGraphCodec::new(&self.registry).encode(&value)?;
                Some(self.protect(bytes))
            }
            None => None,
        };

        Event::publish(
            &self.event_publisher,
            Event::CaptureCompleted(CaptureCompletedEvent {
                timestamp: SystemTime::now(),
                captured,
            }),
        );

        match tree_bytes {
            Some(bytes) => {
                let byte_len = bytes.len();
                self.persister.save(StateField::TreeState, &bytes);
                Event::publish(
                    &self.event_publisher,
                    Event::StateSaved(StateSavedEvent {
                        timestamp: SystemTime::now(),
                        byte_len,
                    }),
                );
            }
            // An empty save clears any previously persisted blob.
            None => self.persister.save(StateField::TreeState, &[]),
        }
        if let Some(bytes) = validation_bytes {
            self.persister.save(StateField::EventValidation, &bytes);
        }
        Ok(())
    }

    /* ↓↓↓ Integrity guard ↓↓↓ */

    /// Open the guard's Accepting window. Call when rendering begins.
    pub fn begin_render(&mut self) {
        self.validator.begin_render();
    }

    /// Close the Accepting window. Call when rendering concludes.
    pub fn end_render(&mut self) {
        self.validator.end_render();
    }

    /// Offer an event on `node` (with an optional argument) to the client.
    pub fn register_event(
        &mut self,
        tree: &mut ControlTree,
        node: NodeId,
        argument: Option<&str>,
    ) -> Result<(), StateError> {
        let unique_id = match tree.unique_id(node) {
            Some(unique_id) => unique_id,
            None => return Ok(()),
        };
        self.register_event_for(&unique_id, argument)
    }

    /// Offer an event on an already-resolved identifier.
    pub fn register_event_for(
        &mut self,
        unique_id: &str,
        argument: Option<&str>,
    ) -> Result<(), StateError> {
        let registered = self.validator.register(unique_id, argument);
        if let Ok(Some(token)) = &registered {
            Event::publish(
                &self.event_publisher,
                Event::TokenRegistered(TokenRegisteredEvent {
                    timestamp: SystemTime::now(),
                    token: *token,
                }),
            );
        }
        self.drain();
        registered.map(|_| ()).map_err(StateError::from)
    }

    /// Check an incoming postback or callback event against the set offered on the previous
    /// request. Failure is a tamper or staleness signal and must abort event dispatch.
    pub fn validate_event(
        &mut self,
        unique_id: &str,
        argument: Option<&str>,
    ) -> Result<(), StateError> {
        let validated = self.validator.validate(unique_id, argument);
        if let Ok(Some(token)) = &validated {
            Event::publish(
                &self.event_publisher,
                Event::TokenValidated(TokenValidatedEvent {
                    timestamp: SystemTime::now(),
                    token: *token,
                }),
            );
        }
        self.drain();
        validated.map(|_| ()).map_err(StateError::from)
    }

    /* ↓↓↓ Internals ↓↓↓ */

    fn protect(&self, bytes: Vec<u8>) -> Vec<u8> {
        match &self.protector {
            Some(protector) => protector.protect(bytes),
            None => bytes,
        }
    }

    fn unprotect(&self, bytes: Vec<u8>) -> Result<Vec<u8>, StateError> {
        match &self.protector {
            Some(protector) => protector.unprotect(bytes).map_err(StateError::from),
            None => Ok(bytes),
        }
    }

    fn drain(&self) {
        if let Some(subscriber) = &self.event_subscriber {
            drain_events(&self.event_handlers, subscriber);
        }
    }
}

/// Any fatal failure surfaced at the request boundary. Locally recoverable conditions (drift,
/// dedup-cache exhaustion) never appear here.
#[derive(Debug)]
pub enum StateError {
    Codec(CodecError),
    Tree(TreeError),
    Validation(ValidationError),
    Persist(PersistError),
    Protection(ProtectionError),
}

impl Display for StateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StateError::Codec(error) => write!(f, "{}", error),
            StateError::Tree(error) => write!(f, "{}", error),
            StateError::Validation(error) => write!(f, "{}", error),
            StateError::Persist(error) => write!(f, "{}", error),
            StateError::Protection(error) => write!(f, "{}", error),
        }
    }
}

impl From<CodecError> for StateError {
    fn from(error: CodecError) -> StateError {
        StateError::Codec(error)
    }
}

impl From<TreeError> for StateError {
    fn from(error: TreeError) -> StateError {
        StateError::Tree(error)
    }
}

impl From<ValidationError> for StateError {
    fn from(error: ValidationError) -> StateError {
        StateError::Validation(error)
    }
}

impl From<PersistError> for StateError {
    fn from(error: PersistError) -> StateError {
        StateError::Persist(error)
    }
}

impl From<ProtectionError> for StateError {
    fn from(error: ProtectionError) -> StateError {
        StateError::Protection(error)
    }
}
