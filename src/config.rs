/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! User-defined parameters of the state engine.

use typed_builder::TypedBuilder;

use crate::identity::RenderIdMode;

/// Stores the user-defined parameters required to run the engine, that is:
/// 1. The process-wide default [render identifier strategy](RenderIdMode), used by nodes whose
///    mode chain resolves to `Inherit` all the way up.
/// 2. The "Enable Event Validation" flag; when unset, the integrity guard neither accumulates
///    nor checks event tokens.
/// 3. The "Log Events" flag; if set to `true` then logs should be printed.
///
/// ## Log Events
///
/// The engine logs using the [log](https://docs.rs/log/latest/log/) crate. To get these
/// messages printed onto a terminal or to a file, set up a [logging
/// implementation](https://docs.rs/log/latest/log/#available-logging-implementations).
#[derive(Clone, TypedBuilder)]
#[builder(builder_method(doc = "
    Create a builder for building a [Configuration]. On the builder call the following methods to construct a valid [Configuration].

    Required:
    - `.default_render_id_mode(...)`
    - `.enable_event_validation(...)`
    - `.log_events(...)`
"))]
pub struct Configuration {
    #[builder(setter(doc = "Set the default render identifier strategy. Required."))]
    pub default_render_id_mode: RenderIdMode,
    #[builder(setter(doc = "Enable the event-integrity guard? Required."))]
    pub enable_event_validation: bool,
    #[builder(setter(doc = "Enable logging? Required."))]
    pub log_events: bool,
}
