/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! State capture and distribution over the control tree.

pub mod bag;
pub mod capture;
pub mod distribute;
pub mod envelope;

pub use bag::{StateAdapter, StateBag, StateContainer};
pub use capture::capture_root;
pub use distribute::{distribute_root, DistributeOutcome};
pub use envelope::{ChildLocator, StateEnvelope};
