//! # streamgate-router
//!
//! Per-record routing of changed models.
//!
//! [`plan`] is a pure decision tree: it classifies one [`ChangeRecord`] by
//! medium, source and event type and returns the ordered stage decisions.
//! [`Router`] executes those decisions against the [`Dispatcher`] and
//! [`IdentityLookup`] seams with bounded concurrency across a batch.
//!
//! [`ChangeRecord`]: streamgate_core::ChangeRecord

pub mod decision;
pub mod error;
pub mod executor;
pub mod keys;
pub mod memory;
pub mod plan;

pub use decision::{Action, DispatchRequest, LookupResponse, RoutePlan, RoutingDecision, Stage};
pub use error::{DispatchError, LookupError, RouterError};
pub use executor::{
    BatchReport, Dispatcher, IdentityLookup, LookupOutcome, RecordOutcome, RecordReport, Router,
};
pub use memory::{RecordingDispatcher, StaticLookup};
pub use plan::{plan, should_route, RouterContext};
