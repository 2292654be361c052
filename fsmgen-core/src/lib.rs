//! # fsmgen-core
//!
//! State machine model, loader and validator for fsmgen.
//!
//! This crate provides:
//! - The immutable state machine model (timers, events, states, edges)
//! - A strict loader from a located token tree, failing on the first
//!   structural error
//! - Path exploration over timer/event configurations, plus the unused-timer
//!   and callback-naming passes, reporting every violation found

pub mod callback;
pub mod error;
pub mod loader;
mod mask;
pub mod model;
mod schema;
pub mod validator;

pub use callback::{CallbackName, CallbackShape};
pub use error::{
    CoreError, ParseError, ParseErrorKind, Pass, ValidationError, Violation, ViolationKind,
};
pub use loader::parse;
pub use model::{
    Edge, EdgeTarget, EdgeTargets, Event, EventArg, InvokerKind, NextState, OnEnter, State,
    StateKind, StateMachine, SubTarget, Timer, TimerModify, TimerStart,
};
pub use validator::{validate, ExplorationStats, PathReport, Validator};
