//! Core error types.
//!
//! Two disjoint kinds:
//! - [`ParseError`]: structural problems. The loader stops at the first one.
//! - [`ValidationError`]: logic problems. Every violation a pass finds is
//!   collected and reported together.

use crate::callback::CallbackShape;
use crate::model::InvokerKind;
use fsmgen_token::{ReadError, Span, TokenType};
use std::fmt;
use thiserror::Error;

/// What went wrong while loading a token tree into a model.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseErrorKind {
    #[error("token '{name}' should be {expected}, but it is {actual}")]
    UnexpectedType {
        name: String,
        expected: String,
        actual: TokenType,
    },

    #[error("missing required token '{name}'")]
    MissingField { name: String },

    #[error("required token '{name}' is null")]
    NullField { name: String },

    #[error("unused token '{name}'")]
    UnusedField { name: String },

    #[error("duplicate {namespace} name '{name}'")]
    DuplicateName {
        namespace: &'static str,
        name: String,
    },

    #[error("unknown {namespace} name '{name}'")]
    UnknownName {
        namespace: &'static str,
        name: String,
    },

    #[error("token '{name}' {reason}, got {value}")]
    InvalidNumber {
        name: String,
        reason: &'static str,
        value: f64,
    },

    #[error("only false could be specified as a failure edge value")]
    FailureMustBeFalse,

    #[error(
        "failed to determine state type for state '{state}'. Either 'on_timer'/'on_event' \
         or 'next_state' or 'final' should be specified"
    )]
    MissingStateShape { state: String },

    #[error(
        "conflicting state type for state '{state}': {tokens} could not be specified together"
    )]
    ConflictingStateShape { state: String, tokens: String },

    #[error("timer '{timer}' is started and stopped by state '{state}'")]
    TimerStartedAndStopped { state: String, timer: String },

    #[error("timer modification for '{timer}' is empty")]
    EmptyTimerModify { timer: String },

    #[error(
        "timer modification for '{timer}' has min {min} greater than max {max}"
    )]
    InvalidTimerBounds { timer: String, min: f64, max: f64 },

    #[error(
        "decision-function edges are only allowed for events, but timer '{timer}' has one"
    )]
    DecisionOnTimer { timer: String },

    #[error("decision-function edge '{invoker}' has no targets")]
    EmptyDecision { invoker: String },

    #[error(
        "edge object for '{invoker}' should contain exactly one of 'state' or 'targets'"
    )]
    AmbiguousEdgeObject { invoker: String },

    #[error("unknown callback shape '{name}'")]
    UnknownCallbackShape { name: String },

    #[error("duplicate callback shape '{shape}'")]
    DuplicateCallbackShape { shape: CallbackShape },

    #[error(
        "callback shape '{shape}' requires a single target state, but edge '{invoker}' has none"
    )]
    CallbackShapeNeedsTarget {
        shape: CallbackShape,
        invoker: String,
    },
}

/// A structural error located at the offending token.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}, path: {}{}", display_path(.path), display_span(.span))]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub path: String,
    pub span: Option<Span>,
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "(root)"
    } else {
        path
    }
}

fn display_span(span: &Option<Span>) -> String {
    match span {
        Some(span) => format!("; {}", span),
        None => String::new(),
    }
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, path: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            kind,
            path: path.into(),
            span,
        }
    }
}

/// Which validation pass reports a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pass {
    Paths,
    UnusedTimers,
    CallbackNames,
}

/// Discriminant of a [`Violation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ViolationKind {
    UnhandledEvent,
    MissingTimerEdge,
    GhostTimerEdge,
    Stall,
    UnreachableState,
    UnusableEdge,
    UnusedTimer,
    AmbiguousCallback,
    ConflictingDecisionTargets,
}

impl ViolationKind {
    pub fn pass(&self) -> Pass {
        match self {
            ViolationKind::UnhandledEvent
            | ViolationKind::MissingTimerEdge
            | ViolationKind::GhostTimerEdge
            | ViolationKind::Stall
            | ViolationKind::UnreachableState
            | ViolationKind::UnusableEdge => Pass::Paths,
            ViolationKind::UnusedTimer => Pass::UnusedTimers,
            ViolationKind::AmbiguousCallback | ViolationKind::ConflictingDecisionTargets => {
                Pass::CallbackNames
            }
        }
    }
}

/// A single logic problem found by a validation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error(
        "enabled event unhandled in state '{state}': event '{event}' is armed but not \
         specified. Path: {path}"
    )]
    UnhandledEvent {
        state: String,
        event: String,
        path: String,
    },

    #[error(
        "timer expected but missing in state '{state}': timer '{timer}' is running but not \
         specified. Path: {path}"
    )]
    MissingTimerEdge {
        state: String,
        timer: String,
        path: String,
    },

    #[error(
        "ghost timer edge in state '{state}': timer '{timer}' is specified while it is not \
         running. Path: {path}"
    )]
    GhostTimerEdge {
        state: String,
        timer: String,
        path: String,
    },

    #[error("stall detected in state '{state}'. Path: {path}")]
    Stall { state: String, path: String },

    #[error("unreachable state: {state}")]
    UnreachableState { state: String },

    #[error("unusable edge: {state} [{kind}: {invoker}] -> {target}")]
    UnusableEdge {
        state: String,
        kind: InvokerKind,
        invoker: String,
        target: String,
    },

    #[error("unused timer: {timer} is never started")]
    UnusedTimer { timer: String },

    #[error(
        "ambiguous callback naming: '{name}' is a notification for {notification} and a \
         decision function for {function}"
    )]
    AmbiguousCallback {
        name: String,
        notification: String,
        function: String,
    },

    #[error(
        "conflicting decision function '{name}': {first} and {second} offer different choices"
    )]
    ConflictingDecisionTargets {
        name: String,
        first: String,
        second: String,
    },
}

impl Violation {
    pub fn kind(&self) -> ViolationKind {
        match self {
            Violation::UnhandledEvent { .. } => ViolationKind::UnhandledEvent,
            Violation::MissingTimerEdge { .. } => ViolationKind::MissingTimerEdge,
            Violation::GhostTimerEdge { .. } => ViolationKind::GhostTimerEdge,
            Violation::Stall { .. } => ViolationKind::Stall,
            Violation::UnreachableState { .. } => ViolationKind::UnreachableState,
            Violation::UnusableEdge { .. } => ViolationKind::UnusableEdge,
            Violation::UnusedTimer { .. } => ViolationKind::UnusedTimer,
            Violation::AmbiguousCallback { .. } => ViolationKind::AmbiguousCallback,
            Violation::ConflictingDecisionTargets { .. } => {
                ViolationKind::ConflictingDecisionTargets
            }
        }
    }

    pub fn pass(&self) -> Pass {
        self.kind().pass()
    }
}

/// Aggregate of every violation found by one or more passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    violations: Vec<Violation>,
}

impl ValidationError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    /// Returns `Ok(())` for an empty list, the aggregate error otherwise.
    pub fn check(violations: Vec<Violation>) -> Result<(), ValidationError> {
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Self::new(violations))
        }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }

    pub fn len(&self) -> usize {
        self.violations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Returns true if any violation has the given kind.
    pub fn has(&self, kind: ViolationKind) -> bool {
        self.violations.iter().any(|v| v.kind() == kind)
    }

    /// Returns the violations of the given kind.
    pub fn of_kind(&self, kind: ViolationKind) -> impl Iterator<Item = &Violation> {
        self.violations.iter().filter(move |v| v.kind() == kind)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let [single] = self.violations.as_slice() {
            return write!(f, "{}", single);
        }
        write!(f, "found {} violations:", self.violations.len())?;
        for violation in &self.violations {
            write!(f, "\n{}", violation)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

/// Any error produced between source text and a validated model.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("read error: {0}")]
    Read(#[from] ReadError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns a stable error code for reporting.
    pub fn error_code(&self) -> &'static str {
        match self {
            CoreError::Read(_) => "READ_ERROR",
            CoreError::Parse(_) => "PARSE_ERROR",
            CoreError::Validation(_) => "VALIDATION_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            ParseErrorKind::UnknownName {
                namespace: "target state",
                name: "S9".to_string(),
            },
            "states.S0.on_event.E",
            Some(Span::new(4, 12)),
        );
        assert_eq!(
            err.to_string(),
            "unknown target state name 'S9', path: states.S0.on_event.E; line: 4, pos: 12"
        );

        let err = ParseError::new(
            ParseErrorKind::MissingField {
                name: "start_state".to_string(),
            },
            "",
            None,
        );
        assert_eq!(
            err.to_string(),
            "missing required token 'start_state', path: (root)"
        );
    }

    #[test]
    fn test_validation_error_display() {
        let single = ValidationError::new(vec![Violation::UnreachableState {
            state: "S2".to_string(),
        }]);
        assert_eq!(single.to_string(), "unreachable state: S2");

        let many = ValidationError::new(vec![
            Violation::UnreachableState {
                state: "S2".to_string(),
            },
            Violation::UnusedTimer {
                timer: "T".to_string(),
            },
        ]);
        let text = many.to_string();
        assert!(text.starts_with("found 2 violations:"));
        assert!(text.contains("\nunreachable state: S2"));
        assert!(text.contains("\nunused timer: T"));
    }

    #[test]
    fn test_violation_kinds_and_passes() {
        let v = Violation::Stall {
            state: "S1".to_string(),
            path: "S0 [event: E] -> S1".to_string(),
        };
        assert_eq!(v.kind(), ViolationKind::Stall);
        assert_eq!(v.pass(), Pass::Paths);
        assert_eq!(ViolationKind::UnusedTimer.pass(), Pass::UnusedTimers);
        assert_eq!(ViolationKind::AmbiguousCallback.pass(), Pass::CallbackNames);
    }

    #[test]
    fn test_check_and_queries() {
        assert!(ValidationError::check(Vec::new()).is_ok());

        let err = ValidationError::check(vec![Violation::UnusedTimer {
            timer: "T".to_string(),
        }])
        .unwrap_err();
        assert!(err.has(ViolationKind::UnusedTimer));
        assert!(!err.has(ViolationKind::Stall));
        assert_eq!(err.of_kind(ViolationKind::UnusedTimer).count(), 1);
        assert_eq!(err.len(), 1);
    }

    #[test]
    fn test_error_codes() {
        let err: CoreError = ValidationError::new(Vec::new()).into();
        assert_eq!(err.error_code(), "VALIDATION_ERROR");

        let err: CoreError = ReadError::UnexpectedEof { line: 1, column: 1 }.into();
        assert_eq!(err.error_code(), "READ_ERROR");
        assert!(err.to_string().starts_with("read error:"));
    }
}
