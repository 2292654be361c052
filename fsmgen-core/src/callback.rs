//! Edge traversal callback names.
//!
//! An edge may request one or more traversal callbacks. Each callback
//! shape picks which of source state, invoker and target state make up the
//! external name:
//!
//! | shape               | name                                      |
//! |---------------------|-------------------------------------------|
//! | `full`              | `OnEventTraverse__S0__E__S1`              |
//! | `event_only`        | `OnEventTraverse__E`                      |
//! | `event_and_target`  | `OnEventTraverse__E__S1`                  |
//! | `source_and_event`  | `OnEventTraverse__S0__E`                  |
//! | `source_and_target` | `OnEventTraverse__S0__S1`                 |
//! | `source_only`       | `OnEventTraverse__S0`                     |
//! | `target_only`       | `OnEventTraverse__S1`                     |
//!
//! Timer edges use the `OnTimerTraverse__` prefix. A no-change target
//! contributes the source state's name. On a decision-function edge the
//! callback is the decision function itself and returns the chosen
//! sub-target, so a name must never be shared between a plain notification
//! and a decision function.

use crate::error::Violation;
use crate::model::{Edge, EdgeTarget, EdgeTargets, State, StateMachine};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Which parts of an edge make up a callback name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackShape {
    Full,
    EventOnly,
    EventAndTarget,
    SourceAndEvent,
    SourceAndTarget,
    SourceOnly,
    TargetOnly,
}

impl CallbackShape {
    pub const ALL: [CallbackShape; 7] = [
        CallbackShape::Full,
        CallbackShape::EventOnly,
        CallbackShape::EventAndTarget,
        CallbackShape::SourceAndEvent,
        CallbackShape::SourceAndTarget,
        CallbackShape::SourceOnly,
        CallbackShape::TargetOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CallbackShape::Full => "full",
            CallbackShape::EventOnly => "event_only",
            CallbackShape::EventAndTarget => "event_and_target",
            CallbackShape::SourceAndEvent => "source_and_event",
            CallbackShape::SourceAndTarget => "source_and_target",
            CallbackShape::SourceOnly => "source_only",
            CallbackShape::TargetOnly => "target_only",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|shape| shape.as_str() == name)
    }

    /// Shapes that embed the target state need a single resolvable target.
    pub fn needs_target(&self) -> bool {
        matches!(
            self,
            CallbackShape::Full
                | CallbackShape::EventAndTarget
                | CallbackShape::SourceAndTarget
                | CallbackShape::TargetOnly
        )
    }

    /// Shapes that name the invoker pass its arguments along.
    pub fn names_invoker(&self) -> bool {
        matches!(
            self,
            CallbackShape::Full
                | CallbackShape::EventOnly
                | CallbackShape::EventAndTarget
                | CallbackShape::SourceAndEvent
        )
    }

    /// Derives the callback name of `edge` declared in `source`.
    ///
    /// Returns `None` when the shape needs a target the edge does not have
    /// (decision-function edges and failure edges).
    pub fn compose(&self, source: &State, edge: &Edge) -> Option<CallbackName> {
        let target = match &edge.targets {
            EdgeTargets::Single(EdgeTarget::State(name)) => Some(name.as_str()),
            EdgeTargets::Single(EdgeTarget::NoChange) => Some(source.name.as_str()),
            EdgeTargets::Single(EdgeTarget::Failure) | EdgeTargets::Decision(_) => None,
        };

        let source = source.name.as_str();
        let invoker = edge.invoker.as_str();
        let parts: Vec<&str> = match self {
            CallbackShape::Full => vec![source, invoker, target?],
            CallbackShape::EventOnly => vec![invoker],
            CallbackShape::EventAndTarget => vec![invoker, target?],
            CallbackShape::SourceAndEvent => vec![source, invoker],
            CallbackShape::SourceAndTarget => vec![source, target?],
            CallbackShape::SourceOnly => vec![source],
            CallbackShape::TargetOnly => vec![target?],
        };

        let prefix = if edge.is_timer() {
            "OnTimerTraverse__"
        } else {
            "OnEventTraverse__"
        };

        Some(CallbackName {
            name: format!("{}{}", prefix, parts.join("__")),
            is_function: edge.is_decision(),
            has_args: !edge.is_timer() && self.names_invoker(),
        })
    }
}

impl fmt::Display for CallbackShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A derived callback name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallbackName {
    pub name: String,
    /// The callback is a decision function returning the chosen sub-target.
    pub is_function: bool,
    /// The callback receives the event's arguments.
    pub has_args: bool,
}

struct Usage {
    site: String,
    is_function: bool,
    choices: Vec<String>,
}

fn site(state: &State, edge: &Edge, shape: CallbackShape) -> String {
    let invoker = format!("{}: {}", edge.invoker_kind, edge.invoker);
    format!("{} [{}] ({})", state.name, invoker, shape)
}

fn choices(edge: &Edge) -> Vec<String> {
    let mut names: Vec<String> = match &edge.targets {
        EdgeTargets::Decision(targets) => targets.iter().map(|t| t.name.clone()).collect(),
        EdgeTargets::Single(_) => Vec::new(),
    };
    names.sort();
    names
}

/// Checks every requested callback of every edge for naming conflicts.
///
/// Each conflicting name is reported once, against the first edge that
/// claimed it.
pub fn naming_violations(model: &StateMachine) -> Vec<Violation> {
    let mut usages: HashMap<String, Usage> = HashMap::new();
    let mut reported: Vec<String> = Vec::new();
    let mut violations = Vec::new();

    for state in model.states() {
        for edge in state.edges() {
            for &shape in &edge.callbacks {
                let Some(callback) = shape.compose(state, edge) else {
                    continue;
                };
                let usage = Usage {
                    site: site(state, edge, shape),
                    is_function: callback.is_function,
                    choices: choices(edge),
                };

                let Some(first) = usages.get(&callback.name) else {
                    usages.insert(callback.name, usage);
                    continue;
                };
                if reported.contains(&callback.name) {
                    continue;
                }

                if first.is_function != usage.is_function {
                    let (notification, function) = if first.is_function {
                        (usage.site, first.site.clone())
                    } else {
                        (first.site.clone(), usage.site)
                    };
                    reported.push(callback.name.clone());
                    violations.push(Violation::AmbiguousCallback {
                        name: callback.name,
                        notification,
                        function,
                    });
                } else if first.is_function && first.choices != usage.choices {
                    reported.push(callback.name.clone());
                    violations.push(Violation::ConflictingDecisionTargets {
                        name: callback.name,
                        first: first.site.clone(),
                        second: usage.site,
                    });
                }
            }
        }
    }

    tracing::debug!("Callback naming check: {} violations", violations.len());
    violations
}
