//! State machine model types.
//!
//! The model is built once by the loader and never mutated afterwards.
//! Validators and exporters receive it by reference.
//!
//! A state is exactly one of:
//! - branching: reacts to events and timers (`on_event` / `on_timer`)
//! - pass-through: moves on immediately (`next_state`, or an on-enter
//!   decision choosing among several successors)
//! - terminal (`final`)

use crate::callback::CallbackShape;
use serde::Serialize;
use std::fmt;

/// A named timer with its default delay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Timer {
    pub name: String,
    pub interval_seconds: f64,
}

/// A typed event argument. The type is an opaque token for code generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventArg {
    pub name: String,
    #[serde(rename = "type")]
    pub ty: String,
}

/// A named event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub name: String,
    pub args: Vec<EventArg>,
    /// States that arm the event. `None` means armed from the start.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_states: Option<Vec<String>>,
    pub only_once: bool,
}

impl Event {
    /// Returns true if the event is armed before any state is entered.
    pub fn is_initially_armed(&self) -> bool {
        self.after_states.is_none()
    }

    /// Returns true if entering `state` arms the event.
    pub fn is_armed_by(&self, state: &str) -> bool {
        self.after_states
            .as_ref()
            .is_some_and(|states| states.iter().any(|s| s == state))
    }
}

/// Where an edge leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTarget {
    /// Transition to a declared state.
    State(String),
    /// Legal, but the machine stays where it is.
    NoChange,
    /// Forbidden in this state.
    Failure,
}

impl EdgeTarget {
    /// Returns the target state name, if the edge transitions.
    pub fn state(&self) -> Option<&str> {
        match self {
            EdgeTarget::State(name) => Some(name),
            EdgeTarget::NoChange | EdgeTarget::Failure => None,
        }
    }
}

impl fmt::Display for EdgeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeTarget::State(name) => write!(f, "{}", name),
            EdgeTarget::NoChange => write!(f, "[no change]"),
            EdgeTarget::Failure => write!(f, "[failure]"),
        }
    }
}

/// One named outcome of a decision function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTarget {
    pub name: String,
    pub target: EdgeTarget,
}

fn fmt_sub_targets(f: &mut fmt::Formatter<'_>, targets: &[SubTarget]) -> fmt::Result {
    write!(f, "decision(")?;
    for (i, sub) in targets.iter().enumerate() {
        if i != 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}: {}", sub.name, sub.target)?;
    }
    write!(f, ")")
}

/// Targets of an edge: a single target or a runtime decision among several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeTargets {
    Single(EdgeTarget),
    /// Only legal for event edges. Never empty.
    Decision(Vec<SubTarget>),
}

impl EdgeTargets {
    pub fn is_decision(&self) -> bool {
        matches!(self, EdgeTargets::Decision(_))
    }

    /// Returns the target of a single-target edge.
    pub fn single(&self) -> Option<&EdgeTarget> {
        match self {
            EdgeTargets::Single(target) => Some(target),
            EdgeTargets::Decision(_) => None,
        }
    }

    /// Iterates over every possible target.
    pub fn iter(&self) -> impl Iterator<Item = &EdgeTarget> {
        let (single, decision): (Option<&EdgeTarget>, &[SubTarget]) = match self {
            EdgeTargets::Single(target) => (Some(target), &[]),
            EdgeTargets::Decision(targets) => (None, targets),
        };
        single
            .into_iter()
            .chain(decision.iter().map(|sub| &sub.target))
    }
}

impl fmt::Display for EdgeTargets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeTargets::Single(target) => write!(f, "{}", target),
            EdgeTargets::Decision(targets) => fmt_sub_targets(f, targets),
        }
    }
}

/// What fires an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvokerKind {
    Event,
    Timer,
}

impl fmt::Display for InvokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokerKind::Event => write!(f, "event"),
            InvokerKind::Timer => write!(f, "timer"),
        }
    }
}

/// A handler declared in a state for one event or timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    /// Name of the event or timer that fires the edge.
    pub invoker: String,
    pub invoker_kind: InvokerKind,
    pub targets: EdgeTargets,
    /// Requested traversal callbacks, in declaration order, without duplicates.
    pub callbacks: Vec<CallbackShape>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Edge {
    pub fn is_timer(&self) -> bool {
        self.invoker_kind == InvokerKind::Timer
    }

    pub fn is_decision(&self) -> bool {
        self.targets.is_decision()
    }
}

/// Adjustment of a timer's running delay, applied each time a state starts it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TimerModify {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiplier: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub increment: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl TimerModify {
    /// Applies the rule to the current delay: set, multiplier, increment,
    /// then the min and max clamps.
    pub fn apply(&self, delay: f64) -> f64 {
        let mut delay = self.set.unwrap_or(delay);
        if let Some(multiplier) = self.multiplier {
            delay *= multiplier;
        }
        if let Some(increment) = self.increment {
            delay += increment;
        }
        if let Some(min) = self.min {
            if delay < min {
                delay = min;
            }
        }
        if let Some(max) = self.max {
            if delay > max {
                delay = max;
            }
        }
        delay
    }
}

/// A timer started on entering a state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimerStart {
    pub timer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify: Option<TimerModify>,
}

/// On-enter notification requested by a state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OnEnter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Successor of a pass-through state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextState {
    State(String),
    /// On-enter decision function choosing among several successors.
    Decision(Vec<SubTarget>),
}

impl fmt::Display for NextState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NextState::State(name) => write!(f, "{}", name),
            NextState::Decision(targets) => fmt_sub_targets(f, targets),
        }
    }
}

/// Shape of a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Branching {
        event_edges: Vec<Edge>,
        timer_edges: Vec<Edge>,
    },
    PassThrough(NextState),
    Final,
}

/// A declared state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct State {
    pub name: String,
    pub start_timers: Vec<TimerStart>,
    pub stop_timers: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_enter: Option<OnEnter>,
    pub kind: StateKind,
}

impl State {
    pub fn starts_timer(&self, timer: &str) -> bool {
        self.start_timers.iter().any(|t| t.timer == timer)
    }

    pub fn stops_timer(&self, timer: &str) -> bool {
        self.stop_timers.iter().any(|t| t == timer)
    }

    pub fn needs_on_enter_notification(&self) -> bool {
        self.on_enter.is_some()
    }

    pub fn is_final(&self) -> bool {
        matches!(self.kind, StateKind::Final)
    }

    pub fn next_state(&self) -> Option<&NextState> {
        match &self.kind {
            StateKind::PassThrough(next) => Some(next),
            _ => None,
        }
    }

    /// Event edges in declaration order. Empty unless the state is branching.
    pub fn event_edges(&self) -> &[Edge] {
        match &self.kind {
            StateKind::Branching { event_edges, .. } => event_edges,
            _ => &[],
        }
    }

    /// Timer edges in declaration order. Empty unless the state is branching.
    pub fn timer_edges(&self) -> &[Edge] {
        match &self.kind {
            StateKind::Branching { timer_edges, .. } => timer_edges,
            _ => &[],
        }
    }

    pub fn event_edge(&self, event: &str) -> Option<&Edge> {
        self.event_edges().iter().find(|e| e.invoker == event)
    }

    pub fn timer_edge(&self, timer: &str) -> Option<&Edge> {
        self.timer_edges().iter().find(|e| e.invoker == timer)
    }

    /// All edges: events first, then timers.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.event_edges().iter().chain(self.timer_edges())
    }
}

/// A complete, loaded state machine.
///
/// Namespaces keep declaration order, which fixes the bit order used by the
/// validator and the output order of exporters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateMachine {
    timers: Vec<Timer>,
    events: Vec<Event>,
    states: Vec<State>,
    start_state: String,
}

impl StateMachine {
    pub(crate) fn new(
        timers: Vec<Timer>,
        events: Vec<Event>,
        states: Vec<State>,
        start_state: String,
    ) -> Self {
        Self {
            timers,
            events,
            states,
            start_state,
        }
    }

    pub fn timers(&self) -> &[Timer] {
        &self.timers
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn states(&self) -> &[State] {
        &self.states
    }

    pub fn start_state(&self) -> &str {
        &self.start_state
    }

    pub fn timer(&self, name: &str) -> Option<&Timer> {
        self.timers.iter().find(|t| t.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.name == name)
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    /// Fingerprint of the model: crc32c of its JSON serialization.
    pub fn checksum(&self) -> Result<String, serde_json::Error> {
        let json_bytes = serde_json::to_vec(self)?;
        Ok(format!("{:08x}", crc32c::crc32c(&json_bytes)))
    }
}
