//! Logic validation of a loaded state machine.
//!
//! Path exploration walks the configuration space depth-first. A
//! configuration is the current state plus three bit sets over the declared
//! timers and events:
//!
//! - running timers: set by `start_timers`, cleared by `stop_timers`
//! - armed events: set on entering one of the event's `after_states`, never
//!   cleared along a path
//! - fired-once events: set after an `only_once` event leads to a new state
//!
//! A configuration already on the DFS stack closes a cycle. A configuration
//! whose expansion already finished is not expanded again; everything it can
//! reach has already been visited or is still on the stack.
//!
//! The unused-timer and callback-naming checks do not depend on exploration
//! and run as separate passes.

use crate::callback;
use crate::error::{ValidationError, Violation, ViolationKind};
use crate::mask::Mask;
use crate::model::{Edge, EdgeTargets, NextState, State, StateKind, StateMachine};
use std::collections::{HashMap, HashSet};

/// Runs every validation pass and returns the union of their violations.
pub fn validate(model: &StateMachine) -> Result<(), ValidationError> {
    Validator::new(model).validate()
}

/// Size of the explored configuration space.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExplorationStats {
    /// Distinct configurations expanded.
    pub configurations: usize,
    /// Deepest DFS stack seen.
    pub max_depth: usize,
}

/// Outcome of path exploration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathReport {
    pub stats: ExplorationStats,
    pub violations: Vec<Violation>,
}

/// Per-state lookup tables, indexed by timer and event position.
struct StateRow {
    starts: Mask,
    stops: Mask,
    arms: Mask,
    event_edges: Vec<Option<usize>>,
    timer_edges: Vec<Option<usize>>,
}

/// Validator over one model. Index tables are built once in [`Validator::new`].
pub struct Validator<'a> {
    model: &'a StateMachine,
    state_index: HashMap<&'a str, usize>,
    rows: Vec<StateRow>,
    initially_armed: Mask,
    only_once: Mask,
}

impl<'a> Validator<'a> {
    pub fn new(model: &'a StateMachine) -> Self {
        let timer_index: HashMap<&str, usize> = model
            .timers()
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.as_str(), i))
            .collect();
        let event_index: HashMap<&str, usize> = model
            .events()
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.as_str(), i))
            .collect();
        let state_index: HashMap<&str, usize> = model
            .states()
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let timer_count = model.timers().len();
        let event_count = model.events().len();

        let mut initially_armed = Mask::with_len(event_count);
        let mut only_once = Mask::with_len(event_count);
        for (i, event) in model.events().iter().enumerate() {
            if event.is_initially_armed() {
                initially_armed.insert(i);
            }
            if event.only_once {
                only_once.insert(i);
            }
        }

        let rows = model
            .states()
            .iter()
            .map(|state| {
                let mut starts = Mask::with_len(timer_count);
                for start in &state.start_timers {
                    if let Some(&i) = timer_index.get(start.timer.as_str()) {
                        starts.insert(i);
                    }
                }
                let mut stops = Mask::with_len(timer_count);
                for timer in &state.stop_timers {
                    if let Some(&i) = timer_index.get(timer.as_str()) {
                        stops.insert(i);
                    }
                }
                let mut arms = Mask::with_len(event_count);
                for (i, event) in model.events().iter().enumerate() {
                    if event.is_armed_by(&state.name) {
                        arms.insert(i);
                    }
                }
                StateRow {
                    starts,
                    stops,
                    arms,
                    event_edges: edge_table(state.event_edges(), &event_index, event_count),
                    timer_edges: edge_table(state.timer_edges(), &timer_index, timer_count),
                }
            })
            .collect();

        Self {
            model,
            state_index,
            rows,
            initially_armed,
            only_once,
        }
    }

    /// Explores every reachable configuration and runs the closing checks.
    pub fn explore(&self) -> PathReport {
        let mut exploration = Exploration::new(self);
        exploration.run();
        let report = exploration.finish();
        tracing::debug!(
            "Explored {} configurations, max depth {}, {} path violations",
            report.stats.configurations,
            report.stats.max_depth,
            report.violations.len()
        );
        report
    }

    /// Totality and reachability over all reachable configurations.
    pub fn validate_paths(&self) -> Result<(), ValidationError> {
        ValidationError::check(self.explore().violations)
    }

    /// Every declared timer must be started by at least one state.
    pub fn check_unused_timers(&self) -> Result<(), ValidationError> {
        ValidationError::check(self.unused_timers())
    }

    /// Derived callback names must not be shared by incompatible edges.
    pub fn check_callback_names(&self) -> Result<(), ValidationError> {
        ValidationError::check(callback::naming_violations(self.model))
    }

    /// Runs all three passes and returns the union of their violations.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let mut violations = self.explore().violations;
        violations.extend(self.unused_timers());
        violations.extend(callback::naming_violations(self.model));
        ValidationError::check(violations)
    }

    fn unused_timers(&self) -> Vec<Violation> {
        let states = self.model.states();
        let violations: Vec<Violation> = self
            .model
            .timers()
            .iter()
            .filter(|timer| !states.iter().any(|s| s.starts_timer(&timer.name)))
            .map(|timer| Violation::UnusedTimer {
                timer: timer.name.clone(),
            })
            .collect();
        tracing::debug!("Unused timer check: {} violations", violations.len());
        violations
    }

    fn state(&self, index: usize) -> &'a State {
        &self.model.states()[index]
    }

    fn resolve(&self, name: &str) -> Option<usize> {
        self.state_index.get(name).copied()
    }
}

/// Position of each invoker's edge in `edges`, indexed by invoker.
fn edge_table(edges: &[Edge], index: &HashMap<&str, usize>, len: usize) -> Vec<Option<usize>> {
    let mut table = vec![None; len];
    for (pos, edge) in edges.iter().enumerate() {
        if let Some(&i) = index.get(edge.invoker.as_str()) {
            table[i] = Some(pos);
        }
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Configuration {
    state: usize,
    timers: Mask,
    armed: Mask,
    fired: Mask,
}

/// An outgoing transition of an expanded configuration.
#[derive(Debug, Clone)]
struct Move {
    target: usize,
    label: String,
    entry_event: Option<usize>,
}

struct Frame {
    config: Configuration,
    moves: Vec<Move>,
    next: usize,
}

/// Mutable state of one exploration run.
struct Exploration<'v, 'a> {
    validator: &'v Validator<'a>,
    stack: Vec<Frame>,
    on_stack: HashSet<Configuration>,
    settled: HashSet<Configuration>,
    visited: Vec<bool>,
    traversed_events: Vec<Vec<bool>>,
    traversed_timers: Vec<Vec<bool>>,
    reported: HashSet<(ViolationKind, usize, Option<usize>)>,
    violations: Vec<Violation>,
    max_depth: usize,
}

impl<'v, 'a> Exploration<'v, 'a> {
    fn new(validator: &'v Validator<'a>) -> Self {
        let states = validator.model.states();
        Self {
            validator,
            stack: Vec::new(),
            on_stack: HashSet::new(),
            settled: HashSet::new(),
            visited: vec![false; states.len()],
            traversed_events: states
                .iter()
                .map(|s| vec![false; s.event_edges().len()])
                .collect(),
            traversed_timers: states
                .iter()
                .map(|s| vec![false; s.timer_edges().len()])
                .collect(),
            reported: HashSet::new(),
            violations: Vec::new(),
            max_depth: 0,
        }
    }

    fn run(&mut self) {
        let validator = self.validator;
        let Some(start) = validator.resolve(validator.model.start_state()) else {
            return;
        };

        // Before the start state: no timer running, ungated events armed.
        let before_start = Configuration {
            state: start,
            timers: Mask::with_len(validator.model.timers().len()),
            armed: validator.initially_armed.clone(),
            fired: Mask::with_len(validator.model.events().len()),
        };
        self.enter(&before_start, start, None);

        while let Some(frame) = self.stack.last_mut() {
            match frame.moves.get(frame.next).cloned() {
                Some(step) => {
                    frame.next += 1;
                    let parent = frame.config.clone();
                    self.enter(&parent, step.target, step.entry_event);
                }
                None => {
                    if let Some(frame) = self.stack.pop() {
                        self.on_stack.remove(&frame.config);
                        self.settled.insert(frame.config);
                    }
                }
            }
        }
    }

    /// Enters `state` from `prev`, pushing a frame unless the branch ends here.
    fn enter(&mut self, prev: &Configuration, state: usize, entry_event: Option<usize>) {
        let validator = self.validator;
        self.visited[state] = true;
        if validator.state(state).is_final() {
            return;
        }

        let row = &validator.rows[state];
        let mut timers = prev.timers.clone();
        timers.subtract(&row.stops);
        timers.union_with(&row.starts);
        let mut armed = prev.armed.clone();
        armed.union_with(&row.arms);
        let mut fired = prev.fired.clone();
        if let Some(event) = entry_event {
            if validator.only_once.contains(event) {
                fired.insert(event);
            }
        }

        let config = Configuration {
            state,
            timers,
            armed,
            fired,
        };
        if self.on_stack.contains(&config) || self.settled.contains(&config) {
            return;
        }

        let moves = self.expand(&config);
        self.on_stack.insert(config.clone());
        self.stack.push(Frame {
            config,
            moves,
            next: 0,
        });
        self.max_depth = self.max_depth.max(self.stack.len());
    }

    /// Checks a configuration and lists the transitions leaving it.
    fn expand(&mut self, config: &Configuration) -> Vec<Move> {
        let validator = self.validator;
        let index = config.state;
        let state = validator.state(index);
        let mut moves = Vec::new();

        match &state.kind {
            StateKind::Final => return moves,
            StateKind::PassThrough(NextState::State(next)) => {
                if let Some(target) = validator.resolve(next) {
                    moves.push(Move {
                        target,
                        label: "[next_state]".to_string(),
                        entry_event: None,
                    });
                }
            }
            StateKind::PassThrough(NextState::Decision(targets)) => {
                for sub in targets {
                    if let Some(target) = sub.target.state().and_then(|n| validator.resolve(n)) {
                        moves.push(Move {
                            target,
                            label: format!("[on_enter: {}]", sub.name),
                            entry_event: None,
                        });
                    }
                }
            }
            StateKind::Branching {
                event_edges,
                timer_edges,
            } => {
                self.event_moves(config, event_edges, &mut moves);
                self.timer_moves(config, timer_edges, &mut moves);
            }
        }

        if moves.is_empty() {
            self.report(ViolationKind::Stall, index, None, |path| Violation::Stall {
                state: state.name.clone(),
                path,
            });
        }
        moves
    }

    /// Follows armed event edges and reports armed events with no edge.
    fn event_moves(&mut self, config: &Configuration, edges: &[Edge], moves: &mut Vec<Move>) {
        let validator = self.validator;
        let index = config.state;
        let state = validator.state(index);
        for (event, slot) in validator.rows[index].event_edges.iter().enumerate() {
            if !config.armed.contains(event)
                || (validator.only_once.contains(event) && config.fired.contains(event))
            {
                continue;
            }
            match slot {
                Some(pos) => {
                    self.traversed_events[index][*pos] = true;
                    self.edge_moves(&edges[*pos], Some(event), moves);
                }
                None => {
                    let name = &validator.model.events()[event].name;
                    self.report(ViolationKind::UnhandledEvent, index, Some(event), |path| {
                        Violation::UnhandledEvent {
                            state: state.name.clone(),
                            event: name.clone(),
                            path,
                        }
                    });
                }
            }
        }
    }

    /// Follows edges of running timers and reports missing and ghost timer edges.
    fn timer_moves(&mut self, config: &Configuration, edges: &[Edge], moves: &mut Vec<Move>) {
        let validator = self.validator;
        let index = config.state;
        let state = validator.state(index);
        for (timer, slot) in validator.rows[index].timer_edges.iter().enumerate() {
            let name = &validator.model.timers()[timer].name;
            match (config.timers.contains(timer), slot) {
                (true, Some(pos)) => {
                    self.traversed_timers[index][*pos] = true;
                    self.edge_moves(&edges[*pos], None, moves);
                }
                (true, None) => {
                    self.report(ViolationKind::MissingTimerEdge, index, Some(timer), |path| {
                        Violation::MissingTimerEdge {
                            state: state.name.clone(),
                            timer: name.clone(),
                            path,
                        }
                    });
                }
                (false, Some(_)) => {
                    self.report(ViolationKind::GhostTimerEdge, index, Some(timer), |path| {
                        Violation::GhostTimerEdge {
                            state: state.name.clone(),
                            timer: name.clone(),
                            path,
                        }
                    });
                }
                (false, None) => {}
            }
        }
    }

    fn edge_moves(&self, edge: &Edge, entry_event: Option<usize>, moves: &mut Vec<Move>) {
        let validator = self.validator;
        let invoker = format!("{}: {}", edge.invoker_kind, edge.invoker);
        match &edge.targets {
            EdgeTargets::Single(target) => {
                if let Some(target) = target.state().and_then(|n| validator.resolve(n)) {
                    moves.push(Move {
                        target,
                        label: format!("[{}]", invoker),
                        entry_event,
                    });
                }
            }
            EdgeTargets::Decision(targets) => {
                for sub in targets {
                    if let Some(target) = sub.target.state().and_then(|n| validator.resolve(n)) {
                        moves.push(Move {
                            target,
                            label: format!("[{} ({})]", invoker, sub.name),
                            entry_event,
                        });
                    }
                }
            }
        }
    }

    /// Records a path violation unless the same one was already found.
    fn report(
        &mut self,
        kind: ViolationKind,
        state: usize,
        invoker: Option<usize>,
        build: impl FnOnce(String) -> Violation,
    ) {
        if self.reported.insert((kind, state, invoker)) {
            let path = self.path_to(state);
            self.violations.push(build(path));
        }
    }

    /// Renders the current DFS path ending in `state`.
    fn path_to(&self, state: usize) -> String {
        let validator = self.validator;
        let mut parts: Vec<String> = self
            .stack
            .iter()
            .map(|frame| {
                let name = &validator.state(frame.config.state).name;
                match frame.next.checked_sub(1).and_then(|i| frame.moves.get(i)) {
                    Some(step) => format!("{} {}", name, step.label),
                    None => name.clone(),
                }
            })
            .collect();
        parts.push(validator.state(state).name.clone());
        parts.join(" -> ")
    }

    /// Reachability checks over the finished exploration.
    fn finish(mut self) -> PathReport {
        let validator = self.validator;
        for (index, state) in validator.model.states().iter().enumerate() {
            if !self.visited[index] {
                self.violations.push(Violation::UnreachableState {
                    state: state.name.clone(),
                });
            }
            let events = &self.traversed_events[index];
            let timers = &self.traversed_timers[index];
            let edges = state
                .event_edges()
                .iter()
                .zip(events)
                .chain(state.timer_edges().iter().zip(timers));
            for (edge, traversed) in edges {
                if !traversed {
                    self.violations.push(unusable(state, edge));
                }
            }
        }

        PathReport {
            stats: ExplorationStats {
                configurations: self.settled.len(),
                max_depth: self.max_depth,
            },
            violations: self.violations,
        }
    }
}

fn unusable(state: &State, edge: &Edge) -> Violation {
    Violation::UnusableEdge {
        state: state.name.clone(),
        kind: edge.invoker_kind,
        invoker: edge.invoker.clone(),
        target: edge.targets.to_string(),
    }
}
