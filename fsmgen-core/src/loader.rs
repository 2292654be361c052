//! Loader: token tree to [`StateMachine`].
//!
//! Specifications use a JSON DSL:
//!
//! ```json
//! {
//!   "timers": { "T": 5 },
//!   "events": {
//!     "E": { "args": { "code": "int" } },
//!     "Done": { "after_states": ["S1"], "only_once": true }
//!   },
//!   "states": {
//!     "S0": { "start_timers": ["T"], "on_event": { "E": "S1" }, "on_timer": { "T": null } },
//!     "S1": { "stop_timers": ["T"], "on_event": { "E": null, "Done": "S2" } },
//!     "S2": { "final": true }
//!   },
//!   "start_state": "S0"
//! }
//! ```
//!
//! Timer and state names are collected before any body is parsed, so states
//! may refer to states declared later. The loader stops at the first
//! structural problem.

use crate::callback::CallbackShape;
use crate::error::{ParseError, ParseErrorKind};
use crate::model::{
    Edge, EdgeTarget, EdgeTargets, Event, EventArg, InvokerKind, NextState, OnEnter, State,
    StateKind, StateMachine, SubTarget, Timer, TimerModify, TimerStart,
};
use crate::schema::{as_members, as_str, error_at, error_at_key, unexpected_type, ObjectReader};
use fsmgen_token::{Token, TokenValue};
use std::collections::HashSet;

/// Parses a token tree into a state machine model.
pub fn parse(token: &Token) -> Result<StateMachine, ParseError> {
    Loader::default().parse(token)
}

#[derive(Default)]
struct Loader<'a> {
    timer_names: HashSet<&'a str>,
    event_names: HashSet<&'a str>,
    state_names: HashSet<&'a str>,
}

fn register<'a>(
    names: &mut HashSet<&'a str>,
    namespace: &'static str,
    name: &'a str,
    token: &Token,
) -> Result<(), ParseError> {
    if !names.insert(name) {
        return Err(error_at(
            token,
            ParseErrorKind::DuplicateName {
                namespace,
                name: name.to_string(),
            },
        ));
    }
    Ok(())
}

fn positive(
    name: &str,
    value: f64,
    token: &Token,
    reason: &'static str,
) -> Result<f64, ParseError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(error_at(
            token,
            ParseErrorKind::InvalidNumber {
                name: name.to_string(),
                reason,
                value,
            },
        ));
    }
    Ok(value)
}

impl<'a> Loader<'a> {
    fn parse(mut self, token: &'a Token) -> Result<StateMachine, ParseError> {
        let mut root = ObjectReader::new(token, "root")?;

        let events_token = root.required_object("events")?;
        let states_token = root.required_object("states")?;
        let timers_token = root.object("timers")?;

        let timers = match timers_token {
            Some(token) => self.parse_timers(token)?,
            None => Vec::new(),
        };

        let state_members = as_members(states_token, "states")?;
        for member in state_members {
            register(&mut self.state_names, "state", &member.key, &member.value)?;
        }

        let events = self.parse_events(events_token)?;

        let mut states = Vec::with_capacity(state_members.len());
        for member in state_members {
            states.push(self.parse_state(&member.key, &member.value)?);
        }

        let (start_state, start_token) = root.required_string("start_state")?;
        self.resolve_state(start_state, start_token, "start state")?;

        root.finish()?;

        tracing::debug!(
            "Parsed state machine: {} timers, {} events, {} states, start state '{}'",
            timers.len(),
            events.len(),
            states.len(),
            start_state
        );

        Ok(StateMachine::new(
            timers,
            events,
            states,
            start_state.to_string(),
        ))
    }

    fn resolve_state(
        &self,
        name: &str,
        token: &Token,
        namespace: &'static str,
    ) -> Result<(), ParseError> {
        if !self.state_names.contains(name) {
            return Err(error_at(
                token,
                ParseErrorKind::UnknownName {
                    namespace,
                    name: name.to_string(),
                },
            ));
        }
        Ok(())
    }

    fn resolve_timer(&self, name: &str, token: &Token) -> Result<(), ParseError> {
        if !self.timer_names.contains(name) {
            return Err(error_at(
                token,
                ParseErrorKind::UnknownName {
                    namespace: "timer",
                    name: name.to_string(),
                },
            ));
        }
        Ok(())
    }

    fn parse_timers(&mut self, token: &'a Token) -> Result<Vec<Timer>, ParseError> {
        let mut timers = Vec::new();
        for member in as_members(token, "timers")? {
            let interval = member
                .value
                .as_f64()
                .ok_or_else(|| unexpected_type(&member.value, &member.key, "Number"))?;
            let interval = positive(
                &member.key,
                interval,
                &member.value,
                "must be a positive number of seconds",
            )?;
            register(&mut self.timer_names, "timer", &member.key, &member.value)?;
            timers.push(Timer {
                name: member.key.clone(),
                interval_seconds: interval,
            });
        }
        Ok(timers)
    }

    fn parse_events(&mut self, token: &'a Token) -> Result<Vec<Event>, ParseError> {
        let mut events = Vec::new();
        for member in as_members(token, "events")? {
            let event = self.parse_event(&member.key, &member.value)?;
            register(&mut self.event_names, "event", &member.key, &member.value)?;
            events.push(event);
        }
        Ok(events)
    }

    fn parse_event(&self, name: &str, token: &'a Token) -> Result<Event, ParseError> {
        let mut reader = ObjectReader::new(token, name)?;

        let after_states = match reader.array("after_states")? {
            Some(items) if !items.is_empty() => {
                let mut states: Vec<String> = Vec::with_capacity(items.len());
                for item in items {
                    let state = as_str(item, "state name")?;
                    self.resolve_state(state, item, "after_states state")?;
                    if states.iter().any(|s| s == state) {
                        return Err(error_at(
                            item,
                            ParseErrorKind::DuplicateName {
                                namespace: "after_states state",
                                name: state.to_string(),
                            },
                        ));
                    }
                    states.push(state.to_string());
                }
                Some(states)
            }
            _ => None,
        };

        let mut args = Vec::new();
        if let Some(args_token) = reader.object("args")? {
            for member in as_members(args_token, "args")? {
                let ty = as_str(&member.value, "arg type")?;
                args.push(EventArg {
                    name: member.key.clone(),
                    ty: ty.to_string(),
                });
            }
        }

        let only_once = reader.bool_or("only_once", false)?;
        reader.finish()?;

        Ok(Event {
            name: name.to_string(),
            args,
            after_states,
            only_once,
        })
    }

    fn parse_state(&self, name: &str, token: &'a Token) -> Result<State, ParseError> {
        let mut reader = ObjectReader::new(token, name)?;

        let start_timers = match reader.take("start_timers") {
            Some(token) => self.parse_start_timers(token)?,
            None => Vec::new(),
        };
        let stop_timers = match reader.array("stop_timers")? {
            Some(items) => self.parse_timer_names(items, "stop_timers timer")?,
            None => Vec::new(),
        };
        if let Some(timer) = stop_timers
            .iter()
            .find(|t| start_timers.iter().any(|s| &s.timer == *t))
        {
            return Err(error_at(
                token,
                ParseErrorKind::TimerStartedAndStopped {
                    state: name.to_string(),
                    timer: timer.clone(),
                },
            ));
        }

        let (on_enter, enter_targets) = match reader.take("on_enter") {
            Some(token) => self.parse_on_enter(token)?,
            None => (None, None),
        };

        let timer_edges = match reader.object("on_timer")? {
            Some(token) => Some(self.parse_edges(token, InvokerKind::Timer)?),
            None => None,
        };
        let event_edges = match reader.object("on_event")? {
            Some(token) => Some(self.parse_edges(token, InvokerKind::Event)?),
            None => None,
        };

        let next_state = match reader.string("next_state")? {
            Some((next, token)) => {
                self.resolve_state(next, token, "next state")?;
                Some(next.to_string())
            }
            None => None,
        };

        let is_final = reader.bool_or("final", false)?;

        let mut shape_tokens = Vec::new();
        if timer_edges.is_some() || event_edges.is_some() {
            shape_tokens.push("'on_timer'/'on_event'");
        }
        if next_state.is_some() {
            shape_tokens.push("'next_state'");
        }
        if enter_targets.is_some() {
            shape_tokens.push("'on_enter.targets'");
        }
        if is_final {
            shape_tokens.push("'final'");
        }
        match shape_tokens.len() {
            0 => {
                return Err(error_at(
                    token,
                    ParseErrorKind::MissingStateShape {
                        state: name.to_string(),
                    },
                ))
            }
            1 => {}
            _ => {
                return Err(error_at(
                    token,
                    ParseErrorKind::ConflictingStateShape {
                        state: name.to_string(),
                        tokens: shape_tokens.join(", "),
                    },
                ))
            }
        }

        reader.finish()?;

        let kind = if let Some(next) = next_state {
            StateKind::PassThrough(NextState::State(next))
        } else if let Some(targets) = enter_targets {
            StateKind::PassThrough(NextState::Decision(targets))
        } else if is_final {
            StateKind::Final
        } else {
            StateKind::Branching {
                event_edges: event_edges.unwrap_or_default(),
                timer_edges: timer_edges.unwrap_or_default(),
            }
        };

        Ok(State {
            name: name.to_string(),
            start_timers,
            stop_timers,
            on_enter,
            kind,
        })
    }

    fn parse_timer_names(
        &self,
        items: &[Token],
        namespace: &'static str,
    ) -> Result<Vec<String>, ParseError> {
        let mut names: Vec<String> = Vec::with_capacity(items.len());
        for item in items {
            let timer = as_str(item, "timer name")?;
            self.resolve_timer(timer, item)?;
            if names.iter().any(|n| n == timer) {
                return Err(error_at(
                    item,
                    ParseErrorKind::DuplicateName {
                        namespace,
                        name: timer.to_string(),
                    },
                ));
            }
            names.push(timer.to_string());
        }
        Ok(names)
    }

    /// `start_timers` is either a list of names or an object of
    /// name -> `null` | modification rule.
    fn parse_start_timers(&self, token: &'a Token) -> Result<Vec<TimerStart>, ParseError> {
        match &token.value {
            TokenValue::Array(items) => Ok(self
                .parse_timer_names(items, "start_timers timer")?
                .into_iter()
                .map(|timer| TimerStart {
                    timer,
                    modify: None,
                })
                .collect()),
            TokenValue::Object(members) => {
                let mut starts = Vec::with_capacity(members.len());
                for member in members {
                    self.resolve_timer(&member.key, &member.value)
                        .map_err(|e| ParseError {
                            span: member.key_span.or(e.span),
                            ..e
                        })?;
                    let modify = if member.value.is_null() {
                        None
                    } else {
                        Some(parse_modify(&member.key, &member.value)?)
                    };
                    starts.push(TimerStart {
                        timer: member.key.clone(),
                        modify,
                    });
                }
                Ok(starts)
            }
            _ => Err(unexpected_type(token, "start_timers", "Array or Object")),
        }
    }

    fn parse_on_enter(
        &self,
        token: &'a Token,
    ) -> Result<(Option<OnEnter>, Option<Vec<SubTarget>>), ParseError> {
        match &token.value {
            TokenValue::Bool(false) => Ok((None, None)),
            TokenValue::Bool(true) => Ok((Some(OnEnter::default()), None)),
            TokenValue::String(comment) => Ok((
                Some(OnEnter {
                    comment: Some(comment.clone()),
                }),
                None,
            )),
            TokenValue::Object(_) => {
                let mut reader = ObjectReader::new(token, "on_enter")?;
                let comment = reader.string("comment")?.map(|(c, _)| c.to_string());
                let targets = match reader.take("targets") {
                    Some(targets) => Some(self.parse_sub_targets(targets, "on_enter")?),
                    None => None,
                };
                reader.finish()?;
                Ok((Some(OnEnter { comment }), targets))
            }
            _ => Err(unexpected_type(
                token,
                "on_enter",
                "Boolean, String or Object",
            )),
        }
    }

    fn parse_edges(&self, token: &'a Token, kind: InvokerKind) -> Result<Vec<Edge>, ParseError> {
        let (container, known) = match kind {
            InvokerKind::Event => ("on_event", &self.event_names),
            InvokerKind::Timer => ("on_timer", &self.timer_names),
        };

        let mut seen = HashSet::new();
        let mut edges = Vec::new();
        for member in as_members(token, container)? {
            if !known.contains(member.key.as_str()) {
                return Err(error_at_key(
                    member,
                    ParseErrorKind::UnknownName {
                        namespace: if kind == InvokerKind::Event {
                            "event"
                        } else {
                            "timer"
                        },
                        name: member.key.clone(),
                    },
                ));
            }
            if !seen.insert(member.key.as_str()) {
                return Err(error_at_key(
                    member,
                    ParseErrorKind::DuplicateName {
                        namespace: container,
                        name: member.key.clone(),
                    },
                ));
            }
            edges.push(self.parse_edge(&member.key, kind, &member.value)?);
        }
        Ok(edges)
    }

    fn parse_edge(
        &self,
        invoker: &str,
        kind: InvokerKind,
        token: &'a Token,
    ) -> Result<Edge, ParseError> {
        let mut callbacks = Vec::new();
        let mut comment = None;

        let targets = match &token.value {
            TokenValue::Object(_) => {
                let mut reader = ObjectReader::new(token, invoker)?;
                let targets = match (reader.take("state"), reader.take("targets")) {
                    (Some(state), None) => EdgeTargets::Single(self.parse_target(state)?),
                    (None, Some(targets)) => {
                        if kind == InvokerKind::Timer {
                            return Err(error_at(
                                targets,
                                ParseErrorKind::DecisionOnTimer {
                                    timer: invoker.to_string(),
                                },
                            ));
                        }
                        EdgeTargets::Decision(self.parse_sub_targets(targets, invoker)?)
                    }
                    _ => {
                        return Err(error_at(
                            token,
                            ParseErrorKind::AmbiguousEdgeObject {
                                invoker: invoker.to_string(),
                            },
                        ))
                    }
                };

                if let Some(shapes) = reader.take("on_traverse") {
                    callbacks = parse_shapes(shapes)?;
                    let has_target = matches!(
                        targets,
                        EdgeTargets::Single(EdgeTarget::State(_) | EdgeTarget::NoChange)
                    );
                    let missing = callbacks.iter().find(|s| s.needs_target() && !has_target);
                    if let Some(shape) = missing {
                        return Err(error_at(
                            shapes,
                            ParseErrorKind::CallbackShapeNeedsTarget {
                                shape: *shape,
                                invoker: invoker.to_string(),
                            },
                        ));
                    }
                }
                comment = reader.string("comment")?.map(|(c, _)| c.to_string());
                reader.finish()?;
                targets
            }
            _ => EdgeTargets::Single(self.parse_target(token)?),
        };

        Ok(Edge {
            invoker: invoker.to_string(),
            invoker_kind: kind,
            targets,
            callbacks,
            comment,
        })
    }

    /// `null` | state name | `false`.
    fn parse_target(&self, token: &Token) -> Result<EdgeTarget, ParseError> {
        match &token.value {
            TokenValue::Null => Ok(EdgeTarget::NoChange),
            TokenValue::String(name) => {
                self.resolve_state(name, token, "target state")?;
                Ok(EdgeTarget::State(name.clone()))
            }
            TokenValue::Bool(false) => Ok(EdgeTarget::Failure),
            TokenValue::Bool(true) => Err(error_at(token, ParseErrorKind::FailureMustBeFalse)),
            _ => Err(unexpected_type(
                token,
                "edge target",
                "Null, String or false",
            )),
        }
    }

    /// Plain target, or `{ "state": <target> }`.
    fn parse_sub_target(&self, token: &'a Token) -> Result<EdgeTarget, ParseError> {
        match &token.value {
            TokenValue::Object(_) => {
                let mut reader = ObjectReader::new(token, "sub-target")?;
                let target = self.parse_target(reader.required("state")?)?;
                reader.finish()?;
                Ok(target)
            }
            _ => self.parse_target(token),
        }
    }

    fn parse_sub_targets(
        &self,
        token: &'a Token,
        owner: &str,
    ) -> Result<Vec<SubTarget>, ParseError> {
        let members = as_members(token, "targets")?;
        if members.is_empty() {
            return Err(error_at(
                token,
                ParseErrorKind::EmptyDecision {
                    invoker: owner.to_string(),
                },
            ));
        }
        members
            .iter()
            .map(|member| -> Result<SubTarget, ParseError> {
                Ok(SubTarget {
                    name: member.key.clone(),
                    target: self.parse_sub_target(&member.value)?,
                })
            })
            .collect()
    }
}

/// `false` | `true` | shape name | list of shape names.
fn parse_shapes(token: &Token) -> Result<Vec<CallbackShape>, ParseError> {
    let shape = |item: &Token| -> Result<CallbackShape, ParseError> {
        let name = as_str(item, "callback shape")?;
        CallbackShape::from_name(name).ok_or_else(|| {
            error_at(
                item,
                ParseErrorKind::UnknownCallbackShape {
                    name: name.to_string(),
                },
            )
        })
    };

    match &token.value {
        TokenValue::Bool(false) => Ok(Vec::new()),
        TokenValue::Bool(true) => Ok(vec![CallbackShape::EventOnly]),
        TokenValue::String(_) => Ok(vec![shape(token)?]),
        TokenValue::Array(items) => {
            let mut shapes = Vec::with_capacity(items.len());
            for item in items {
                let parsed = shape(item)?;
                if shapes.contains(&parsed) {
                    return Err(error_at(
                        item,
                        ParseErrorKind::DuplicateCallbackShape { shape: parsed },
                    ));
                }
                shapes.push(parsed);
            }
            Ok(shapes)
        }
        _ => Err(unexpected_type(
            token,
            "on_traverse",
            "Boolean, String or Array",
        )),
    }
}

fn parse_modify(timer: &str, token: &Token) -> Result<TimerModify, ParseError> {
    let mut reader = ObjectReader::new(token, timer)?;

    let set = match reader.number("set")? {
        Some((value, token)) => Some(positive("set", value, token, "must be positive")?),
        None => None,
    };
    let multiplier = match reader.number("multiplier")? {
        Some((value, token)) => Some(positive("multiplier", value, token, "must be positive")?),
        None => None,
    };
    let increment = finite(reader.number("increment")?, "increment")?;
    let min = finite(reader.number("min")?, "min")?;
    let max = finite(reader.number("max")?, "max")?;

    reader.finish()?;

    let modify = TimerModify {
        set,
        multiplier,
        increment,
        min,
        max,
    };
    if modify == TimerModify::default() {
        return Err(error_at(
            token,
            ParseErrorKind::EmptyTimerModify {
                timer: timer.to_string(),
            },
        ));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(error_at(
                token,
                ParseErrorKind::InvalidTimerBounds {
                    timer: timer.to_string(),
                    min,
                    max,
                },
            ));
        }
    }
    Ok(modify)
}

fn finite(value: Option<(f64, &Token)>, name: &str) -> Result<Option<f64>, ParseError> {
    match value {
        Some((value, token)) if !value.is_finite() => Err(error_at(
            token,
            ParseErrorKind::InvalidNumber {
                name: name.to_string(),
                reason: "must be finite",
                value,
            },
        )),
        Some((value, _)) => Ok(Some(value)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsmgen_token::{read_str, ReaderOptions, Span};
    use serde_json::json;

    fn load(value: serde_json::Value) -> Result<StateMachine, ParseError> {
        parse(&Token::from_value(&value))
    }

    fn sample() -> serde_json::Value {
        json!({
            "timers": {"T": 5, "Retry": 0.5},
            "events": {
                "E": {"args": {"code": "int", "reason": "string"}},
                "Done": {"after_states": ["S1"], "only_once": true}
            },
            "states": {
                "S0": {
                    "start_timers": ["T"],
                    "on_enter": true,
                    "on_event": {"E": "S1"},
                    "on_timer": {"T": null}
                },
                "S1": {
                    "stop_timers": ["T"],
                    "start_timers": {"Retry": {"multiplier": 2, "max": 8}},
                    "on_event": {
                        "E": {"state": null, "on_traverse": ["event_only", "full"], "comment": "ignored"},
                        "Done": {"targets": {"ok": "S2", "again": {"state": "S0"}, "broken": false}}
                    },
                    "on_timer": {"Retry": false}
                },
                "S2": {"final": true}
            },
            "start_state": "S0"
        })
    }

    #[test]
    fn test_parse_sample() {
        let machine = load(sample()).unwrap();

        assert_eq!(machine.start_state(), "S0");
        assert_eq!(machine.timers().len(), 2);
        assert_eq!(machine.timer("Retry").unwrap().interval_seconds, 0.5);

        let e = machine.event("E").unwrap();
        assert_eq!(e.args.len(), 2);
        assert_eq!(e.args[1].name, "reason");
        assert_eq!(e.args[1].ty, "string");
        assert!(e.is_initially_armed());

        let done = machine.event("Done").unwrap();
        assert!(done.only_once);
        assert_eq!(done.after_states.as_deref(), Some(&["S1".to_string()][..]));

        let s0 = machine.state("S0").unwrap();
        assert!(s0.needs_on_enter_notification());
        assert!(s0.starts_timer("T"));
        assert_eq!(
            s0.event_edge("E").unwrap().targets,
            EdgeTargets::Single(EdgeTarget::State("S1".into()))
        );
        assert_eq!(
            s0.timer_edge("T").unwrap().targets,
            EdgeTargets::Single(EdgeTarget::NoChange)
        );

        let s1 = machine.state("S1").unwrap();
        assert!(s1.stops_timer("T"));
        assert_eq!(s1.start_timers[0].modify.as_ref().unwrap().apply(3.0), 6.0);
        let e_edge = s1.event_edge("E").unwrap();
        assert_eq!(
            e_edge.callbacks,
            vec![CallbackShape::EventOnly, CallbackShape::Full]
        );
        assert_eq!(e_edge.comment.as_deref(), Some("ignored"));

        let done_edge = s1.event_edge("Done").unwrap();
        match &done_edge.targets {
            EdgeTargets::Decision(targets) => {
                let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
                assert_eq!(names, vec!["ok", "again", "broken"]);
                assert_eq!(targets[1].target, EdgeTarget::State("S0".into()));
                assert_eq!(targets[2].target, EdgeTarget::Failure);
            }
            other => panic!("expected decision, got {:?}", other),
        }
        assert_eq!(
            s1.timer_edge("Retry").unwrap().targets,
            EdgeTargets::Single(EdgeTarget::Failure)
        );

        assert!(machine.state("S2").unwrap().is_final());
    }

    #[test]
    fn test_forward_references() {
        let machine = load(json!({
            "events": {"Go": {"after_states": ["Last"]}},
            "states": {
                "First": {"next_state": "Last"},
                "Last": {"final": true}
            },
            "start_state": "First"
        }))
        .unwrap();
        assert_eq!(
            machine.state("First").unwrap().next_state(),
            Some(&NextState::State("Last".into()))
        );
    }

    #[test]
    fn test_on_enter_decision_and_comment() {
        let machine = load(json!({
            "events": {},
            "states": {
                "Check": {"on_enter": {"comment": "decide", "targets": {"yes": "A", "no": "B"}}},
                "A": {"on_enter": "entered A", "final": true},
                "B": {"final": true}
            },
            "start_state": "Check"
        }))
        .unwrap();

        let check = machine.state("Check").unwrap();
        assert_eq!(
            check.on_enter.as_ref().unwrap().comment.as_deref(),
            Some("decide")
        );
        match check.next_state() {
            Some(NextState::Decision(targets)) => assert_eq!(targets.len(), 2),
            other => panic!("expected decision, got {:?}", other),
        }

        let a = machine.state("A").unwrap();
        assert_eq!(
            a.on_enter.as_ref().unwrap().comment.as_deref(),
            Some("entered A")
        );
    }

    #[test]
    fn test_missing_start_state() {
        let err = load(json!({"events": {}, "states": {"S": {"final": true}}})).unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::MissingField {
                name: "start_state".into(),
            }
        );
    }

    #[test]
    fn test_unknown_start_state() {
        let err = load(json!({
            "events": {},
            "states": {"S": {"final": true}},
            "start_state": "Nope"
        }))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::UnknownName {
                namespace: "start state",
                ..
            }
        ));
        assert_eq!(err.path, "start_state");
    }

    #[test]
    fn test_unused_top_level_token() {
        let err = load(json!({
            "events": {},
            "states": {"S": {"final": true}},
            "start_state": "S",
            "extra": 1
        }))
        .unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnusedField {
                name: "extra".into(),
            }
        );
    }

    #[test]
    fn test_unknown_state_field() {
        let err = load(json!({
            "events": {},
            "states": {"S": {"final": true, "finale": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnusedField {
                name: "finale".into(),
            }
        );
        assert_eq!(err.path, "states.S.finale");
    }

    #[test]
    fn test_state_shape_missing() {
        let err = load(json!({
            "events": {},
            "states": {"S": {}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MissingStateShape { .. }));
    }

    #[test]
    fn test_state_shape_conflict() {
        let err = load(json!({
            "events": {"E": {}},
            "states": {
                "S": {"on_event": {"E": null}, "final": true}
            },
            "start_state": "S"
        }))
        .unwrap_err();
        match err.kind {
            ParseErrorKind::ConflictingStateShape { state, tokens } => {
                assert_eq!(state, "S");
                assert!(tokens.contains("'final'"));
                assert!(tokens.contains("'on_timer'/'on_event'"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let err = load(json!({
            "events": {},
            "states": {
                "S": {"next_state": "T", "on_enter": {"targets": {"a": "T"}}},
                "T": {"final": true}
            },
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::ConflictingStateShape { .. }
        ));
    }

    #[test]
    fn test_null_next_state_is_absent() {
        let err = load(json!({
            "events": {},
            "states": {"S": {"next_state": null}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::MissingStateShape { .. }));
    }

    #[test]
    fn test_undeclared_timer() {
        let err = load(json!({
            "timers": {"T": 1},
            "events": {},
            "states": {"S": {"start_timers": ["U"], "final": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert_eq!(
            err.kind,
            ParseErrorKind::UnknownName {
                namespace: "timer",
                name: "U".into(),
            }
        );
        assert_eq!(err.path, "states.S.start_timers[0]");
    }

    #[test]
    fn test_duplicate_timer_in_state() {
        let err = load(json!({
            "timers": {"T": 1},
            "events": {},
            "states": {"S": {"start_timers": ["T", "T"], "final": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::DuplicateName { .. }));
    }

    #[test]
    fn test_timer_started_and_stopped() {
        let err = load(json!({
            "timers": {"T": 1},
            "events": {},
            "states": {"S": {"start_timers": ["T"], "stop_timers": ["T"], "final": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::TimerStartedAndStopped { .. }
        ));
    }

    #[test]
    fn test_bad_timer_interval() {
        let err = load(json!({
            "timers": {"T": 0},
            "events": {},
            "states": {"S": {"final": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::InvalidNumber { .. }));

        let err = load(json!({
            "timers": {"T": "5s"},
            "events": {},
            "states": {"S": {"final": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedType { .. }));
    }

    #[test]
    fn test_timer_modify_rules() {
        let base = |modify: serde_json::Value| {
            load(json!({
                "timers": {"T": 1},
                "events": {},
                "states": {"S": {"start_timers": {"T": modify}, "final": true}},
                "start_state": "S"
            }))
        };

        assert!(base(json!(null)).is_ok());
        assert!(base(json!({"increment": 1})).is_ok());
        assert!(matches!(
            base(json!({})).unwrap_err().kind,
            ParseErrorKind::EmptyTimerModify { .. }
        ));
        assert!(matches!(
            base(json!({"min": 5, "max": 1})).unwrap_err().kind,
            ParseErrorKind::InvalidTimerBounds { .. }
        ));
        assert!(matches!(
            base(json!({"multiplier": -1})).unwrap_err().kind,
            ParseErrorKind::InvalidNumber { .. }
        ));
        assert!(matches!(
            base(json!({"factor": 2})).unwrap_err().kind,
            ParseErrorKind::UnusedField { .. }
        ));
    }

    #[test]
    fn test_unknown_edge_names() {
        let err = load(json!({
            "events": {"E": {}},
            "states": {"S": {"on_event": {"F": null}}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::UnknownName {
                namespace: "event",
                ..
            }
        ));

        let err = load(json!({
            "events": {"E": {}},
            "states": {"S": {"on_event": {"E": "Nowhere"}}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::UnknownName {
                namespace: "target state",
                ..
            }
        ));
    }

    #[test]
    fn test_true_edge_rejected() {
        let err = load(json!({
            "events": {"E": {}},
            "states": {"S": {"on_event": {"E": true}}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::FailureMustBeFalse);
    }

    #[test]
    fn test_edge_of_wrong_type() {
        let err = load(json!({
            "events": {"E": {}},
            "states": {"S": {"on_event": {"E": 3}}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnexpectedType { .. }));
    }

    #[test]
    fn test_decision_on_timer_rejected() {
        let err = load(json!({
            "timers": {"T": 1},
            "events": {},
            "states": {
                "S": {"start_timers": ["T"], "on_timer": {"T": {"targets": {"a": "S"}}}}
            },
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::DecisionOnTimer { .. }));
    }

    #[test]
    fn test_edge_object_shape() {
        let err = load(json!({
            "events": {"E": {}},
            "states": {"S": {"on_event": {"E": {"on_traverse": true}}}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(
            err.kind,
            ParseErrorKind::AmbiguousEdgeObject { .. }
        ));

        let err = load(json!({
            "events": {"E": {}},
            "states": {"S": {"on_event": {"E": {"targets": {}}}}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::EmptyDecision { .. }));
    }

    #[test]
    fn test_callback_shapes() {
        let base = |edge: serde_json::Value| {
            load(json!({
                "events": {"E": {}},
                "states": {"S": {"on_event": {"E": edge}}},
                "start_state": "S"
            }))
        };

        let callbacks = |edge: serde_json::Value| {
            let machine = base(edge).unwrap();
            let parsed = machine.state("S").unwrap().event_edge("E").unwrap();
            parsed.callbacks.clone()
        };
        let err = |edge: serde_json::Value| base(edge).unwrap_err().kind;

        assert_eq!(
            callbacks(json!({"state": "S", "on_traverse": true})),
            vec![CallbackShape::EventOnly]
        );
        assert_eq!(
            callbacks(json!({"state": "S", "on_traverse": "source_only"})),
            vec![CallbackShape::SourceOnly]
        );

        assert!(matches!(
            err(json!({"state": "S", "on_traverse": "sometimes"})),
            ParseErrorKind::UnknownCallbackShape { .. }
        ));
        assert!(matches!(
            err(json!({"state": "S", "on_traverse": ["full", "full"]})),
            ParseErrorKind::DuplicateCallbackShape { .. }
        ));
        assert!(matches!(
            err(json!({"targets": {"a": "S"}, "on_traverse": "full"})),
            ParseErrorKind::CallbackShapeNeedsTarget { .. }
        ));
        assert!(matches!(
            err(json!({"state": false, "on_traverse": "target_only"})),
            ParseErrorKind::CallbackShapeNeedsTarget { .. }
        ));
        assert!(base(json!({"state": null, "on_traverse": "full"})).is_ok());
    }

    #[test]
    fn test_after_states_validation() {
        let err = load(json!({
            "events": {"E": {"after_states": ["Ghost"]}},
            "states": {"S": {"final": true}},
            "start_state": "S"
        }))
        .unwrap_err();
        assert!(matches!(err.kind, ParseErrorKind::UnknownName { .. }));

        let machine = load(json!({
            "events": {"E": {"after_states": []}},
            "states": {"S": {"final": true}},
            "start_state": "S"
        }))
        .unwrap();
        assert!(machine.event("E").unwrap().is_initially_armed());
    }

    #[test]
    fn test_errors_carry_source_location() {
        let text = r#"{
    "events": {},
    "states": {
        "S": {"next_state": "Missing"}
    },
    "start_state": "S"
}"#;
        let token = read_str(text, &ReaderOptions::default()).unwrap();
        let err = parse(&token).unwrap_err();
        assert_eq!(err.path, "states.S.next_state");
        assert_eq!(err.span, Some(Span::new(4, 29)));
        let suffix = "path: states.S.next_state; line: 4, pos: 29";
        assert!(err.to_string().ends_with(suffix));
    }
}
