//! Named lifecycle hooks dispatched to user scripts.
//!
//! A fixed set of events is registered from a user object; [`Events::run`]
//! switches the scripting context to the stand under evaluation and
//! invokes whichever callable (if any) is bound to that event name,
//! returning the callable's string result. `onEvaluate` returning the
//! literal string `"false"` cancels execution, per the component design.

use crate::engine::ids::StandId;
use crate::host::ScriptHost;

/// One of the fixed named hooks an STP or activity can bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    OnCreate,
    OnSetup,
    OnEnter,
    OnExit,
    OnExecute,
    OnExecuted,
    OnCancel,
    OnEvaluate,
}

impl EventKind {
    pub fn name(self) -> &'static str {
        match self {
            EventKind::OnCreate => "onCreate",
            EventKind::OnSetup => "onSetup",
            EventKind::OnEnter => "onEnter",
            EventKind::OnExit => "onExit",
            EventKind::OnExecute => "onExecute",
            EventKind::OnExecuted => "onExecuted",
            EventKind::OnCancel => "onCancel",
            EventKind::OnEvaluate => "onEvaluate",
        }
    }

    const ALL: [EventKind; 8] = [
        EventKind::OnCreate,
        EventKind::OnSetup,
        EventKind::OnEnter,
        EventKind::OnExit,
        EventKind::OnExecute,
        EventKind::OnExecuted,
        EventKind::OnCancel,
        EventKind::OnEvaluate,
    ];
}

/// The callables bound to each of the fixed event names, for one STP or
/// activity. Any event may be unbound (`None`), in which case `run`
/// is a no-op that returns `None`.
#[derive(Debug, Clone, Default)]
pub struct Events<H> {
    handlers: [Option<H>; 8],
}

impl<H: Clone + std::fmt::Debug> Events<H> {
    pub fn new() -> Self {
        Self {
            handlers: Default::default(),
        }
    }

    pub fn bind(&mut self, event: EventKind, handle: H) -> &mut Self {
        self.handlers[event_slot(event)] = Some(handle);
        self
    }

    pub fn is_bound(&self, event: EventKind) -> bool {
        self.handlers[event_slot(event)].is_some()
    }

    /// Runs the handler bound to `event` for `stand`, returning its
    /// string representation, or `None` if nothing is bound.
    ///
    /// Script errors are wrapped with the stand, an activity/STP label
    /// supplied by the caller, and the event name, per the component
    /// design's error-wrapping rule.
    pub fn run<S>(
        &self,
        event: EventKind,
        stand: StandId,
        label: &str,
        host: &mut S,
    ) -> Result<Option<String>, crate::error::ScriptError>
    where
        S: ScriptHost<Handle = H>,
    {
        let Some(handle) = &self.handlers[event_slot(event)] else {
            return Ok(None);
        };
        host.call(handle, stand)
            .map(Some)
            .map_err(|message| crate::error::ScriptError::new(stand, label, event.name(), message))
    }

    /// Convenience for `onEvaluate`: the event cancels execution when its
    /// result is the literal string `"false"`. Unbound means "do not
    /// cancel" (evaluate proceeds under the normal schedule/constraint
    /// rules).
    pub fn evaluate_cancels<S>(
        &self,
        stand: StandId,
        label: &str,
        host: &mut S,
    ) -> Result<bool, crate::error::ScriptError>
    where
        S: ScriptHost<Handle = H>,
    {
        Ok(self
            .run(EventKind::OnEvaluate, stand, label, host)?
            .map(|result| result == "false")
            .unwrap_or(false))
    }
}

fn event_slot(event: EventKind) -> usize {
    EventKind::ALL.iter().position(|&e| e == event).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::NullScriptHost;

    #[test]
    fn unbound_event_is_a_no_op() {
        let events: Events<String> = Events::new();
        let mut host = NullScriptHost::with_call_result("ignored");
        let result = events
            .run(EventKind::OnEnter, StandId::new(1), "act", &mut host)
            .unwrap();
        assert_eq!(result, None);
        assert!(host.calls.is_empty());
    }

    #[test]
    fn bound_event_dispatches_and_returns_string_result() {
        let mut events: Events<String> = Events::new();
        events.bind(EventKind::OnEnter, "handler".to_string());
        let mut host = NullScriptHost::with_call_result("42");
        let result = events
            .run(EventKind::OnEnter, StandId::new(1), "act", &mut host)
            .unwrap();
        assert_eq!(result, Some("42".to_string()));
    }

    #[test]
    fn on_evaluate_false_cancels() {
        let mut events: Events<String> = Events::new();
        events.bind(EventKind::OnEvaluate, "handler".to_string());
        let mut host = NullScriptHost::with_call_result("false");
        assert!(events
            .evaluate_cancels(StandId::new(1), "act", &mut host)
            .unwrap());
    }

    #[test]
    fn on_evaluate_other_result_does_not_cancel() {
        let mut events: Events<String> = Events::new();
        events.bind(EventKind::OnEvaluate, "handler".to_string());
        let mut host = NullScriptHost::with_call_result("true");
        assert!(!events
            .evaluate_cancels(StandId::new(1), "act", &mut host)
            .unwrap());
    }

    #[test]
    fn script_error_is_wrapped_with_stand_activity_and_event() {
        let mut events: Events<String> = Events::new();
        events.bind(EventKind::OnExecute, "handler".to_string());
        let mut host = NullScriptHost::with_call_result("x");
        host.fail_next_call = true;
        let err = events
            .run(EventKind::OnExecute, StandId::new(7), "ThinningA", &mut host)
            .unwrap_err();
        assert_eq!(err.stand, StandId::new(7));
        assert_eq!(err.activity, "ThinningA");
        assert_eq!(err.event, "onExecute");
    }
}
