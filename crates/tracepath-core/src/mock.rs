//! Strict in-memory agent
//!
//! Records every call it receives and checks each one against its own copy of
//! the tracer state machine. Calls the engine should never make (unknown ids,
//! skipped states, double ends) are collected as violations rather than
//! panicking, so tests can assert on them after the fact.

use crate::agent::{Agent, AgentError, AgentResult, AgentState};
use crate::diagnostics::{CallbackSlot, DiagnosticCallback};
use crate::kind::{TracerDetails, TracerKind, TracerUpdate};
use crate::node::TracerState;
use crate::tag::{encode_form, IncomingTag, TagForm, TracerId};
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A call received by the mock agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentCall {
    Create { id: TracerId, kind: TracerKind },
    Update { id: TracerId, update: TracerUpdate },
    Start(TracerId),
    End(TracerId),
    Error { id: TracerId, class: String, message: String },
    GetOutgoingTag { id: TracerId, form: TagForm },
    SetIncomingTag { id: TracerId, tag: IncomingTag },
}

#[derive(Debug, Default)]
struct Recorded {
    calls: Vec<AgentCall>,
    tracers: HashMap<TracerId, TracerState>,
    violations: Vec<String>,
}

impl Recorded {
    /// Check that `id` is known and in one of `allowed`, recording a violation otherwise
    fn expect(&mut self, call: &str, id: TracerId, allowed: &[TracerState]) -> bool {
        match self.tracers.get(&id) {
            None => {
                self.violations
                    .push(format!("{} for unknown tracer {}", call, id));
                false
            }
            Some(state) if !allowed.contains(state) => {
                self.violations
                    .push(format!("{} for tracer {} in state {}", call, id, state));
                false
            }
            Some(_) => true,
        }
    }
}

/// Strict recording agent
#[derive(Debug)]
pub struct MockAgent {
    state: Mutex<AgentState>,
    callback: CallbackSlot,
    rejected_options: HashSet<String>,
    init_failure: Option<String>,
    recorded: Mutex<Recorded>,
}

impl Default for MockAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAgent {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(AgentState::NotInitialized),
            callback: CallbackSlot::new(),
            rejected_options: HashSet::new(),
            init_failure: None,
            recorded: Mutex::new(Recorded::default()),
        }
    }

    /// Reject options with this name during initialize
    pub fn rejecting_option(mut self, name: &str) -> Self {
        self.rejected_options.insert(name.to_string());
        self
    }

    /// Fail every initialize with `reason`
    pub fn failing_initialize(mut self, reason: &str) -> Self {
        self.init_failure = Some(reason.to_string());
        self
    }

    /// Force a state, e.g. to simulate a temporarily inactive agent
    pub fn set_state(&self, state: AgentState) {
        *self.state.lock() = state;
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<AgentCall> {
        self.recorded.lock().calls.clone()
    }

    /// Protocol violations observed so far
    pub fn violations(&self) -> Vec<String> {
        self.recorded.lock().violations.clone()
    }

    /// State of a tracer as seen by the agent
    pub fn tracer_state(&self, id: TracerId) -> Option<TracerState> {
        self.recorded.lock().tracers.get(&id).copied()
    }

    /// Number of tracers the agent knows about that have not ended
    pub fn live_tracers(&self) -> usize {
        self.recorded
            .lock()
            .tracers
            .values()
            .filter(|s| **s != TracerState::Ended)
            .count()
    }

    pub fn clear(&self) {
        *self.recorded.lock() = Recorded::default();
    }
}

impl Agent for MockAgent {
    fn name(&self) -> &str {
        "mock"
    }

    fn version_string(&self) -> String {
        format!("0.000.0.00000000-{}", std::any::type_name::<Self>())
    }

    fn state(&self) -> AgentState {
        *self.state.lock()
    }

    fn is_found(&self) -> bool {
        true
    }

    fn is_compatible(&self) -> bool {
        true
    }

    fn initialize(&self, options: &[String]) -> AgentResult<Vec<String>> {
        let mut state = self.state.lock();
        if *state != AgentState::NotInitialized {
            return Err(AgentError::AlreadyInitialized);
        }
        if let Some(reason) = &self.init_failure {
            *state = AgentState::Error;
            return Err(AgentError::InitializationFailed(reason.clone()));
        }

        let rejected: Vec<String> = options
            .iter()
            .filter(|opt| {
                let name = opt.split_once('=').map_or(opt.as_str(), |(n, _)| n);
                self.rejected_options.contains(name.trim())
            })
            .cloned()
            .collect();

        *state = AgentState::Active;
        debug!(target: "tracepath", options = options.len(), rejected = rejected.len(), "mock agent initialized");
        Ok(rejected)
    }

    fn shutdown(&self) -> AgentResult<()> {
        let mut state = self.state.lock();
        match *state {
            AgentState::Active | AgentState::TemporarilyInactive => {
                *state = AgentState::NotInitialized;
                Ok(())
            }
            _ => Err(AgentError::NotInitialized),
        }
    }

    fn tracer_create(&self, id: TracerId, details: &TracerDetails) {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::Create {
            id,
            kind: details.kind(),
        });
        if rec.tracers.insert(id, TracerState::Created).is_some() {
            rec.violations.push(format!("tracer {} created twice", id));
        }
    }

    fn tracer_update(&self, id: TracerId, update: &TracerUpdate) {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::Update {
            id,
            update: update.clone(),
        });
        let allowed: &[TracerState] = if update.is_entry_field() {
            &[TracerState::Created]
        } else {
            &[TracerState::Created, TracerState::Started]
        };
        rec.expect(update.field(), id, allowed);
    }

    fn tracer_start(&self, id: TracerId) {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::Start(id));
        if rec.expect("start", id, &[TracerState::Created]) {
            rec.tracers.insert(id, TracerState::Started);
        }
    }

    fn tracer_end(&self, id: TracerId) {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::End(id));
        if rec.expect("end", id, &[TracerState::Created, TracerState::Started]) {
            rec.tracers.insert(id, TracerState::Ended);
        }
    }

    fn tracer_error(&self, id: TracerId, class: &str, message: &str) {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::Error {
            id,
            class: class.to_string(),
            message: message.to_string(),
        });
        rec.expect("error", id, &[TracerState::Started]);
    }

    fn tracer_get_outgoing_tag(&self, id: TracerId, form: TagForm) -> Vec<u8> {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::GetOutgoingTag { id, form });
        if rec.expect("outgoing tag", id, &[TracerState::Started]) {
            encode_form(id, form)
        } else {
            Vec::new()
        }
    }

    fn tracer_set_incoming_tag(&self, id: TracerId, tag: &IncomingTag) {
        let mut rec = self.recorded.lock();
        rec.calls.push(AgentCall::SetIncomingTag {
            id,
            tag: tag.clone(),
        });
        rec.expect("incoming tag", id, &[TracerState::Created]);
    }

    fn set_logging_callback(&self, callback: Option<DiagnosticCallback>) {
        self.callback.set(callback);
    }

    fn logging_callback(&self) -> Option<DiagnosticCallback> {
        self.callback.get()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
