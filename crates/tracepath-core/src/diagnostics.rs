//! Diagnostic channel for conditions that cannot be returned as errors
//!
//! Leaked tracers, ambiguous tag input and custom attributes without an active
//! tracer are reported here. Every message goes to the agent's logging
//! callback, if one is registered, and to a `tracing` warning.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Callback receiving diagnostic messages
pub type DiagnosticCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Replaceable callback storage for agents
#[derive(Default)]
pub struct CallbackSlot(RwLock<Option<DiagnosticCallback>>);

impl CallbackSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, callback: Option<DiagnosticCallback>) {
        *self.0.write() = callback;
    }

    pub fn get(&self) -> Option<DiagnosticCallback> {
        self.0.read().clone()
    }
}

impl fmt::Debug for CallbackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CallbackSlot")
            .field(&self.0.read().is_some())
            .finish()
    }
}

/// Emit a diagnostic through `callback` and the `tracing` warning stream
pub fn emit(callback: Option<&DiagnosticCallback>, message: &str) {
    warn!(target: "tracepath", "{}", message);
    if let Some(cb) = callback {
        cb(message);
    }
}

/// Callback collecting messages into a shared vector, for tests and tooling
pub fn collecting_callback() -> (DiagnosticCallback, Arc<parking_lot::Mutex<Vec<String>>>) {
    let sink = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink2 = Arc::clone(&sink);
    let cb: DiagnosticCallback = Arc::new(move |msg: &str| sink2.lock().push(msg.to_string()));
    (cb, sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_replace_and_clear() {
        let slot = CallbackSlot::new();
        assert!(slot.get().is_none());

        let (cb, sink) = collecting_callback();
        slot.set(Some(cb));
        emit(slot.get().as_ref(), "first");
        slot.set(None);
        emit(slot.get().as_ref(), "second");

        assert_eq!(*sink.lock(), vec!["first".to_string()]);
    }
}
