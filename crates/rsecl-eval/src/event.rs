//! Events and the per-evaluation context.
//!
//! [`Event`] wraps a `serde_json::Value` with dot-notation field access and
//! flat-key precedence. [`Context`] adds what deferred evaluators need beyond
//! the event: the evaluation time and the iterator registers.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::Value;

use crate::model::RegisterId;

/// A reference to a JSON event for field access during evaluation.
///
/// Flat keys are checked first: `"process.name"` as a single key takes
/// precedence over `{"process": {"name": ...}}` nested traversal.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    inner: &'a Value,
}

impl<'a> Event<'a> {
    pub fn from_value(value: &'a Value) -> Self {
        Event { inner: value }
    }

    /// Get a field value by dotted path.
    pub fn get_field(&self, path: &str) -> Option<&'a Value> {
        lookup(self.inner, path)
    }

    pub fn as_value(&self) -> &'a Value {
        self.inner
    }
}

/// Resolve a dotted path below `value`, flat keys first.
///
/// Arrays met along the way are searched element by element; the first
/// element resolving the remaining path wins.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    if let Some(obj) = value.as_object()
        && let Some(v) = obj.get(path)
    {
        return Some(v);
    }
    if path.contains('.') {
        let parts: Vec<&str> = path.split('.').collect();
        return traverse(value, &parts);
    }
    None
}

fn traverse<'a>(current: &'a Value, parts: &[&str]) -> Option<&'a Value> {
    let Some((head, rest)) = parts.split_first() else {
        return Some(current);
    };
    match current {
        Value::Object(map) => traverse(map.get(*head)?, rest),
        Value::Array(arr) => arr.iter().find_map(|item| traverse(item, parts)),
        _ => None,
    }
}

// =============================================================================
// Context
// =============================================================================

/// Everything a deferred evaluator reads while evaluating one event.
///
/// A context is built per evaluation and never shared between threads, so
/// compiled evaluators can run concurrently against distinct contexts.
#[derive(Debug, Clone)]
pub struct Context<'a> {
    event: Event<'a>,
    now: i64,
    registers: HashMap<RegisterId, usize>,
}

impl<'a> Context<'a> {
    /// Context for `event`, timestamped with the current time.
    pub fn new(event: Event<'a>) -> Self {
        Context {
            event,
            now: Utc::now().timestamp_nanos_opt().unwrap_or_default(),
            registers: HashMap::new(),
        }
    }

    pub fn from_value(value: &'a Value) -> Self {
        Context::new(Event::from_value(value))
    }

    /// Override the evaluation time, in nanoseconds since the Unix epoch.
    pub fn with_now(mut self, now: i64) -> Self {
        self.now = now;
        self
    }

    pub fn with_register(mut self, id: impl Into<RegisterId>, index: usize) -> Self {
        self.set_register(id, index);
        self
    }

    /// Select element `index` for register `id`.
    pub fn set_register(&mut self, id: impl Into<RegisterId>, index: usize) {
        self.registers.insert(id.into(), index);
    }

    pub fn clear_register(&mut self, id: &str) {
        self.registers.remove(id);
    }

    /// Element selected for register `id`, if any.
    pub fn register(&self, id: &str) -> Option<usize> {
        self.registers.get(id).copied()
    }

    pub fn event(&self) -> &Event<'a> {
        &self.event
    }

    /// Evaluation time in nanoseconds since the Unix epoch.
    pub fn now(&self) -> i64 {
        self.now
    }
}
