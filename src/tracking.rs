//! Counters and gauges that log every change.

use std::{collections::BTreeMap, sync::Arc};

use parking_lot::Mutex;

use crate::{
    error::LogError,
    event::{Event, FieldValue},
    level::EventLevel,
    logger::EventLogger,
};

/// A numeric value whose every update is logged as an event.
///
/// Each event carries the tracker's name and target, the new value, and the
/// template fields with any per-call fields merged over a copy of them.
pub struct TrackedValue {
    logger: Arc<EventLogger>,
    name: String,
    target: String,
    template: BTreeMap<String, FieldValue>,
    value: Mutex<f64>,
    // Serialises updates so events leave in update order without blocking `get`.
    updates: Mutex<()>,
}

impl TrackedValue {
    pub fn new(
        logger: Arc<EventLogger>,
        name: impl Into<String>,
        target: impl Into<String>,
        initial: f64,
        fields: impl IntoIterator<Item = (String, FieldValue)>,
    ) -> Self {
        Self {
            logger,
            name: name.into(),
            target: target.into(),
            template: fields.into_iter().collect(),
            value: Mutex::new(initial),
            updates: Mutex::new(()),
        }
    }

    /// Store `value` and log it.
    pub fn set(&self, value: f64, update: Update) -> Result<(), LogError> {
        let _order = self.updates.lock();
        *self.value.lock() = value;
        self.log(value, update)
    }

    /// Add `delta` to the current value and log the result.
    pub fn inc(&self, delta: f64, update: Update) -> Result<(), LogError> {
        let _order = self.updates.lock();
        let value = {
            let mut current = self.value.lock();
            *current += delta;
            *current
        };
        self.log(value, update)
    }

    pub fn get(&self) -> f64 {
        *self.value.lock()
    }

    pub fn template(&self) -> &BTreeMap<String, FieldValue> {
        &self.template
    }

    fn log(&self, value: f64, update: Update) -> Result<(), LogError> {
        let mut fields = self.template.clone();
        fields.extend(update.fields);
        let mut event = Event::new(self.name.as_str(), self.target.as_str())
            .with_value(value)
            .with_level(update.level);
        event.fields = fields;
        if let Some(message) = update.message {
            event = event.with_message(message);
        }
        self.logger.log_event(&event)
    }
}

impl std::fmt::Debug for TrackedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedValue")
            .field("name", &self.name)
            .field("target", &self.target)
            .field("value", &self.get())
            .finish()
    }
}

/// Per-call extras for a [`TrackedValue`] update.
#[derive(Clone, Debug)]
pub struct Update {
    pub level: EventLevel,
    pub message: Option<String>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl Default for Update {
    fn default() -> Self {
        Self {
            level: EventLevel::Info,
            message: None,
            fields: BTreeMap::new(),
        }
    }
}

impl Update {
    pub fn with_level(mut self, level: EventLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
