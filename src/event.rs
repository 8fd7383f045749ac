//! Metrics ("events") and the per-entity metric store.
//!
//! An [`Event`] is an opaque handle: two events are the same metric only if
//! they share the same key, regardless of their display names. `SAMPLES` and
//! `SAMPLES2` are both shown as "Samples" but measure different things (self
//! cost of a function versus inclusive cost of a call edge).

use serde::ser::{SerializeSeq as _, Serializer};
use serde::Serialize;

use std::collections::BTreeMap;
use std::fmt;

use crate::{GraphError, GraphResult};

/// How two values of one metric combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregator {
    Add,
    /// The metric is derived per entity and must never be merged.
    Fail,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Formatter {
    /// `12×`
    Times,
    /// `12.34%`
    Percentage,
}

#[derive(Clone, Copy)]
pub struct Event {
    key: u8,
    name: &'static str,
    null: f64,
    aggregator: Aggregator,
    formatter: Formatter,
}

pub const CALLS: Event = Event::new(0, "Calls", 0.0, Aggregator::Add, Formatter::Times);
pub const SAMPLES: Event = Event::new(1, "Samples", 0.0, Aggregator::Add, Formatter::Times);
pub const SAMPLES2: Event = Event::new(2, "Samples", 0.0, Aggregator::Add, Formatter::Times);
/// Samples where the function was executing or anywhere on the stack.
pub const TOTAL_SAMPLES: Event = Event::new(3, "Samples", 0.0, Aggregator::Add, Formatter::Times);
pub const TIME_RATIO: Event =
    Event::new(4, "Time ratio", 0.0, Aggregator::Add, Formatter::Percentage);
pub const TOTAL_TIME_RATIO: Event =
    Event::new(5, "Total time ratio", 0.0, Aggregator::Fail, Formatter::Percentage);

impl Event {
    const fn new(
        key: u8,
        name: &'static str,
        null: f64,
        aggregator: Aggregator,
        formatter: Formatter,
    ) -> Self {
        Self {
            key,
            name,
            null,
            aggregator,
            formatter,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn null(&self) -> f64 {
        self.null
    }

    pub fn aggregate(&self, a: f64, b: f64) -> GraphResult<f64> {
        match self.aggregator {
            Aggregator::Add => Ok(a + b),
            Aggregator::Fail => Err(GraphError::NonAggregable { event: self.name }),
        }
    }

    pub fn format(&self, value: f64) -> String {
        match self.formatter {
            Formatter::Times => format!("{}\u{d7}", value.max(0.0).round() as u64),
            Formatter::Percentage => format!("{:.2}%", value * 100.0),
        }
    }
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key)
    }
}

impl std::hash::Hash for Event {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<Event {} '{}'>", self.key, self.name)
    }
}

/// Metric values owned by one function, call, cycle or profile.
///
/// A metric is present only if it was set explicitly; reading an absent one
/// is an error rather than an implicit zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Events {
    values: BTreeMap<Event, f64>,
}

impl Events {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, event: Event) -> bool {
        self.values.contains_key(&event)
    }

    pub fn get(&self, event: Event) -> GraphResult<f64> {
        self.values
            .get(&event)
            .copied()
            .ok_or(GraphError::UndefinedEvent { event: event.name })
    }

    /// Sets a metric; `None` removes it.
    pub fn set(&mut self, event: Event, value: Option<f64>) {
        match value {
            Some(v) => {
                self.values.insert(event, v);
            }
            None => {
                self.values.remove(&event);
            }
        }
    }

    pub fn insert(&mut self, event: Event, value: f64) {
        self.values.insert(event, value);
    }

    /// Plain addition, starting from the metric's null when absent.
    pub fn increment(&mut self, event: Event, value: f64) {
        *self.values.entry(event).or_insert(event.null) += value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Event, f64)> + '_ {
        self.values.iter().map(|(e, v)| (*e, *v))
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[derive(Serialize)]
struct EventValue<'a> {
    name: &'a str,
    value: f64,
    formatted: String,
}

impl Serialize for Events {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.values.len()))?;
        for (event, value) in &self.values {
            seq.serialize_element(&EventValue {
                name: event.name,
                value: *value,
                formatted: event.format(*value),
            })?;
        }
        seq.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_events_are_distinct() {
        assert_eq!(SAMPLES.name(), SAMPLES2.name());
        assert_ne!(SAMPLES, SAMPLES2);

        let mut events = Events::new();
        events.insert(SAMPLES, 3.0);
        assert!(events.contains(SAMPLES));
        assert!(!events.contains(SAMPLES2));
    }

    #[test]
    fn reading_unset_event_is_an_error() {
        let events = Events::new();
        let err = events.get(TOTAL_TIME_RATIO).expect_err("unset");
        assert!(err.is_undefined_event());
    }

    #[test]
    fn setting_none_removes_the_value() {
        let mut events = Events::new();
        events.set(CALLS, Some(2.0));
        assert_eq!(events.get(CALLS).expect("set"), 2.0);
        events.set(CALLS, None);
        assert!(!events.contains(CALLS));
        assert!(events.is_empty());
    }

    #[test]
    fn fail_aggregator_refuses_to_merge() {
        assert_eq!(SAMPLES.aggregate(1.0, 2.0).expect("add"), 3.0);
        match TOTAL_TIME_RATIO.aggregate(0.1, 0.2) {
            Err(GraphError::NonAggregable { event }) => assert_eq!(event, "Total time ratio"),
            other => panic!("expected non-aggregable, got {other:?}"),
        }
    }

    #[test]
    fn increment_starts_from_null() {
        let mut events = Events::new();
        events.increment(TOTAL_TIME_RATIO, 0.25);
        events.increment(TOTAL_TIME_RATIO, 0.5);
        assert_eq!(events.get(TOTAL_TIME_RATIO).expect("set"), 0.75);
    }

    #[test]
    fn formatting_follows_the_event_kind() {
        assert_eq!(CALLS.format(12.0), "12\u{d7}");
        assert_eq!(TIME_RATIO.format(0.1234), "12.34%");
    }

    #[test]
    fn serializes_as_named_values() {
        let mut events = Events::new();
        events.insert(TIME_RATIO, 0.5);
        let json = serde_json::to_value(&events).expect("json");
        assert_eq!(json[0]["name"], "Time ratio");
        assert_eq!(json[0]["formatted"], "50.00%");
    }
}
