use std::collections::VecDeque;

use arena_proto::EventRecord;
use serde_json::Value;

pub const DEFAULT_EVENT_LOG_CAPACITY: usize = 20;

/// Events delivered by one message, kept in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventBatch {
    records: Vec<EventRecord>,
}

impl EventBatch {
    pub fn new(records: Vec<EventRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lines(&self) -> impl Iterator<Item = String> + '_ {
        self.records.iter().map(event_text)
    }
}

/// Display text for a record: strings verbatim, anything else as compact JSON.
pub fn event_text(record: &EventRecord) -> String {
    match record {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

/// Most-recent-first log of event batches.
#[derive(Debug, Clone, PartialEq)]
pub struct EventLog {
    batches: VecDeque<EventBatch>,
    capacity: usize,
}

impl Default for EventLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_EVENT_LOG_CAPACITY)
    }
}

impl EventLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            batches: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, records: Vec<EventRecord>) {
        self.batches.push_front(EventBatch::new(records));
        while self.batches.len() > self.capacity {
            self.batches.pop_back();
        }
    }

    pub fn batches(&self) -> impl Iterator<Item = &EventBatch> {
        self.batches.iter()
    }

    pub fn latest(&self) -> Option<&EventBatch> {
        self.batches.front()
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
