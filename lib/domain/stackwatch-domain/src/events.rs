use std::collections::VecDeque;

use serde::Serialize;

pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub level: EventLevel,
    pub message: String,
    pub timestamp_ms: i64,
}

impl Event {
    pub fn new(level: EventLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp_ms: now_millis(),
        }
    }
}

/// Bounded activity log; oldest entries fall off first.
#[derive(Debug, Clone)]
pub struct EventBus {
    events: VecDeque<Event>,
    capacity: usize,
}

impl EventBus {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, event: Event) {
        if self.events.len() == self.capacity {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    pub fn latest(&self) -> Option<&Event> {
        self.events.back()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_capacity(200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_oldest_when_full() {
        let mut bus = EventBus::with_capacity(2);
        bus.push(Event::new(EventLevel::Info, "one"));
        bus.push(Event::new(EventLevel::Info, "two"));
        bus.push(Event::new(EventLevel::Warn, "three"));
        let messages: Vec<_> = bus.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["two", "three"]);
        assert_eq!(bus.latest().map(|e| e.level), Some(EventLevel::Warn));
    }
}
