//! Per-session event fan-out and bounded per-task event history.
//!
//! Fan-out is non-blocking: a slow or stalled subscriber never backs up the
//! state machine. Each subscriber has its own bounded channel and a full
//! channel just drops the event for that subscriber; the subscriber is
//! expected to reconcile via `TaskManager::list_events`.

use std::collections::{HashMap, VecDeque};

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::types::Event;

/// Events delivered to a subscriber arrive on this channel.
pub const SUBSCRIBER_BUFFER: usize = 256;

pub type EventStream = ReceiverStream<Event>;

pub struct EventBus {
    subscribers: HashMap<String, HashMap<u64, mpsc::Sender<Event>>>,
    next_subscriber_id: u64,
    history: HashMap<String, VecDeque<Event>>,
    history_max: usize,
}

impl EventBus {
    pub fn new(history_max: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            next_subscriber_id: 0,
            history: HashMap::new(),
            history_max,
        }
    }

    /// Registers a new subscriber for `session_id` and returns its id (used
    /// to unsubscribe later) and its receiving end.
    pub fn subscribe(&mut self, session_id: &str) -> (u64, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_subscriber_id;
        self.next_subscriber_id += 1;
        self.subscribers
            .entry(session_id.to_string())
            .or_default()
            .insert(id, tx);
        (id, rx)
    }

    pub fn unsubscribe(&mut self, session_id: &str, subscriber_id: u64) {
        if let Some(subs) = self.subscribers.get_mut(session_id) {
            subs.remove(&subscriber_id);
            if subs.is_empty() {
                self.subscribers.remove(session_id);
            }
        }
    }

    /// Appends `event` to its task's history (if it names one) and fans it
    /// out to every live subscriber of its session. Never blocks.
    pub fn publish(&mut self, event: Event) {
        if !event.task_id.is_empty() {
            let history = self.history.entry(event.task_id.clone()).or_default();
            history.push_back(event.clone());
            while history.len() > self.history_max {
                history.pop_front();
            }
        }

        if let Some(subs) = self.subscribers.get(&event.session_id) {
            for tx in subs.values() {
                let _ = tx.try_send(event.clone());
            }
        }
    }

    pub fn list_events(&self, task_id: &str, limit: i64) -> Vec<Event> {
        let Some(history) = self.history.get(task_id) else {
            return Vec::new();
        };
        if limit > 0 && (limit as usize) < history.len() {
            history
                .iter()
                .skip(history.len() - limit as usize)
                .cloned()
                .collect()
        } else {
            history.iter().cloned().collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskLevel, TaskStatus};
    use chrono::Utc;

    fn event(session_id: &str, task_id: &str) -> Event {
        Event {
            event_type: crate::types::EventType::TaskStepLog,
            session_id: session_id.to_string(),
            task_id: task_id.to_string(),
            step_id: None,
            step_seq: None,
            step_title: None,
            status: TaskStatus::Running,
            risk: RiskLevel::Low,
            requires_approval: false,
            queued_position: None,
            text_delta: Some("hi".to_string()),
            approval_prompt: None,
            result: None,
            code: None,
            detail: None,
            plan_graph: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn fans_out_to_subscribers_of_the_right_session() {
        let mut bus = EventBus::new(10);
        let (_id_a, mut rx_a) = bus.subscribe("s1");
        let (_id_b, mut rx_b) = bus.subscribe("s2");

        bus.publish(event("s1", "t1"));

        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let mut bus = EventBus::new(10);
        let (id, mut rx) = bus.subscribe("s1");
        bus.unsubscribe("s1", id);
        bus.publish(event("s1", "t1"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn history_is_bounded_and_evicts_oldest() {
        let mut bus = EventBus::new(2);
        bus.publish(event("s1", "t1"));
        bus.publish(event("s1", "t1"));
        bus.publish(event("s1", "t1"));
        assert_eq!(bus.list_events("t1", 0).len(), 2);
    }

    #[test]
    fn list_events_respects_limit() {
        let mut bus = EventBus::new(10);
        for _ in 0..5 {
            bus.publish(event("s1", "t1"));
        }
        assert_eq!(bus.list_events("t1", 3).len(), 3);
        assert_eq!(bus.list_events("t1", 0).len(), 5);
        assert!(bus.list_events("missing", 0).is_empty());
    }
}
