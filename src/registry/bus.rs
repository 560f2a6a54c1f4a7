//! FIFO message bus shared by the registry and its agents.
//!
//! Messages are delivered one at a time in arrival order. Draining is
//! single-flight: the `draining` flag is taken with a compare-exchange, so a
//! `route` call and the periodic sweeper can never run two drain loops at
//! once. Messages sent while a drain is running are picked up by that drain.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::agents::Agent;
use crate::types::{AgentMessage, AgentRole, BROADCAST_RECIPIENT};

/// Releases the single-flight flag even if the drain future is dropped
/// mid-delivery.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug)]
pub struct MessageBus {
    agents: Arc<DashMap<String, Arc<Agent>>>,
    queue: Mutex<VecDeque<AgentMessage>>,
    draining: AtomicBool,
    delivered: AtomicU64,
    failed: AtomicU64,
}

impl MessageBus {
    pub fn new(agents: Arc<DashMap<String, Arc<Agent>>>) -> Self {
        Self {
            agents,
            queue: Mutex::new(VecDeque::new()),
            draining: AtomicBool::new(false),
            delivered: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    /// Queue a message without draining.
    pub fn enqueue(&self, message: AgentMessage) {
        self.queue.lock().push_back(message);
    }

    /// Queue a message and drain unless a drain is already running.
    pub async fn route(&self, message: AgentMessage) {
        log::debug!(
            "Routing {:?} message {} from '{}' to '{}'",
            message.message_type, message.id, message.from_agent, message.to_agent,
        );
        self.enqueue(message);
        self.drain().await;
    }

    /// Deliver queued messages until the queue is empty.
    ///
    /// Returns the number of messages this call handled; `0` when another
    /// drain already owns the queue.
    pub async fn drain(&self) -> usize {
        let mut handled = 0;
        loop {
            if self
                .draining
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
            {
                return handled;
            }
            let guard = DrainGuard(&self.draining);

            while let Some(message) = self.pop() {
                self.deliver(message).await;
                handled += 1;
            }
            drop(guard);

            // A message may have landed between the last pop and the release.
            if self.queue.lock().is_empty() {
                return handled;
            }
        }
    }

    fn pop(&self) -> Option<AgentMessage> {
        self.queue.lock().pop_front()
    }

    async fn deliver(&self, message: AgentMessage) {
        let recipients: Vec<Arc<Agent>> = if message.to_agent == BROADCAST_RECIPIENT {
            self.agents
                .iter()
                .filter(|entry| entry.key() != &message.from_agent)
                .map(|entry| entry.value().clone())
                .collect()
        } else {
            match self.agents.get(&message.to_agent) {
                Some(agent) => vec![agent.value().clone()],
                None => {
                    self.failed.fetch_add(1, Ordering::Relaxed);
                    log::error!(
                        "Cannot deliver message {} from '{}': agent '{}' not found",
                        message.id, message.from_agent, message.to_agent,
                    );
                    return;
                }
            }
        };

        for agent in recipients {
            let mut copy = message.clone();
            copy.to_agent = agent.id();
            let response = agent.handle_message(copy).await;
            if response.success {
                self.delivered.fetch_add(1, Ordering::Relaxed);
            } else {
                self.failed.fetch_add(1, Ordering::Relaxed);
                log::error!(
                    "Agent '{}' failed to handle message {}: {}",
                    agent.id(),
                    message.id,
                    response.error.as_deref().unwrap_or("unknown error"),
                );
            }
        }
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::Acquire)
    }

    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Ids of agents with the given role, sorted.
    pub fn agents_with_role(&self, role: &AgentRole) -> Vec<String> {
        let mut ids: Vec<String> = self
            .agents
            .iter()
            .filter(|entry| &entry.value().role() == role)
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use serde_json::json;

    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::agents::behavior::test_support::{Script, ScriptedBehavior};
    use crate::agents::{AgentContext, RoleBehavior};
    use crate::error::AgentError;
    use crate::memory::NullMemoryStore;
    use crate::types::{AgentConfig, AgentResponse, MessageType, TaskAssignment};

    fn bus_with(ids: &[&str]) -> (Arc<MessageBus>, Arc<ScriptedBehavior>) {
        let behavior = Arc::new(ScriptedBehavior::new(Script::Succeed(json!(1))));
        let agents = Arc::new(DashMap::new());
        for id in ids {
            let agent = Agent::new(
                AgentConfig::new(*id, AgentRole::CodeAnalyst, *id),
                behavior.clone(),
                Arc::new(NullMemoryStore),
            );
            agents.insert(id.to_string(), Arc::new(agent));
        }
        (Arc::new(MessageBus::new(agents)), behavior)
    }

    #[tokio::test]
    async fn test_route_delivers_in_order() {
        let (bus, behavior) = bus_with(&["a", "b"]);
        bus.enqueue(AgentMessage::new("a", "b", MessageType::Notification, json!(1)));
        bus.route(AgentMessage::new("b", "a", MessageType::Notification, json!(2))).await;

        assert_eq!(bus.pending(), 0);
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 2);
        assert_eq!(bus.delivered(), 2);
        assert!(!bus.is_draining());
    }

    #[tokio::test]
    async fn test_unknown_recipient_does_not_stop_drain() {
        let (bus, behavior) = bus_with(&["a"]);
        bus.enqueue(AgentMessage::new("a", "ghost", MessageType::Notification, json!({})));
        bus.enqueue(AgentMessage::new("x", "a", MessageType::Notification, json!({})));

        assert_eq!(bus.drain().await, 2);
        assert_eq!(bus.failed(), 1);
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_broadcast_skips_sender() {
        let (bus, behavior) = bus_with(&["a", "b", "c"]);
        bus.route(AgentMessage::new("a", BROADCAST_RECIPIENT, MessageType::Broadcast, json!({}))).await;
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_drain_is_single_flight() {
        let (bus, behavior) = bus_with(&["a"]);
        bus.draining.store(true, Ordering::SeqCst);
        bus.route(AgentMessage::new("x", "a", MessageType::Notification, json!({}))).await;

        // Another drain "owns" the queue, so nothing was delivered.
        assert_eq!(bus.pending(), 1);
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 0);

        bus.draining.store(false, Ordering::SeqCst);
        assert_eq!(bus.drain().await, 1);
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_concurrent_drains_deliver_each_message_once() {
        let (bus, behavior) = bus_with(&["a"]);
        for i in 0..50 {
            bus.enqueue(AgentMessage::new("x", "a", MessageType::Notification, json!(i)));
        }
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let bus = bus.clone();
                tokio::spawn(async move { bus.drain().await })
            })
            .collect();
        let mut total = 0;
        for h in handles {
            total += h.await.unwrap();
        }
        assert_eq!(total, 50);
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 50);
    }

    struct SlowListener;

    #[async_trait]
    impl RoleBehavior for SlowListener {
        async fn process_task(
            &self,
            _ctx: &AgentContext,
            _task: &TaskAssignment,
        ) -> Result<AgentResponse, AgentError> {
            Ok(AgentResponse::success(json!(null)))
        }

        async fn handle_message(
            &self,
            _ctx: &AgentContext,
            _message: &AgentMessage,
        ) -> Result<AgentResponse, AgentError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(AgentResponse::success(json!(null)))
        }
    }

    #[tokio::test]
    async fn test_cancelled_drain_releases_queue() {
        let (bus, behavior) = bus_with(&["a"]);
        let slow = Agent::new(
            AgentConfig::new("slow", AgentRole::Developer, "slow"),
            Arc::new(SlowListener),
            Arc::new(NullMemoryStore),
        );
        bus.agents.insert("slow".to_string(), Arc::new(slow));

        let cancelled = tokio::time::timeout(
            Duration::from_millis(20),
            bus.route(AgentMessage::new("x", "slow", MessageType::Notification, json!({}))),
        )
        .await;
        assert!(cancelled.is_err());
        assert!(!bus.is_draining());

        bus.route(AgentMessage::new("x", "a", MessageType::Notification, json!({}))).await;
        assert_eq!(bus.pending(), 0);
        assert_eq!(behavior.messages.load(Ordering::SeqCst), 1);
        assert_eq!(bus.delivered(), 1);
    }

    #[test]
    fn test_agents_with_role() {
        let (bus, _) = bus_with(&["b", "a"]);
        assert_eq!(bus.agents_with_role(&AgentRole::CodeAnalyst), vec!["a", "b"]);
        assert!(bus.agents_with_role(&AgentRole::Developer).is_empty());
    }
}
