//! Event bus for inter-system communication.
//!
//! The bus is synchronous: [`EventBus::publish`] runs every handler of the
//! event's topic before returning, in subscription order. Each publish works on
//! a snapshot of the subscriber list, so handlers may subscribe, unsubscribe or
//! publish re-entrantly. A handler that returns an error or panics is logged
//! and skipped; the remaining handlers still run.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{trace, warn};

use crate::input::Direction;
use crate::progress::{OxygenLevel, ProgressState};

/// Event types that can be sent through the event bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    /// A move shifted at least one tile
    Move {
        /// Direction of the move
        direction: Direction,
    },
    /// At least one merge happened during the move
    Merge {
        /// Highest merged value of the move
        value: u32,
    },
    /// A merge reached a power-of-two milestone
    Milestone {
        /// Merged value
        value: u32,
    },
    /// The win tile was created for the first time
    Won {
        /// Score at the time of winning
        score: u64,
    },
    /// No legal move remains
    Over {
        /// Final score
        score: u64,
    },
    /// Board totals after a move, setup or restore
    Progression(ProgressState),
    /// The oxygen gauge changed level
    OxygenChanged {
        /// Previous level
        from: OxygenLevel,
        /// New level
        to: OxygenLevel,
    },
    /// A new game was started by the player
    Restart,
    /// The player chose to continue after winning
    KeepPlaying,
}

impl GameEvent {
    /// Topic under which this event is delivered.
    #[must_use]
    pub const fn topic(&self) -> EventTopic {
        match self {
            Self::Move { .. } => EventTopic::Move,
            Self::Merge { .. } => EventTopic::Merge,
            Self::Milestone { .. } => EventTopic::Milestone,
            Self::Won { .. } => EventTopic::Won,
            Self::Over { .. } => EventTopic::Over,
            Self::Progression(_) => EventTopic::Progression,
            Self::OxygenChanged { .. } => EventTopic::OxygenChanged,
            Self::Restart => EventTopic::Restart,
            Self::KeepPlaying => EventTopic::KeepPlaying,
        }
    }
}

/// Subscription key of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EventTopic {
    /// [`GameEvent::Move`]
    Move,
    /// [`GameEvent::Merge`]
    Merge,
    /// [`GameEvent::Milestone`]
    Milestone,
    /// [`GameEvent::Won`]
    Won,
    /// [`GameEvent::Over`]
    Over,
    /// [`GameEvent::Progression`]
    Progression,
    /// [`GameEvent::OxygenChanged`]
    OxygenChanged,
    /// [`GameEvent::Restart`]
    Restart,
    /// [`GameEvent::KeepPlaying`]
    KeepPlaying,
}

impl EventTopic {
    /// Every topic.
    pub const ALL: [Self; 9] = [
        Self::Move,
        Self::Merge,
        Self::Milestone,
        Self::Won,
        Self::Over,
        Self::Progression,
        Self::OxygenChanged,
        Self::Restart,
        Self::KeepPlaying,
    ];
}

/// Failure reported by an event handler.
#[derive(Debug, Error)]
#[error("event handler failed: {0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    /// Creates a handler error from any message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Result returned by event handlers.
pub type HandlerResult = Result<(), HandlerError>;

type Handler = Rc<dyn Fn(&GameEvent) -> HandlerResult>;

struct Subscriber {
    id: u64,
    handler: Handler,
    /// Set for `subscribe_once` handlers; flips when the handler has fired.
    once: Option<Rc<Cell<bool>>>,
}

#[derive(Default)]
struct Registry {
    topics: BTreeMap<EventTopic, Vec<Subscriber>>,
    next_id: u64,
}

impl Registry {
    fn add(&mut self, topic: EventTopic, handler: Handler, once: bool) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.topics.entry(topic).or_default().push(Subscriber {
            id,
            handler,
            once: once.then(|| Rc::new(Cell::new(false))),
        });
        id
    }

    fn remove(&mut self, topic: EventTopic, id: u64) -> bool {
        let Some(list) = self.topics.get_mut(&topic) else {
            return false;
        };
        let before = list.len();
        list.retain(|sub| sub.id != id);
        list.len() != before
    }
}

/// Handle returned by [`EventBus::subscribe`]; acts as the unsubscribe function.
///
/// Dropping the handle does not unsubscribe.
#[derive(Debug, Clone)]
#[must_use = "keep the subscription to be able to unsubscribe"]
pub struct Subscription {
    topic: EventTopic,
    id: u64,
    registry: Weak<RefCell<Registry>>,
}

impl Subscription {
    /// Topic this subscription listens to.
    pub const fn topic(&self) -> EventTopic {
        self.topic
    }

    /// Removes the handler from the bus.
    ///
    /// Returns `false` if it was already gone (fired once, cleared, or the bus
    /// was dropped).
    pub fn unsubscribe(self) -> bool {
        self.registry
            .upgrade()
            .is_some_and(|registry| registry.borrow_mut().remove(self.topic, self.id))
    }
}

/// Synchronous publish/subscribe hub.
///
/// Cloning the bus yields another handle to the same subscriber registry.
#[derive(Clone, Default)]
pub struct EventBus {
    registry: Rc<RefCell<Registry>>,
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

impl EventBus {
    /// Creates an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for a topic.
    pub fn subscribe<F>(&self, topic: EventTopic, handler: F) -> Subscription
    where
        F: Fn(&GameEvent) -> HandlerResult + 'static,
    {
        let id = self.registry.borrow_mut().add(topic, Rc::new(handler), false);
        self.subscription(topic, id)
    }

    /// Registers a handler that is removed after its first invocation.
    pub fn subscribe_once<F>(&self, topic: EventTopic, handler: F) -> Subscription
    where
        F: Fn(&GameEvent) -> HandlerResult + 'static,
    {
        let id = self.registry.borrow_mut().add(topic, Rc::new(handler), true);
        self.subscription(topic, id)
    }

    /// Delivers an event to every handler subscribed to its topic.
    ///
    /// Returns the number of handlers that completed successfully.
    pub fn publish(&self, event: &GameEvent) -> usize {
        let topic = event.topic();

        // Snapshot, then release the borrow so handlers can touch the bus.
        let snapshot: Vec<(u64, Handler, Option<Rc<Cell<bool>>>)> = {
            let registry = self.registry.borrow();
            match registry.topics.get(&topic) {
                Some(list) => list
                    .iter()
                    .map(|sub| (sub.id, Rc::clone(&sub.handler), sub.once.clone()))
                    .collect(),
                None => return 0,
            }
        };

        trace!(?topic, handlers = snapshot.len(), "Publishing event");

        let mut delivered = 0;
        for (id, handler, once) in snapshot {
            if let Some(fired) = &once {
                if fired.replace(true) {
                    continue;
                }
                self.registry.borrow_mut().remove(topic, id);
            }

            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => warn!(?topic, subscriber = id, "Event handler error: {e}"),
                Err(payload) => warn!(
                    ?topic,
                    subscriber = id,
                    "Event handler panicked: {}",
                    panic_message(payload.as_ref())
                ),
            }
        }
        delivered
    }

    /// Removes every subscription on every topic.
    pub fn clear(&self) {
        self.registry.borrow_mut().topics.clear();
    }

    /// Number of handlers subscribed to a topic.
    #[must_use]
    pub fn topic_subscriber_count(&self, topic: EventTopic) -> usize {
        self.registry.borrow().topics.get(&topic).map_or(0, Vec::len)
    }

    /// Total number of handlers across topics.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.registry.borrow().topics.values().map(Vec::len).sum()
    }

    fn subscription(&self, topic: EventTopic, id: u64) -> Subscription {
        Subscription {
            topic,
            id,
            registry: Rc::downgrade(&self.registry),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Handler-side helper that records every event it receives.
///
/// Used by tests and by the engine's debug panel to inspect traffic on the
/// bus. A bounded recorder keeps only the most recent events.
#[derive(Debug, Clone)]
pub struct EventRecorder {
    events: Rc<RefCell<VecDeque<GameEvent>>>,
    capacity: usize,
}

impl Default for EventRecorder {
    fn default() -> Self {
        Self::with_capacity(usize::MAX)
    }
}

impl EventRecorder {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Rc::new(RefCell::new(VecDeque::new())),
            capacity: capacity.max(1),
        }
    }

    /// Creates a recorder subscribed to every topic of `bus`.
    #[must_use]
    pub fn attach(bus: &EventBus) -> Self {
        Self::attach_bounded(bus, usize::MAX)
    }

    /// Like [`EventRecorder::attach`], but drops the oldest event once
    /// `capacity` events are held.
    #[must_use]
    pub fn attach_bounded(bus: &EventBus, capacity: usize) -> Self {
        let recorder = Self::with_capacity(capacity);
        for topic in EventTopic::ALL {
            let events = Rc::clone(&recorder.events);
            let capacity = recorder.capacity;
            let _ = bus.subscribe(topic, move |event| {
                let mut events = events.borrow_mut();
                if events.len() >= capacity {
                    events.pop_front();
                }
                events.push_back(event.clone());
                Ok(())
            });
        }
        recorder
    }

    /// Events recorded so far, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<GameEvent> {
        self.events.borrow().iter().cloned().collect()
    }

    /// Recorded events of one topic.
    #[must_use]
    pub fn of_topic(&self, topic: EventTopic) -> Vec<GameEvent> {
        self.events
            .borrow()
            .iter()
            .filter(|e| e.topic() == topic)
            .cloned()
            .collect()
    }

    /// Forgets recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(bus: &EventBus, topic: EventTopic) -> (Rc<Cell<u32>>, Subscription) {
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        let sub = bus.subscribe(topic, move |_| {
            inner.set(inner.get() + 1);
            Ok(())
        });
        (count, sub)
    }

    #[test]
    fn test_publish_reaches_topic_only() {
        let bus = EventBus::new();
        let (moves, _m) = counter(&bus, EventTopic::Move);
        let (merges, _g) = counter(&bus, EventTopic::Merge);

        bus.publish(&GameEvent::Move {
            direction: Direction::Left,
        });

        assert_eq!(moves.get(), 1);
        assert_eq!(merges.get(), 0);
    }

    #[test]
    fn test_handlers_run_in_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        for i in 0..3 {
            let order = Rc::clone(&order);
            let _ = bus.subscribe(EventTopic::Merge, move |_| {
                order.borrow_mut().push(i);
                Ok(())
            });
        }

        bus.publish(&GameEvent::Merge { value: 4 });
        assert_eq!(*order.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_failing_handler_does_not_stop_delivery() {
        let bus = EventBus::new();
        let _ = bus.subscribe(EventTopic::Merge, |_| Err(HandlerError::new("boom")));
        let _ = bus.subscribe(EventTopic::Merge, |_| panic!("handler panic"));
        let (count, _s) = counter(&bus, EventTopic::Merge);

        let delivered = bus.publish(&GameEvent::Merge { value: 8 });

        assert_eq!(count.get(), 1);
        assert_eq!(delivered, 1);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let (count, sub) = counter(&bus, EventTopic::Won);

        assert!(sub.unsubscribe());
        bus.publish(&GameEvent::Won { score: 10 });

        assert_eq!(count.get(), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_subscribe_once_fires_once() {
        let bus = EventBus::new();
        let count = Rc::new(Cell::new(0));
        let inner = Rc::clone(&count);
        let sub = bus.subscribe_once(EventTopic::Over, move |_| {
            inner.set(inner.get() + 1);
            Ok(())
        });

        bus.publish(&GameEvent::Over { score: 1 });
        bus.publish(&GameEvent::Over { score: 2 });

        assert_eq!(count.get(), 1);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_subscribe_during_publish_not_invoked_same_pass() {
        let bus = EventBus::new();
        let late_calls = Rc::new(Cell::new(0));

        let bus_handle = bus.clone();
        let late = Rc::clone(&late_calls);
        let _ = bus.subscribe(EventTopic::Restart, move |_| {
            let late = Rc::clone(&late);
            let _ = bus_handle.subscribe(EventTopic::Restart, move |_| {
                late.set(late.get() + 1);
                Ok(())
            });
            Ok(())
        });

        bus.publish(&GameEvent::Restart);
        assert_eq!(late_calls.get(), 0);

        bus.publish(&GameEvent::Restart);
        assert_eq!(late_calls.get(), 1);
    }

    #[test]
    fn test_reentrant_publish() {
        let bus = EventBus::new();
        let (merges, _s) = counter(&bus, EventTopic::Merge);

        let bus_handle = bus.clone();
        let _ = bus.subscribe(EventTopic::Move, move |_| {
            bus_handle.publish(&GameEvent::Merge { value: 4 });
            Ok(())
        });

        bus.publish(&GameEvent::Move {
            direction: Direction::Up,
        });
        assert_eq!(merges.get(), 1);
    }

    #[test]
    fn test_clear_removes_everything() {
        let bus = EventBus::new();
        let (count, sub) = counter(&bus, EventTopic::Merge);
        bus.clear();

        bus.publish(&GameEvent::Merge { value: 2 });
        assert_eq!(count.get(), 0);
        assert!(!sub.unsubscribe());
    }

    #[test]
    fn test_recorder_filters_topics() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach(&bus);

        bus.publish(&GameEvent::Merge { value: 16 });
        bus.publish(&GameEvent::Restart);

        assert_eq!(recorder.events().len(), 2);
        assert_eq!(
            recorder.of_topic(EventTopic::Merge),
            vec![GameEvent::Merge { value: 16 }]
        );
    }

    #[test]
    fn test_bounded_recorder_keeps_latest() {
        let bus = EventBus::new();
        let recorder = EventRecorder::attach_bounded(&bus, 2);

        for value in [2, 4, 8] {
            bus.publish(&GameEvent::Merge { value });
        }

        assert_eq!(
            recorder.events(),
            vec![GameEvent::Merge { value: 4 }, GameEvent::Merge { value: 8 }]
        );
    }
}
