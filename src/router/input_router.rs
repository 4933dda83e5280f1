//! Broadcast registry for pin consumers
//!
//! Every registered consumer receives every sample; picking out the pins it
//! cares about is the consumer's own job. The router only keeps weak
//! references, so a consumer that is dropped without unregistering is skipped
//! during delivery instead of being kept alive.

use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError, Weak};
use tracing::{debug, info, warn};

use crate::input::pin::{PinIdentifier, PinSample};
use crate::router::dispatcher::SerialLineDispatcher;

/// Anything that wants pin readings.
///
/// Implementations must not panic for any value in `[0.0, 1.0]`. Delivery
/// happens on the broadcasting thread, so state behind `&self` needs interior
/// mutability.
pub trait InputConsumer: Send + Sync {
    fn process_input(&self, pin: PinIdentifier, value: f32);

    /// Name used in diagnostics
    fn consumer_name(&self) -> &str {
        "unnamed consumer"
    }
}

pub struct InputRouter {
    consumers: Mutex<Vec<Weak<dyn InputConsumer>>>,
    dispatcher: OnceLock<Arc<SerialLineDispatcher>>,
    self_ref: Weak<InputRouter>,
}

impl InputRouter {
    pub fn new() -> Arc<Self> {
        info!("Creating input router");
        Arc::new_cyclic(|self_ref| Self {
            consumers: Mutex::new(Vec::new()),
            dispatcher: OnceLock::new(),
            self_ref: self_ref.clone(),
        })
    }

    /// Adds a consumer. Registering the same consumer twice is a no-op.
    ///
    /// The first registration also brings up the router's line dispatcher.
    pub fn register<C: InputConsumer + 'static>(&self, consumer: &Arc<C>) -> bool {
        let consumer: Arc<dyn InputConsumer> = consumer.clone();
        self.register_dyn(&consumer)
    }

    /// [`register`](Self::register) for consumers already behind a trait object
    pub fn register_dyn(&self, consumer: &Arc<dyn InputConsumer>) -> bool {
        let weak = Arc::downgrade(consumer);

        let added = {
            let mut consumers = self.lock_consumers();
            if consumers.iter().any(|entry| Weak::ptr_eq(entry, &weak)) {
                false
            } else {
                consumers.push(weak);
                true
            }
        };

        if added {
            debug!("Registered consumer '{}'", consumer.consumer_name());
        } else {
            warn!(
                "Consumer '{}' is already registered, ignoring",
                consumer.consumer_name()
            );
        }

        self.dispatcher();
        added
    }

    /// Removes a consumer. Removing an unknown consumer is a no-op.
    pub fn unregister<C: InputConsumer + 'static>(&self, consumer: &Arc<C>) -> bool {
        let consumer: Arc<dyn InputConsumer> = consumer.clone();
        self.unregister_dyn(&consumer)
    }

    pub fn unregister_dyn(&self, consumer: &Arc<dyn InputConsumer>) -> bool {
        let weak = Arc::downgrade(consumer);

        let removed = {
            let mut consumers = self.lock_consumers();
            match consumers.iter().position(|entry| Weak::ptr_eq(entry, &weak)) {
                Some(index) => {
                    consumers.remove(index);
                    true
                }
                None => false,
            }
        };

        if removed {
            debug!("Unregistered consumer '{}'", consumer.consumer_name());
        } else {
            warn!(
                "Consumer '{}' was not registered, nothing to remove",
                consumer.consumer_name()
            );
        }
        removed
    }

    /// Delivers a sample to every registered consumer in registration order.
    ///
    /// Iterates over a copy of the registry taken under the lock, so consumers
    /// may register or unregister from inside `process_input`. Returns the
    /// number of consumers that received the sample.
    pub fn broadcast(&self, sample: PinSample) -> usize {
        let snapshot: Vec<Weak<dyn InputConsumer>> = self.lock_consumers().clone();

        let mut delivered = 0;
        for entry in &snapshot {
            match entry.upgrade() {
                Some(consumer) => {
                    consumer.process_input(sample.pin, sample.value);
                    delivered += 1;
                }
                None => {
                    warn!(
                        "Skipping dropped consumer while broadcasting {}={:.3}, it was never unregistered",
                        sample.pin, sample.value
                    );
                }
            }
        }
        delivered
    }

    /// The router's single line dispatcher, created on first use.
    pub fn dispatcher(&self) -> Arc<SerialLineDispatcher> {
        self.dispatcher
            .get_or_init(|| {
                info!("Starting serial line dispatcher");
                Arc::new(SerialLineDispatcher::new(self.self_ref.clone()))
            })
            .clone()
    }

    pub fn has_dispatcher(&self) -> bool {
        self.dispatcher.get().is_some()
    }

    pub fn contains<C: InputConsumer + 'static>(&self, consumer: &Arc<C>) -> bool {
        let consumer: Arc<dyn InputConsumer> = consumer.clone();
        self.contains_dyn(&consumer)
    }

    pub fn contains_dyn(&self, consumer: &Arc<dyn InputConsumer>) -> bool {
        let weak = Arc::downgrade(consumer);
        self.lock_consumers()
            .iter()
            .any(|entry| Weak::ptr_eq(entry, &weak))
    }

    /// Number of registry entries, including dropped consumers.
    pub fn len(&self) -> usize {
        self.lock_consumers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock_consumers().is_empty()
    }

    fn lock_consumers(&self) -> MutexGuard<'_, Vec<Weak<dyn InputConsumer>>> {
        // A panicking consumer never runs under this lock, the Vec stays consistent.
        self.consumers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: String,
        seen: Mutex<Vec<PinSample>>,
    }

    impl Recorder {
        fn new(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn seen(&self) -> Vec<PinSample> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl InputConsumer for Recorder {
        fn process_input(&self, pin: PinIdentifier, value: f32) {
            self.seen.lock().unwrap().push(PinSample { pin, value });
        }

        fn consumer_name(&self) -> &str {
            &self.name
        }
    }

    /// Unregisters itself on the first sample it receives.
    struct OneShot {
        router: Weak<InputRouter>,
        me: Mutex<Weak<OneShot>>,
        calls: Mutex<usize>,
    }

    impl InputConsumer for OneShot {
        fn process_input(&self, _pin: PinIdentifier, _value: f32) {
            *self.calls.lock().unwrap() += 1;
            let me = self.me.lock().unwrap().upgrade();
            if let (Some(router), Some(me)) = (self.router.upgrade(), me) {
                router.unregister(&me);
            }
        }
    }

    fn sample(value: f32) -> PinSample {
        PinSample::new(PinIdentifier::D4, value)
    }

    #[test]
    fn duplicate_registration_is_ignored() {
        let router = InputRouter::new();
        let recorder = Recorder::new("a");

        assert!(router.register(&recorder));
        assert!(!router.register(&recorder));
        assert_eq!(router.len(), 1);

        router.broadcast(sample(1.0));
        assert_eq!(recorder.seen().len(), 1);
    }

    #[test]
    fn unregistering_unknown_consumer_is_noop() {
        let router = InputRouter::new();
        let recorder = Recorder::new("a");
        assert!(!router.unregister(&recorder));

        router.register(&recorder);
        assert!(router.unregister(&recorder));
        assert!(router.is_empty());
        assert_eq!(router.broadcast(sample(1.0)), 0);
    }

    #[test]
    fn first_registration_creates_single_dispatcher() {
        let router = InputRouter::new();
        assert!(!router.has_dispatcher());

        router.register(&Recorder::new("a"));
        let first = router.dispatcher();
        router.register(&Recorder::new("b"));
        assert!(Arc::ptr_eq(&first, &router.dispatcher()));
    }

    #[test]
    fn broadcast_reaches_everyone_in_order() {
        let router = InputRouter::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        struct Tagged(&'static str, Arc<Mutex<Vec<&'static str>>>);
        impl InputConsumer for Tagged {
            fn process_input(&self, _pin: PinIdentifier, _value: f32) {
                self.1.lock().unwrap().push(self.0);
            }
        }

        let first = Arc::new(Tagged("first", order.clone()));
        let second = Arc::new(Tagged("second", order.clone()));
        router.register(&first);
        router.register(&second);

        assert_eq!(router.broadcast(sample(0.3)), 2);
        assert_eq!(*order.lock().unwrap(), vec!["first", "second"]);
    }

    #[test]
    fn self_unregistering_consumer_does_not_break_delivery() {
        let router = InputRouter::new();
        let one_shot = Arc::new(OneShot {
            router: Arc::downgrade(&router),
            me: Mutex::new(Weak::new()),
            calls: Mutex::new(0),
        });
        *one_shot.me.lock().unwrap() = Arc::downgrade(&one_shot);
        let after = Recorder::new("after");

        router.register(&one_shot);
        router.register(&after);

        assert_eq!(router.broadcast(sample(1.0)), 2);
        assert_eq!(after.seen().len(), 1);
        assert!(!router.contains(&one_shot));

        router.broadcast(sample(0.0));
        assert_eq!(*one_shot.calls.lock().unwrap(), 1);
        assert_eq!(after.seen().len(), 2);
    }

    #[test]
    fn trait_object_consumers_share_identity_with_concrete_ones() {
        let router = InputRouter::new();
        let recorder = Recorder::new("boxed");
        let as_dyn: Arc<dyn InputConsumer> = recorder.clone();

        assert!(router.register_dyn(&as_dyn));
        assert!(!router.register(&recorder));
        assert!(router.contains(&recorder));
        assert!(router.contains_dyn(&as_dyn));

        router.broadcast(sample(1.0));
        assert_eq!(recorder.seen().len(), 1);

        assert!(router.unregister(&recorder));
        assert!(!router.unregister_dyn(&as_dyn));
        assert!(router.is_empty());
    }

    #[test]
    fn registry_changes_race_with_broadcast() {
        const ROUNDS: usize = 500;
        let router = InputRouter::new();
        let steady = Recorder::new("steady");
        router.register(&steady);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for i in 0..ROUNDS {
                    router.broadcast(sample(if i % 2 == 0 { 1.0 } else { 0.0 }));
                }
            });
            scope.spawn(|| {
                for i in 0..ROUNDS {
                    let churn = Recorder::new(&format!("churn-{}", i));
                    router.register(&churn);
                    router.unregister(&churn);
                }
            });
        });

        assert_eq!(steady.seen().len(), ROUNDS);
        assert_eq!(router.len(), 1);
        assert!(router.contains(&steady));
    }

    #[test]
    fn dropped_consumer_is_skipped_but_kept() {
        let router = InputRouter::new();
        let gone = Recorder::new("gone");
        let alive = Recorder::new("alive");
        router.register(&gone);
        router.register(&alive);
        drop(gone);

        assert_eq!(router.broadcast(sample(1.0)), 1);
        assert_eq!(alive.seen(), vec![sample(1.0)]);
        assert_eq!(router.len(), 2);
    }
}
