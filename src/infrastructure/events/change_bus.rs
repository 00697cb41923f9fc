use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Something that wants to hear about committed writes to the task store.
///
/// Called on the writer's own context; implementations must hand any real work
/// off instead of blocking.
pub trait ChangeSubscriber: Send + Sync {
    fn on_change(&self);
}

/// Fan-out registry shared by the write path and its listeners
#[derive(Default)]
pub struct ChangeBus {
    subscribers: Mutex<Vec<Arc<dyn ChangeSubscriber>>>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, subscriber: Arc<dyn ChangeSubscriber>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.push(subscriber);
        debug!(subscribers = subscribers.len(), "change subscriber registered");
    }

    /// Removes every registration of this exact subscriber instance
    pub fn unregister(&self, subscriber: &Arc<dyn ChangeSubscriber>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|existing| !same_subscriber(existing, subscriber));
        debug!(subscribers = subscribers.len(), "change subscriber unregistered");
    }

    /// Calls every subscriber in registration order
    pub fn publish(&self) {
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        for subscriber in subscribers.iter() {
            subscriber.on_change();
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

// compare data pointers only; vtable pointers are not stable across codegen units
fn same_subscriber(a: &Arc<dyn ChangeSubscriber>, b: &Arc<dyn ChangeSubscriber>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ChangeSubscriber for Recorder {
        fn on_change(&self) {
            self.log.lock().unwrap().push(self.name);
        }
    }

    fn recorder(name: &'static str, log: &Arc<Mutex<Vec<&'static str>>>) -> Arc<dyn ChangeSubscriber> {
        Arc::new(Recorder {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn publishes_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ChangeBus::new();
        bus.register(recorder("first", &log));
        bus.register(recorder("second", &log));

        bus.publish();
        bus.publish();

        assert_eq!(*log.lock().unwrap(), vec!["first", "second", "first", "second"]);
    }

    #[test]
    fn unregister_removes_by_identity() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let bus = ChangeBus::new();
        let first = recorder("same", &log);
        let twin = recorder("same", &log);
        bus.register(first.clone());
        bus.register(twin.clone());

        bus.unregister(&first);
        assert_eq!(bus.subscriber_count(), 1);

        bus.publish();
        assert_eq!(log.lock().unwrap().len(), 1);

        bus.unregister(&twin);
        bus.unregister(&twin);
        assert_eq!(bus.subscriber_count(), 0);
    }
}
