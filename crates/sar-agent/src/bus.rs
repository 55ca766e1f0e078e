//! In-process, synchronous, named-channel publish/subscribe.
//!
//! Delivery is at-most-once: a payload published on a channel with no
//! subscribers is dropped, and later subscribers never see it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::debug;

type Handler<P> = Arc<dyn Fn(&P) + Send + Sync>;

struct Registration<P> {
    id: u64,
    handler: Handler<P>,
}

struct BusInner<P> {
    next_id: u64,
    channels: HashMap<String, Vec<Registration<P>>>,
}

impl<P> BusInner<P> {
    fn remove(&mut self, channel: &str, id: u64) -> bool {
        let Some(registrations) = self.channels.get_mut(channel) else {
            return false;
        };
        let before = registrations.len();
        registrations.retain(|registration| registration.id != id);
        let removed = registrations.len() != before;
        if registrations.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }
}

/// Cloneable handle to a shared bus.
pub struct EventBus<P> {
    inner: Arc<Mutex<BusInner<P>>>,
}

impl<P> Clone for EventBus<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P> Default for EventBus<P> {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(BusInner {
                next_id: 0,
                channels: HashMap::new(),
            })),
        }
    }
}

impl<P> std::fmt::Debug for EventBus<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let mut channels: Vec<_> = inner
            .channels
            .iter()
            .map(|(name, registrations)| (name.clone(), registrations.len()))
            .collect();
        channels.sort();
        f.debug_struct("EventBus")
            .field("channels", &channels)
            .finish()
    }
}

impl<P: 'static> EventBus<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` on `channel`. The handler stays registered until
    /// the returned guard is dropped or explicitly unsubscribed.
    pub fn subscribe<F>(&self, channel: impl Into<String>, handler: F) -> Subscription<P>
    where
        F: Fn(&P) + Send + Sync + 'static,
    {
        let channel = channel.into();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let id = inner.next_id;
        inner.next_id += 1;
        inner
            .channels
            .entry(channel.clone())
            .or_default()
            .push(Registration {
                id,
                handler: Arc::new(handler),
            });
        Subscription {
            bus: Arc::downgrade(&self.inner),
            channel,
            id,
            active: true,
        }
    }

    /// Deliver `payload` to every current subscriber of `channel`, in
    /// subscription order, and return how many received it.
    ///
    /// Handlers run after the internal lock is released, so they may publish
    /// or unsubscribe themselves.
    pub fn publish(&self, channel: &str, payload: &P) -> usize {
        let handlers: Vec<Handler<P>> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner
                .channels
                .get(channel)
                .map(|registrations| {
                    registrations
                        .iter()
                        .map(|registration| registration.handler.clone())
                        .collect()
                })
                .unwrap_or_default()
        };

        if handlers.is_empty() {
            debug!(channel, "publish dropped: no subscribers");
            return 0;
        }
        for handler in &handlers {
            handler(payload);
        }
        debug!(channel, delivered = handlers.len(), "published");
        handlers.len()
    }

    pub fn subscriber_count(&self, channel: &str) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .channels
            .get(channel)
            .map_or(0, Vec::len)
    }
}

/// Guard for a bus registration; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes its handler"]
pub struct Subscription<P> {
    bus: Weak<Mutex<BusInner<P>>>,
    channel: String,
    id: u64,
    active: bool,
}

impl<P> Subscription<P> {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Remove the handler. Returns false when it was already gone (or the
    /// bus itself has been dropped).
    pub fn unsubscribe(mut self) -> bool {
        self.detach()
    }

    fn detach(&mut self) -> bool {
        if !std::mem::replace(&mut self.active, false) {
            return false;
        }
        match self.bus.upgrade() {
            Some(inner) => inner
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.channel, self.id),
            None => false,
        }
    }
}

impl<P> Drop for Subscription<P> {
    fn drop(&mut self) {
        self.detach();
    }
}

impl<P> std::fmt::Debug for Subscription<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("channel", &self.channel)
            .field("id", &self.id)
            .field("active", &self.active)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> Box<dyn Fn(&u32) + Send + Sync>) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory_log = log.clone();
        let factory = move |label: &str| {
            let log = factory_log.clone();
            let label = label.to_string();
            Box::new(move |value: &u32| log.lock().unwrap().push(format!("{label}:{value}")))
                as Box<dyn Fn(&u32) + Send + Sync>
        };
        (log, factory)
    }

    #[test]
    fn fan_out_follows_subscription_order() {
        let bus = EventBus::<u32>::new();
        let (log, handler) = recorder();
        let _a = bus.subscribe("ch", handler("a"));
        let _b = bus.subscribe("ch", handler("b"));
        let _other = bus.subscribe("other", handler("x"));

        assert_eq!(bus.publish("ch", &7), 2);
        assert_eq!(*log.lock().unwrap(), vec!["a:7", "b:7"]);
    }

    #[test]
    fn publish_without_subscribers_is_dropped_not_queued() {
        let bus = EventBus::<u32>::new();
        assert_eq!(bus.publish("ch", &1), 0);

        let (log, handler) = recorder();
        let _late = bus.subscribe("ch", handler("late"));
        assert!(log.lock().unwrap().is_empty());
        bus.publish("ch", &2);
        assert_eq!(*log.lock().unwrap(), vec!["late:2"]);
    }

    #[test]
    fn dropping_or_unsubscribing_removes_handler() {
        let bus = EventBus::<u32>::new();
        let (log, handler) = recorder();
        let first = bus.subscribe("ch", handler("first"));
        let second = bus.subscribe("ch", handler("second"));
        assert_eq!(bus.subscriber_count("ch"), 2);

        drop(first);
        assert_eq!(bus.subscriber_count("ch"), 1);
        assert!(second.unsubscribe());
        assert_eq!(bus.subscriber_count("ch"), 0);
        assert_eq!(bus.publish("ch", &3), 0);
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn handlers_may_publish_reentrantly() {
        let bus = EventBus::<u32>::new();
        let (log, handler) = recorder();
        let relay_bus = bus.clone();
        let _relay = bus.subscribe("in", move |value: &u32| {
            relay_bus.publish("out", &(value + 1));
        });
        let _sink = bus.subscribe("out", handler("out"));

        assert_eq!(bus.publish("in", &1), 1);
        assert_eq!(*log.lock().unwrap(), vec!["out:2"]);
    }

    #[test]
    fn subscription_outliving_bus_is_harmless() {
        let bus = EventBus::<u32>::new();
        let subscription = bus.subscribe("ch", |_: &u32| {});
        drop(bus);
        assert!(!subscription.unsubscribe());
    }
}
