// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

use ahash::HashMap;
use parking_lot::{RwLock, RwLockUpgradableReadGuard};

/// Topic on which the store publishes the current best chain head.
pub const NEW_HEAD_TOPIC: &str = "new-head";

/// A topic-keyed fan-out publisher over bounded channels.
///
/// Every subscriber of a topic receives every event published to that topic
/// after it subscribed, in publish order. A subscriber that does not drain its
/// backlog blocks the publisher once the backlog fills; events are never
/// dropped for a connected subscriber.
pub struct Publisher<T> {
    /// Backlog capacity handed to every subscription.
    capacity: usize,
    inner: RwLock<Inner<T>>,
}

struct Inner<T> {
    topics: HashMap<String, Vec<flume::Sender<T>>>,
    shut_down: bool,
}

/// Receiving half of a [Publisher] subscription.
pub struct Subscriber<T> {
    rx: flume::Receiver<T>,
}

impl<T> Subscriber<T> {
    /// Blocks until the next event arrives. Fails once the publisher has shut
    /// down and the backlog is drained.
    pub fn recv(&self) -> Result<T, flume::RecvError> {
        self.rx.recv()
    }

    /// Returns the next event without blocking.
    pub fn try_recv(&self) -> Result<T, flume::TryRecvError> {
        self.rx.try_recv()
    }

    /// Number of events waiting in the backlog.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T: Clone> Publisher<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner {
                topics: HashMap::default(),
                shut_down: false,
            }),
        }
    }

    /// Registers a new subscription on the given topic. A subscription taken
    /// after [Publisher::shutdown] is handed out already closed.
    pub fn subscribe(&self, topic: &str) -> Subscriber<T> {
        let (tx, rx) = flume::bounded(self.capacity);
        let mut inner = self.inner.write();
        if !inner.shut_down {
            inner.topics.entry(topic.to_owned()).or_default().push(tx);
        }
        Subscriber { rx }
    }

    /// Delivers `msg` to every current subscriber of `topic` and returns the
    /// number of subscribers reached. Publishers are serialized, so events on
    /// one topic are observed in publish order. Blocks while any subscriber's
    /// backlog is full; subscribers that dropped their receiver are pruned.
    pub fn publish(&self, msg: T, topic: &str) -> usize {
        let inner = self.inner.upgradable_read();
        if inner.shut_down {
            return 0;
        }
        let senders = match inner.topics.get(topic) {
            Some(senders) => senders,
            None => return 0,
        };

        let mut delivered = 0;
        let mut disconnected = false;
        for tx in senders {
            match tx.send(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(flume::SendError(_)) => disconnected = true,
            }
        }

        if disconnected {
            let mut inner = RwLockUpgradableReadGuard::upgrade(inner);
            if let Some(senders) = inner.topics.get_mut(topic) {
                senders.retain(|tx| !tx.is_disconnected());
            }
        }

        delivered
    }

    /// Closes every subscriber channel and refuses further subscriptions;
    /// publishing becomes a no-op.
    pub fn shutdown(&self) {
        let mut inner = self.inner.write();
        inner.shut_down = true;
        // dropping the senders disconnects every subscriber
        inner.topics.clear();
    }

    /// Whether [Publisher::shutdown] has been called.
    pub fn is_shut_down(&self) -> bool {
        self.inner.read().shut_down
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn delivers_in_publish_order() {
        let publisher = Publisher::new(16);
        let sub = publisher.subscribe("numbers");
        for i in 0..10 {
            assert_eq!(publisher.publish(i, "numbers"), 1);
        }
        let received: Vec<i32> = (0..10).map(|_| sub.recv().unwrap()).collect();
        assert_eq!(received, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn topics_are_isolated() {
        let publisher = Publisher::new(16);
        let sub = publisher.subscribe("a");
        publisher.publish(1, "b");
        assert!(sub.try_recv().is_err());
        publisher.publish(2, "a");
        assert_eq!(sub.recv().unwrap(), 2);
    }

    #[test]
    fn shutdown_closes_subscribers() {
        let publisher = Publisher::new(16);
        let sub = publisher.subscribe("numbers");
        publisher.publish(1, "numbers");
        publisher.shutdown();
        assert_eq!(sub.recv().unwrap(), 1);
        assert!(sub.recv().is_err());
        assert_eq!(publisher.publish(2, "numbers"), 0);
    }

    #[test]
    fn subscribe_after_shutdown_is_closed() {
        let publisher: Publisher<i32> = Publisher::new(16);
        publisher.shutdown();
        let sub = publisher.subscribe("numbers");
        assert!(sub.recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let publisher = Publisher::new(16);
        let kept = publisher.subscribe("numbers");
        let dropped = publisher.subscribe("numbers");
        drop(dropped);
        assert_eq!(publisher.publish(1, "numbers"), 1);
        assert_eq!(kept.recv().unwrap(), 1);
    }

    #[test]
    fn full_backlog_blocks_until_drained() {
        let publisher = std::sync::Arc::new(Publisher::new(2));
        let sub = publisher.subscribe("numbers");
        let producer = {
            let publisher = publisher.clone();
            thread::spawn(move || {
                for i in 0..50 {
                    publisher.publish(i, "numbers");
                }
            })
        };
        let received: Vec<i32> = (0..50).map(|_| sub.recv().unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(received, (0..50).collect::<Vec<_>>());
    }
}
