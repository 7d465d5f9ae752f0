// # Distribution Channels
//
// The two channel shapes used to hand data from the streaming side to
// consumers:
//
// - `Broadcast<T>`: single producer, many consumers. Each subscriber sees
//   values published after it subscribed. A subscriber that falls behind
//   skips to the oldest value still buffered; nothing blocks the producer.
// - `LatestValue<T>`: replay-latest. New subscribers observe the current
//   value immediately, then every change.
//
// Unsubscribing is dropping the subscription.

use log::debug;
use tokio::sync::{broadcast, watch};

/// Multi-consumer broadcast of `T`.
#[derive(Debug)]
pub struct Broadcast<T: Clone> {
    tx: broadcast::Sender<T>,
}

impl<T: Clone> Clone for Broadcast<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}

impl<T: Clone + Send + 'static> Broadcast<T> {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish to current subscribers. Returns how many received it; zero
    /// subscribers is not an error.
    pub fn publish(&self, value: T) -> usize {
        self.tx.send(value).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription<T> {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }
}

/// A live view on a [`Broadcast`].
#[derive(Debug)]
pub struct Subscription<T: Clone> {
    rx: broadcast::Receiver<T>,
}

impl<T: Clone + Send + 'static> Subscription<T> {
    /// Next value, or `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<T> {
        loop {
            match self.rx.recv().await {
                Ok(value) => return Some(value),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Subscriber lagged, skipped {} values", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking poll; `None` when nothing is pending or the producer is gone.
    pub fn try_next(&mut self) -> Option<T> {
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Some(value),
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            }
        }
    }
}

/// Replay-latest value holder.
#[derive(Debug)]
pub struct LatestValue<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone + PartialEq> LatestValue<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    /// Store `value`; subscribers are notified only if it changed.
    pub fn set(&self, value: T) -> bool {
        self.tx.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        })
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// The receiver starts with the current value marked as seen; call
    /// `borrow()` on it to read that value right away.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_fans_out() {
        let channel = Broadcast::new(4);
        let mut a = channel.subscribe();
        let mut b = channel.subscribe();
        assert_eq!(channel.publish(7), 2);
        assert_eq!(a.next().await, Some(7));
        assert_eq!(b.next().await, Some(7));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let channel = Broadcast::new(2);
        let mut sub = channel.subscribe();
        for i in 0..5 {
            channel.publish(i);
        }
        assert_eq!(sub.next().await, Some(3));
        assert_eq!(sub.next().await, Some(4));
    }

    #[tokio::test]
    async fn test_closed_broadcast_ends_subscription() {
        let channel = Broadcast::<u8>::new(2);
        let mut sub = channel.subscribe();
        drop(channel);
        assert_eq!(sub.next().await, None);
    }

    #[test]
    fn test_latest_value_replays_current() {
        let latest = LatestValue::new(1);
        assert!(latest.set(2));
        assert!(!latest.set(2));
        let rx = latest.subscribe();
        assert_eq!(*rx.borrow(), 2);
    }
}
