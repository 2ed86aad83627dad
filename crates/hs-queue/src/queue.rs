//! Unbounded FIFO queue shared between producers and consumers

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Notify;

pub struct MessageQueue<T> {
    name: String,
    items: Mutex<VecDeque<T>>,
    notify: Notify,
}

impl<T> MessageQueue<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Mutex::new(VecDeque::new()),
            notify: Notify::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append an item; never blocks and never rejects
    pub fn offer(&self, item: T) {
        self.items.lock().push_back(item);
        self.notify.notify_one();
    }

    /// Take the oldest item, if any
    pub fn poll(&self) -> Option<T> {
        self.items.lock().pop_front()
    }

    /// Take up to `max` items in FIFO order
    pub fn drain(&self, max: usize) -> Vec<T> {
        let mut items = self.items.lock();
        let count = max.min(items.len());
        items.drain(..count).collect()
    }

    /// Wait until an item is available and take it
    pub async fn recv(&self) -> T {
        loop {
            // register interest before checking so an offer in between is not missed
            let notified = self.notify.notified();
            if let Some(item) = self.poll() {
                return item;
            }
            notified.await;
        }
    }

    /// Like `recv`, giving up after `timeout`
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, self.recv()).await.ok()
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}

impl<T> std::fmt::Debug for MessageQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageQueue")
            .field("name", &self.name)
            .field("len", &self.len())
            .finish()
    }
}
