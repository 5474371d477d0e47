//! # Topic router
//!
//! Fan-out publish/subscribe between decoupled services. A [`Router`] maps each
//! [`Topic`] to the ordered list of mailboxes subscribed to it. Every send to a
//! mailbox is bounded by the router's publish timeout, so a stalled consumer can
//! delay a publisher by at most that long per delivery attempt.
//!
//! ## Delivery policy
//!
//! [`Router::publish`] delivers in subscription order and gives up at the first
//! subscriber that times out, returning `false`. Subscribers after the stalled
//! one miss that mail. [`Router::broadcast`] instead keeps going past timeouts
//! and reports how many mailboxes received the mail.
//!
//! ## Closing
//!
//! Unsubscribing or collapsing a topic closes the affected mailboxes and drops
//! every router-held sender for them, across all topics. Consumers see the
//! remaining queued mail followed by `None`.
//!
//! A mailbox its consumer closed or dropped stops counting as a subscription
//! right away and is removed from the topic map on the next subscription change.

mod mail;
mod mailbox;

pub use mail::Mail;
pub use mailbox::{Mailbox, MailboxId};

use crate::error::RouterError;
use crate::types::Topic;
use mailbox::Postbox;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc::error::SendTimeoutError;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Router tuning.
#[derive(Debug, Clone, Copy)]
pub struct RouterConfig {
    /// Upper bound on a single delivery attempt.
    pub publish_timeout: Duration,
    /// Capacity of every mailbox this router creates.
    pub mailbox_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_millis(100),
            mailbox_capacity: 1024,
        }
    }
}

/// Topic-based publish/subscribe hub.
pub struct Router<T> {
    topics: RwLock<HashMap<Topic, Vec<Postbox<T>>>>,
    config: RouterConfig,
    next_mailbox: AtomicU64,
}

impl<T: Clone + Send + 'static> Router<T> {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            config: RouterConfig {
                mailbox_capacity: config.mailbox_capacity.max(1),
                ..config
            },
            next_mailbox: AtomicU64::new(1),
        }
    }

    pub fn config(&self) -> RouterConfig {
        self.config
    }

    /// Creates a mailbox subscribed to `topic`.
    pub async fn subscribe(&self, topic: Topic) -> Mailbox<T> {
        let id = self.next_mailbox.fetch_add(1, Ordering::Relaxed);
        let (mailbox, postbox) = mailbox::pair(id, self.config.mailbox_capacity);
        let mut topics = self.topics.write().await;
        Self::prune(&mut topics);
        topics.entry(topic).or_default().push(postbox);
        debug!("📬 Mailbox {} subscribed to '{}'", id, topic);
        mailbox
    }

    /// Adds an existing mailbox to another topic.
    ///
    /// Subscribing the same mailbox to a topic twice registers it twice.
    pub async fn subscribe_mailbox_to_topic(&self, topic: Topic, mailbox: &Mailbox<T>) -> Result<(), RouterError> {
        let postbox = mailbox.postbox().ok_or(RouterError::MailboxClosed(mailbox.id()))?;
        let mut topics = self.topics.write().await;
        Self::prune(&mut topics);
        topics.entry(topic).or_default().push(postbox);
        debug!("📬 Mailbox {} subscribed to '{}'", mailbox.id(), topic);
        Ok(())
    }

    /// Removes `mailbox` from `topic` and closes it.
    ///
    /// A closed mailbox is dropped from every other topic too.
    pub async fn unsubscribe(&self, topic: Topic, mailbox: &Mailbox<T>) {
        let mut topics = self.topics.write().await;
        let was_subscribed = topics
            .get(&topic)
            .is_some_and(|postboxes| postboxes.iter().any(|p| p.mailbox == mailbox.id()));
        if !was_subscribed {
            return;
        }
        let mut closing = HashSet::new();
        closing.insert(mailbox.id());
        Self::close_mailboxes(&mut topics, &closing);
        Self::prune(&mut topics);
        debug!("📪 Mailbox {} unsubscribed from '{}' and closed", mailbox.id(), topic);
    }

    /// Removes `topic` and closes every mailbox subscribed to it.
    pub async fn collapse(&self, topic: Topic) {
        let mut topics = self.topics.write().await;
        let Some(postboxes) = topics.remove(&topic) else {
            return;
        };
        let closing: HashSet<MailboxId> = postboxes.iter().map(|p| p.mailbox).collect();
        for postbox in &postboxes {
            postbox.close();
        }
        Self::close_mailboxes(&mut topics, &closing);
        Self::prune(&mut topics);
        debug!("📪 Topic '{}' collapsed, {} mailboxes closed", topic, closing.len());
    }

    fn close_mailboxes(topics: &mut HashMap<Topic, Vec<Postbox<T>>>, closing: &HashSet<MailboxId>) {
        for postboxes in topics.values_mut() {
            postboxes.retain(|postbox| {
                if closing.contains(&postbox.mailbox) {
                    postbox.close();
                    false
                } else {
                    true
                }
            });
        }
        topics.retain(|_, postboxes| !postboxes.is_empty());
    }

    /// Drops postboxes whose mailbox was closed or dropped by its consumer.
    fn prune(topics: &mut HashMap<Topic, Vec<Postbox<T>>>) {
        for postboxes in topics.values_mut() {
            postboxes.retain(|postbox| {
                if postbox.is_closed() {
                    postbox.close();
                    false
                } else {
                    true
                }
            });
        }
        topics.retain(|_, postboxes| !postboxes.is_empty());
    }

    /// Delivers `mail` to every open subscriber of `topic`, in subscription order.
    ///
    /// Returns `false` as soon as one delivery times out; the remaining
    /// subscribers are not attempted. A topic without subscribers succeeds.
    pub async fn publish(&self, topic: Topic, mail: Mail<T>) -> bool {
        let topics = self.topics.read().await;
        let Some(postboxes) = topics.get(&topic) else {
            return true;
        };

        for postbox in postboxes {
            if postbox.is_closed() {
                continue;
            }
            match postbox.tx.send_timeout(mail.clone(), self.config.publish_timeout).await {
                Ok(()) => {}
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!(
                        "⏱️ Publish to '{}' timed out at mailbox {} (client {})",
                        topic, postbox.mailbox, mail.client
                    );
                    return false;
                }
                // The consumer dropped its mailbox without closing it.
                Err(SendTimeoutError::Closed(_)) => {
                    postbox.close();
                }
            }
        }
        true
    }

    /// Delivers `mail` once to every distinct open mailbox on any topic.
    ///
    /// Timeouts are skipped over. Returns the number of successful deliveries.
    pub async fn broadcast(&self, mail: Mail<T>) -> usize {
        let topics = self.topics.read().await;
        let mut seen = HashSet::new();
        let mut delivered = 0;

        for postbox in topics.values().flatten() {
            if !seen.insert(postbox.mailbox) || postbox.is_closed() {
                continue;
            }
            match postbox.tx.send_timeout(mail.clone(), self.config.publish_timeout).await {
                Ok(()) => delivered += 1,
                Err(SendTimeoutError::Timeout(_)) => {
                    warn!("⏱️ Broadcast timed out at mailbox {}", postbox.mailbox);
                }
                Err(SendTimeoutError::Closed(_)) => postbox.close(),
            }
        }
        delivered
    }

    /// Number of topics with at least one open subscription.
    pub async fn topic_count(&self) -> usize {
        self.topics
            .read()
            .await
            .values()
            .filter(|postboxes| postboxes.iter().any(|p| !p.is_closed()))
            .count()
    }

    /// Number of open subscriptions on `topic`, counting duplicates.
    pub async fn size_of(&self, topic: Topic) -> usize {
        self.topics
            .read()
            .await
            .get(&topic)
            .map_or(0, |postboxes| postboxes.iter().filter(|p| !p.is_closed()).count())
    }
}
