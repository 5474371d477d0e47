use super::mail::Mail;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Identifier of a mailbox, unique per router.
pub type MailboxId = u64;

/// Bounded delivery channel owned by one consumer.
///
/// The router holds the only strong senders. Once the mailbox is closed, or
/// removed from its last topic, [`Mailbox::recv`] drains what was already
/// queued and then yields `None`.
#[derive(Debug)]
pub struct Mailbox<T> {
    id: MailboxId,
    rx: mpsc::Receiver<Mail<T>>,
    tx: mpsc::WeakSender<Mail<T>>,
    closed: Arc<AtomicBool>,
}

impl<T> Mailbox<T> {
    pub fn id(&self) -> MailboxId {
        self.id
    }

    /// Waits for the next mail.
    pub async fn recv(&mut self) -> Option<Mail<T>> {
        self.rx.recv().await
    }

    /// Takes the next mail if one is already queued.
    pub fn try_recv(&mut self) -> Option<Mail<T>> {
        self.rx.try_recv().ok()
    }

    /// Number of queued mails.
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Stops accepting mail. Queued mail can still be received.
    pub fn close(&mut self) {
        self.closed.store(true, Ordering::Release);
        self.rx.close();
    }

    pub(crate) fn postbox(&self) -> Option<Postbox<T>> {
        if self.is_closed() {
            return None;
        }
        let tx = self.tx.upgrade()?;
        Some(Postbox {
            mailbox: self.id,
            tx,
            closed: self.closed.clone(),
        })
    }
}

/// Router-side half of a mailbox.
#[derive(Debug)]
pub(crate) struct Postbox<T> {
    pub(crate) mailbox: MailboxId,
    pub(crate) tx: mpsc::Sender<Mail<T>>,
    closed: Arc<AtomicBool>,
}

impl<T> Postbox<T> {
    /// Closed by the router, closed by the consumer, or the mailbox was dropped.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.tx.is_closed()
    }

    pub(crate) fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl<T> Clone for Postbox<T> {
    fn clone(&self) -> Self {
        Self {
            mailbox: self.mailbox,
            tx: self.tx.clone(),
            closed: self.closed.clone(),
        }
    }
}

/// Creates a mailbox and the postbox that feeds it.
pub(crate) fn pair<T>(id: MailboxId, capacity: usize) -> (Mailbox<T>, Postbox<T>) {
    let (tx, rx) = mpsc::channel(capacity);
    let closed = Arc::new(AtomicBool::new(false));
    let mailbox = Mailbox {
        id,
        rx,
        tx: tx.downgrade(),
        closed: closed.clone(),
    };
    let postbox = Postbox {
        mailbox: id,
        tx,
        closed,
    };
    (mailbox, postbox)
}
