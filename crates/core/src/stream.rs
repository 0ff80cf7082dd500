//! Bounded handoff between webhook handlers and the orchestrator.
//!
//! A stream created with depth 0 is a rendezvous: `send` returns only after
//! the receiver has pulled the item, so at most one item per stream is ever
//! waiting and the HTTP response of the producing request is delayed until
//! the orchestrator gets to it. A depth of `n > 0` is a plain bounded queue.

use tokio::sync::{mpsc, oneshot};

pub use tokio::sync::mpsc::error::TryRecvError;

use crate::RelayError;

struct Envelope<T> {
    item: T,
    ack: Option<oneshot::Sender<()>>,
}

impl<T> Envelope<T> {
    /// `None` when a rendezvous producer stopped waiting before the pull;
    /// its request already failed, so the item is withdrawn.
    fn open(self) -> Option<T> {
        match self.ack {
            Some(ack) => ack.send(()).ok().map(|()| self.item),
            None => Some(self.item),
        }
    }
}

pub fn event_stream<T>(depth: usize) -> (EventSender<T>, EventReceiver<T>) {
    let (tx, rx) = mpsc::channel(depth.max(1));
    (EventSender { tx, rendezvous: depth == 0 }, EventReceiver { rx })
}

pub struct EventSender<T> {
    tx: mpsc::Sender<Envelope<T>>,
    rendezvous: bool,
}

impl<T> Clone for EventSender<T> {
    fn clone(&self) -> Self { Self { tx: self.tx.clone(), rendezvous: self.rendezvous } }
}

impl<T> EventSender<T> {
    pub async fn send(&self, item: T) -> Result<(), RelayError> {
        if !self.rendezvous {
            return self
                .tx
                .send(Envelope { item, ack: None })
                .await
                .map_err(|_| RelayError::StreamClosed);
        }
        let (ack, pulled) = oneshot::channel();
        self.tx
            .send(Envelope { item, ack: Some(ack) })
            .await
            .map_err(|_| RelayError::StreamClosed)?;
        pulled.await.map_err(|_| RelayError::StreamClosed)
    }

    pub fn is_closed(&self) -> bool { self.tx.is_closed() }
}

pub struct EventReceiver<T> {
    rx: mpsc::Receiver<Envelope<T>>,
}

impl<T> EventReceiver<T> {
    /// Wait for the next item. Cancel safe.
    pub async fn recv(&mut self) -> Option<T> {
        loop {
            if let Some(item) = self.rx.recv().await?.open() {
                return Some(item);
            }
        }
    }

    pub fn try_recv(&mut self) -> Result<T, TryRecvError> {
        loop {
            if let Some(item) = self.rx.try_recv()?.open() {
                return Ok(item);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test]
    async fn test_rendezvous_send_waits_for_pull() {
        let (tx, mut rx) = event_stream::<u32>(0);
        let send = tokio::spawn(async move { tx.send(7).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!send.is_finished());
        assert_eq!(rx.recv().await, Some(7));
        timeout(Duration::from_secs(1), send).await.unwrap().unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_rendezvous_bounds_in_flight_items() {
        let (tx, mut rx) = event_stream::<u32>(0);
        let first = tokio::spawn({
            let tx = tx.clone();
            async move { tx.send(1).await }
        });
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = tokio::spawn(async move { tx.send(2).await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!first.is_finished());
        assert!(!second.is_finished());
        assert_eq!(rx.try_recv().unwrap(), 1);
        first.await.unwrap().unwrap();
        assert_eq!(rx.recv().await, Some(2));
        second.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_abandoned_rendezvous_send_is_withdrawn() {
        let (tx, mut rx) = event_stream::<u32>(0);
        assert!(timeout(Duration::from_millis(20), tx.send(7)).await.is_err());
        assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

        assert!(timeout(Duration::from_millis(20), tx.send(8)).await.is_err());
        let send = tokio::spawn(async move { tx.send(9).await });
        assert_eq!(rx.recv().await, Some(9));
        send.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_buffered_send_does_not_wait() {
        let (tx, mut rx) = event_stream::<u32>(2);
        timeout(Duration::from_millis(100), tx.send(1)).await.unwrap().unwrap();
        timeout(Duration::from_millis(100), tx.send(2)).await.unwrap().unwrap();
        assert!(timeout(Duration::from_millis(20), tx.send(3)).await.is_err());
        assert_eq!(rx.recv().await, Some(1));
        assert_eq!(rx.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_dropped_receiver_closes_stream() {
        let (tx, rx) = event_stream::<u32>(0);
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.send(1).await, Err(RelayError::StreamClosed)));
    }
}
