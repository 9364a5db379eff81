//! Request/response message passing between extension contexts.
//!
//! Each context owns the receiving half of a [`Mailbox`] and answers every
//! [`Envelope`] exactly once through its reply channel.

use tokio::sync::{mpsc, oneshot};

use crate::error::RelayError;
use crate::messages::{Request, Response};

const MAILBOX_CAPACITY: usize = 32;

pub struct Envelope {
    pub request: Request,
    pub reply: oneshot::Sender<Response>,
}

impl Envelope {
    /// Answers the sender. A sender that gave up waiting is not an error.
    pub fn respond(self, response: Response) {
        if self.reply.send(response).is_err() {
            tracing::debug!("Sender dropped before the response was delivered");
        }
    }
}

/// Sending half of a context's inbox.
#[derive(Debug, Clone)]
pub struct Mailbox {
    tx: mpsc::Sender<Envelope>,
}

impl Mailbox {
    pub fn channel() -> (Self, mpsc::Receiver<Envelope>) {
        let (tx, rx) = mpsc::channel(MAILBOX_CAPACITY);
        (Self { tx }, rx)
    }

    pub async fn send(&self, request: Request) -> Result<Response, RelayError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Envelope { request, reply })
            .await
            .map_err(|_| RelayError::NoReceiver)?;
        response.await.map_err(|_| RelayError::NoResponse)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_round_trip() {
        let (mailbox, mut rx) = Mailbox::channel();
        tokio::spawn(async move {
            while let Some(envelope) = rx.recv().await {
                envelope.respond(Response::Pong);
            }
        });
        assert_eq!(mailbox.send(Request::Ping).await.unwrap(), Response::Pong);
    }

    #[tokio::test]
    async fn test_closed_receiver() {
        let (mailbox, rx) = Mailbox::channel();
        drop(rx);
        assert!(mailbox.is_closed());
        assert!(matches!(mailbox.send(Request::Ping).await, Err(RelayError::NoReceiver)));
    }

    #[tokio::test]
    async fn test_dropped_reply() {
        let (mailbox, mut rx) = Mailbox::channel();
        tokio::spawn(async move {
            if let Some(envelope) = rx.recv().await {
                drop(envelope);
            }
        });
        assert!(matches!(mailbox.send(Request::Ping).await, Err(RelayError::NoResponse)));
    }
}
