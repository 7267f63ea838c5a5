//! Realtime channel to one match.
//!
//! Each connection attempt runs as a single link task tagged with a
//! generation number. The task reports everything it sees as
//! [`LinkEvent`]s so the owner can discard reports from superseded links.

use crate::error::ClientError;
use futures::{SinkExt, StreamExt};
use hexlink_core::protocol::{ClientMessage, Frame, PONG, ServerMessage};
use reqwest::Url;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, instrument, warn};

/// Outgoing half of an open link.
pub type MoveSender = mpsc::UnboundedSender<ClientMessage>;

/// What a link task observed.
#[derive(Debug)]
pub enum LinkEvent {
    /// The upgrade succeeded; moves may be sent through the sender.
    Opened(MoveSender),
    /// A decoded server message.
    Message(ServerMessage),
    /// The connection ended after opening.
    Closed,
    /// The connection attempt failed.
    Failed(ClientError),
}

/// A [`LinkEvent`] stamped with the link that produced it.
#[derive(Debug)]
pub struct Tagged {
    /// Link generation.
    pub generation: u64,
    /// The event.
    pub event: LinkEvent,
}

/// Handle to a running link task. Dropping it tears the connection down.
#[derive(Debug)]
pub struct Link {
    generation: u64,
    sender: Option<MoveSender>,
    task: JoinHandle<()>,
}

impl Link {
    /// Starts connecting to `url`, reporting into `events`.
    #[instrument(skip(url, events), fields(url = %url))]
    pub fn spawn(url: Url, generation: u64, events: mpsc::UnboundedSender<Tagged>) -> Self {
        let task = tokio::spawn(run_link(url, generation, events));
        Self {
            generation,
            sender: None,
            task,
        }
    }

    /// Generation this link was spawned with.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether the upgrade has completed.
    pub fn is_open(&self) -> bool {
        self.sender.is_some()
    }

    /// Records the outgoing half once the link reports it opened.
    pub fn opened(&mut self, sender: MoveSender) {
        self.sender = Some(sender);
    }

    /// Queues a move. Fails if the link is not open or its task has ended.
    pub fn send_move(&self, row: i64, col: i64) -> Result<(), ClientError> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| ClientError::Transport("channel not open".to_string()))?;
        sender
            .send(ClientMessage::Move { row, col })
            .map_err(|_| ClientError::Transport("channel closed".to_string()))
    }
}

impl Drop for Link {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run_link(url: Url, generation: u64, events: mpsc::UnboundedSender<Tagged>) {
    let report = |event: LinkEvent| {
        let _ = events.send(Tagged { generation, event });
    };

    let socket = match connect_async(url.to_string()).await {
        Ok((socket, _)) => socket,
        Err(e) => {
            debug!(generation, error = %e, "Channel connect failed");
            report(LinkEvent::Failed(e.into()));
            return;
        }
    };
    info!(generation, "Channel open");

    let (mut sink, mut stream) = socket.split();
    let (sender, mut outgoing) = mpsc::unbounded_channel::<ClientMessage>();
    report(LinkEvent::Opened(sender));

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) if text.as_str() == PONG => {}
                Some(Ok(Message::Text(text))) => match Frame::<ServerMessage>::parse(text.as_str()) {
                    Frame::Message(message) => report(LinkEvent::Message(message)),
                    Frame::Unrecognized(tag) => debug!(tag = %tag, "Ignoring unknown server message"),
                    Frame::Malformed(reason) => warn!(reason = %reason, "Malformed server frame"),
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(generation, error = %e, "Channel read failed");
                    break;
                }
            },
            Some(message) = outgoing.recv() => {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(error = %e, "Failed to encode client message");
                        continue;
                    }
                };
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    warn!(generation, error = %e, "Channel write failed");
                    break;
                }
            }
        }
    }

    info!(generation, "Channel closed");
    report(LinkEvent::Closed);
}
