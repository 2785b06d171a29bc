//! Typed event bus owned by [`crate::MessagingClient`].

use futures::{Stream, StreamExt};
use shared::domain::{ConversationId, Identity, MessageId};
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::{debug, warn};

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    SignedIn(Identity),
    SignedOut,
    ConversationsRefreshed {
        count: usize,
    },
    ConversationCreated {
        conversation_id: ConversationId,
        participant: Identity,
    },
    MessageAppended {
        conversation_id: ConversationId,
        message_id: MessageId,
    },
    ProfilePictureUploaded {
        identity: Identity,
        url: String,
    },
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn emit(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            debug!("client event dropped: no subscribers");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    /// Subscription as a stream; lagged receivers skip what they missed.
    pub fn stream(&self) -> impl Stream<Item = ClientEvent> + Send + 'static {
        BroadcastStream::new(self.tx.subscribe()).filter_map(|item| async move {
            match item {
                Ok(event) => Some(event),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "client event subscriber lagged");
                    None
                }
            }
        })
    }
}
