use std::sync::Arc;

use futures::Stream;
use shared::{
    domain::{
        Conversation, ConversationId, ConversationRef, Identity, MediaItem, Message,
        MessageContent, SearchableUser,
    },
    error::SyncError,
    gateway::SyncGateway,
};
use tokio::sync::broadcast;
use tracing::info;

pub mod accounts;
pub mod bridge;
pub mod conversations;
pub mod directory;
pub mod events;
pub mod media;
pub mod messages;
pub mod session;
pub mod view;

pub use accounts::{Accounts, NewAccount, Registration};
pub use bridge::{Bridge, RequestHandle, RequestPolicy};
pub use conversations::{ConversationIndex, FirstMessageTarget, ReservedConversation};
pub use directory::UserDirectory;
pub use events::{ClientEvent, EventBus};
pub use media::Media;
pub use messages::{Appended, Clock, MessageLog};
pub use session::SessionStore;
pub use view::{ConversationListView, SearchResultsView};

/// Entry point for one device. Owns the session and the per-concern services
/// that share a single gateway.
#[derive(Clone)]
pub struct MessagingClient {
    session: Arc<SessionStore>,
    events: EventBus,
    accounts: Arc<Accounts>,
    directory: Arc<UserDirectory>,
    media: Arc<Media>,
    conversations: Arc<ConversationIndex>,
    messages: Arc<MessageLog>,
}

impl MessagingClient {
    pub fn new(gateway: Arc<dyn SyncGateway>, session: SessionStore) -> Self {
        Self::build(gateway, session, None)
    }

    /// Same as [`Self::new`] with a fixed time source for message ids.
    pub fn with_clock(gateway: Arc<dyn SyncGateway>, session: SessionStore, clock: Clock) -> Self {
        Self::build(gateway, session, Some(clock))
    }

    fn build(gateway: Arc<dyn SyncGateway>, session: SessionStore, clock: Option<Clock>) -> Self {
        let session = Arc::new(session);
        let events = EventBus::default();
        let directory = Arc::new(UserDirectory::new(gateway.clone()));
        let media = Arc::new(Media::new(gateway.clone()));
        let conversations = Arc::new(ConversationIndex::new(gateway.clone(), events.clone()));
        let mut messages = MessageLog::new(gateway.clone(), conversations.clone(), events.clone());
        if let Some(clock) = clock {
            messages = messages.with_clock(clock);
        }
        let accounts = Arc::new(Accounts::new(
            gateway,
            session.clone(),
            directory.clone(),
            media.clone(),
            events.clone(),
        ));

        Self {
            session,
            events,
            accounts,
            directory,
            media,
            conversations,
            messages: Arc::new(messages),
        }
    }

    pub fn accounts(&self) -> &Accounts {
        &self.accounts
    }

    pub fn media(&self) -> &Media {
        &self.media
    }

    pub async fn register(
        &self,
        account: NewAccount,
        profile_picture: Option<Vec<u8>>,
    ) -> Result<Registration, SyncError> {
        self.accounts.register(account, profile_picture).await
    }

    pub async fn sign_in(&self, raw_email: &str) -> Result<ChatSession, SyncError> {
        let identity = self.accounts.sign_in(raw_email).await?;
        Ok(self.session_for(identity))
    }

    /// Clears the persisted identity and everything cached for it.
    pub async fn sign_out(&self) -> Result<(), SyncError> {
        self.accounts.sign_out().await?;
        self.conversations.reset().await;
        self.messages.reset().await;
        self.directory.refresh().await;
        info!("signed out; caches cleared");
        Ok(())
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.session.current_identity().await
    }

    /// Operations that need an identity are only reachable through the
    /// returned session.
    pub async fn signed_in(&self) -> Result<ChatSession, SyncError> {
        let identity = self.session.require_identity().await?;
        Ok(self.session_for(identity))
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> impl Stream<Item = ClientEvent> + Send + 'static {
        self.events.stream()
    }

    fn session_for(&self, identity: Identity) -> ChatSession {
        ChatSession {
            identity,
            directory: self.directory.clone(),
            media: self.media.clone(),
            conversations: self.conversations.clone(),
            messages: self.messages.clone(),
        }
    }
}

/// The signed-in side of [`MessagingClient`].
#[derive(Clone)]
pub struct ChatSession {
    identity: Identity,
    directory: Arc<UserDirectory>,
    media: Arc<Media>,
    conversations: Arc<ConversationIndex>,
    messages: Arc<MessageLog>,
}

impl ChatSession {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub async fn conversations(&self) -> Result<Vec<Conversation>, SyncError> {
        self.conversations.list(&self.identity).await
    }

    pub async fn conversation_list_view(&self) -> ConversationListView {
        ConversationListView::from_result(self.conversations().await)
    }

    /// Other users whose name starts with `query`; the signed-in user is
    /// never offered as a partner.
    pub async fn search_users(&self, query: &str) -> Result<SearchResultsView, SyncError> {
        let matches = self
            .directory
            .search(query)
            .await?
            .into_iter()
            .filter(|user| user.email != self.identity)
            .collect();
        Ok(SearchResultsView::from_matches(matches))
    }

    pub async fn start_conversation(
        &self,
        partner: &SearchableUser,
    ) -> Result<ConversationRef, SyncError> {
        self.conversations
            .find_or_create(&self.identity, &partner.email, &partner.name)
            .await
    }

    pub async fn send_text(
        &self,
        conversation: &mut ConversationRef,
        text: &str,
    ) -> Result<Message, SyncError> {
        self.send(conversation, MessageContent::Text(text.to_string()))
            .await
    }

    /// Sends `content`. `conversation` is replaced by the stored
    /// conversation, so a pending one becomes existing after its first
    /// message.
    pub async fn send(
        &self,
        conversation: &mut ConversationRef,
        content: MessageContent,
    ) -> Result<Message, SyncError> {
        let appended = self
            .messages
            .append(conversation, &self.identity, content)
            .await?;
        *conversation = ConversationRef::Existing(appended.conversation);
        Ok(appended.message)
    }

    /// Uploads the photo, then sends it as an image message. Nothing is sent
    /// when the upload fails.
    pub async fn send_photo(
        &self,
        conversation: &mut ConversationRef,
        bytes: Vec<u8>,
    ) -> Result<Message, SyncError> {
        let file_name = media::new_photo_file_name();
        let url = self.media.upload_message_photo(&file_name, bytes).await?;
        let content = MessageContent::Image(MediaItem {
            url,
            file_name: Some(file_name),
        });
        self.send(conversation, content).await
    }

    pub async fn history(&self, conversation: &ConversationRef) -> Result<Vec<Message>, SyncError> {
        self.messages.fetch_all(conversation).await
    }

    pub async fn mark_read(
        &self,
        conversation_id: &ConversationId,
    ) -> Result<Option<Conversation>, SyncError> {
        self.conversations
            .mark_read(&self.identity, conversation_id)
            .await
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
