use std::{
    fmt::Write as _,
    path::{Path, PathBuf},
};

use clap::Subcommand;
use client_core::{
    ChatSession, ConversationListView, MessagingClient, NewAccount, Registration,
    SearchResultsView,
};
use shared::{
    domain::{ConversationRef, Identity, Message, SearchableUser},
    error::SyncError,
};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create an account and sign in as it.
    Register {
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        #[arg(long)]
        email: String,
        /// PNG to store as the profile picture.
        #[arg(long)]
        picture: Option<PathBuf>,
    },
    SignIn {
        email: String,
    },
    SignOut,
    Whoami,
    /// Find users whose name starts with the query.
    Search {
        query: String,
    },
    Conversations,
    Send {
        #[arg(long)]
        to: String,
        text: String,
    },
    History {
        #[arg(long)]
        with: String,
    },
    /// Send a photo message.
    UploadPhoto {
        #[arg(long)]
        to: String,
        path: PathBuf,
    },
}

impl Command {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Register { .. } => "register",
            Self::SignIn { .. } => "sign-in",
            Self::SignOut => "sign-out",
            Self::Whoami => "whoami",
            Self::Search { .. } => "search",
            Self::Conversations => "conversations",
            Self::Send { .. } => "send",
            Self::History { .. } => "history",
            Self::UploadPhoto { .. } => "upload-photo",
        }
    }
}

#[derive(Debug)]
pub enum Outcome {
    Registered(Registration),
    SignedIn(Identity),
    SignedOut,
    WhoAmI(Option<Identity>),
    Search(SearchResultsView),
    Conversations(ConversationListView),
    Sent(Message),
    History {
        with: Identity,
        messages: Vec<Message>,
    },
}

pub async fn execute(client: MessagingClient, command: Command) -> Result<Outcome, SyncError> {
    match command {
        Command::Register {
            first_name,
            last_name,
            email,
            picture,
        } => {
            let picture = match picture {
                Some(path) => Some(read_file(&path).await?),
                None => None,
            };
            let account = NewAccount {
                first_name,
                last_name,
                email,
            };
            Ok(Outcome::Registered(client.register(account, picture).await?))
        }
        Command::SignIn { email } => {
            let session = client.sign_in(&email).await?;
            Ok(Outcome::SignedIn(session.identity().clone()))
        }
        Command::SignOut => {
            client.sign_out().await?;
            Ok(Outcome::SignedOut)
        }
        Command::Whoami => Ok(Outcome::WhoAmI(client.current_identity().await)),
        Command::Search { query } => {
            let session = client.signed_in().await?;
            Ok(Outcome::Search(session.search_users(&query).await?))
        }
        Command::Conversations => {
            let session = client.signed_in().await?;
            Ok(Outcome::Conversations(session.conversation_list_view().await))
        }
        Command::Send { to, text } => {
            let session = client.signed_in().await?;
            let mut conversation = open_conversation(&client, &session, &to).await?;
            Ok(Outcome::Sent(session.send_text(&mut conversation, &text).await?))
        }
        Command::History { with } => {
            let session = client.signed_in().await?;
            let conversation = open_conversation(&client, &session, &with).await?;
            Ok(Outcome::History {
                with: conversation.participant().clone(),
                messages: session.history(&conversation).await?,
            })
        }
        Command::UploadPhoto { to, path } => {
            let session = client.signed_in().await?;
            let bytes = read_file(&path).await?;
            let mut conversation = open_conversation(&client, &session, &to).await?;
            Ok(Outcome::Sent(session.send_photo(&mut conversation, bytes).await?))
        }
    }
}

async fn open_conversation(
    client: &MessagingClient,
    session: &ChatSession,
    raw_email: &str,
) -> Result<ConversationRef, SyncError> {
    let partner = Identity::parse(raw_email)?;
    let Some(profile) = client.accounts().profile(&partner).await? else {
        return Err(SyncError::UnknownAccount(raw_email.trim().to_string()));
    };
    session
        .start_conversation(&SearchableUser {
            name: profile.display_name(),
            email: partner,
        })
        .await
}

async fn read_file(path: &Path) -> Result<Vec<u8>, SyncError> {
    tokio::fs::read(path)
        .await
        .map_err(|err| SyncError::LocalStorage(format!("failed to read {}: {err}", path.display())))
}

pub fn render(outcome: &Outcome) -> String {
    let mut out = String::new();
    match outcome {
        Outcome::Registered(registration) => {
            let _ = writeln!(out, "Registered and signed in as {}", registration.identity);
            match &registration.profile_picture {
                Some(Ok(url)) => {
                    let _ = writeln!(out, "Profile picture: {url}");
                }
                Some(Err(err)) => {
                    let _ = writeln!(out, "Profile picture not stored: {err}");
                }
                None => {}
            }
        }
        Outcome::SignedIn(identity) => {
            let _ = writeln!(out, "Signed in as {identity}");
        }
        Outcome::SignedOut => out.push_str("Signed out\n"),
        Outcome::WhoAmI(Some(identity)) => {
            let _ = writeln!(out, "{identity}");
        }
        Outcome::WhoAmI(None) => out.push_str("Not signed in\n"),
        Outcome::Search(SearchResultsView::NoResults) => out.push_str("No results\n"),
        Outcome::Search(SearchResultsView::Results(users)) => {
            for user in users {
                let _ = writeln!(out, "{}  <{}>", user.name, user.email);
            }
        }
        Outcome::Conversations(view) => render_conversations(&mut out, view),
        Outcome::Sent(message) => {
            let _ = writeln!(out, "Sent {}", message.id);
        }
        Outcome::History { with, messages } => {
            if messages.is_empty() {
                let _ = writeln!(out, "No messages with {with}");
            }
            for message in messages {
                let _ = writeln!(
                    out,
                    "[{}] {}: {}",
                    message.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    message.sender,
                    message.content.summary()
                );
            }
        }
    }
    out
}

fn render_conversations(out: &mut String, view: &ConversationListView) {
    match view {
        ConversationListView::Loading => out.push_str("Loading...\n"),
        ConversationListView::Empty { notice } => {
            out.push_str("No conversations\n");
            if let Some(notice) = notice {
                let _ = writeln!(out, "({:?}: {})", notice.code, notice.message);
            }
        }
        ConversationListView::Loaded(conversations) => {
            for conversation in conversations {
                let marker = if conversation.latest_message.is_read {
                    ' '
                } else {
                    '*'
                };
                let _ = writeln!(
                    out,
                    "{marker} {}  {}  {}",
                    conversation.display_name,
                    conversation.latest_message.timestamp.format("%Y-%m-%d %H:%M"),
                    conversation.latest_message.text
                );
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/commands_tests.rs"]
mod tests;
