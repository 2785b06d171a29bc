use shared::{
    domain::{Conversation, SearchableUser},
    error::{ErrorReport, SyncError},
};

/// What the conversation list screen renders. A failed load is shown as an
/// empty list with a notice instead of blocking the screen.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversationListView {
    Loading,
    Empty { notice: Option<ErrorReport> },
    Loaded(Vec<Conversation>),
}

impl ConversationListView {
    pub fn from_result(result: Result<Vec<Conversation>, SyncError>) -> Self {
        match result {
            Ok(conversations) if conversations.is_empty() => Self::Empty { notice: None },
            Ok(conversations) => Self::Loaded(conversations),
            Err(err) => Self::Empty {
                notice: Some(ErrorReport::from(err)),
            },
        }
    }

    pub fn shows_no_conversations(&self) -> bool {
        matches!(self, Self::Empty { .. })
    }

    pub fn conversations(&self) -> &[Conversation] {
        match self {
            Self::Loaded(conversations) => conversations,
            _ => &[],
        }
    }

    pub fn notice(&self) -> Option<&ErrorReport> {
        match self {
            Self::Empty { notice } => notice.as_ref(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchResultsView {
    NoResults,
    Results(Vec<SearchableUser>),
}

impl SearchResultsView {
    pub fn from_matches(matches: Vec<SearchableUser>) -> Self {
        if matches.is_empty() {
            Self::NoResults
        } else {
            Self::Results(matches)
        }
    }

    pub fn users(&self) -> &[SearchableUser] {
        match self {
            Self::Results(users) => users,
            Self::NoResults => &[],
        }
    }
}

#[cfg(test)]
#[path = "tests/view_tests.rs"]
mod tests;
