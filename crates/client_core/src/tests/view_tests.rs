use super::*;
use chrono::{TimeZone, Utc};
use shared::{
    domain::{ConversationId, Identity, LatestMessage},
    error::ErrorCode,
};

fn conversation(id: &str) -> Conversation {
    Conversation {
        id: ConversationId(id.to_string()),
        participant: Identity::parse("bob@example.com").expect("identity"),
        display_name: "Bob".into(),
        latest_message: LatestMessage {
            timestamp: Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap(),
            text: "hi".into(),
            is_read: false,
        },
    }
}

#[test]
fn empty_list_shows_no_conversations_without_notice() {
    let view = ConversationListView::from_result(Ok(Vec::new()));
    assert!(view.shows_no_conversations());
    assert!(view.notice().is_none());
    assert!(view.conversations().is_empty());
}

#[test]
fn failed_load_shows_no_conversations_with_notice() {
    let view = ConversationListView::from_result(Err(SyncError::SyncUnavailable(
        "offline".into(),
    )));
    assert!(view.shows_no_conversations());
    assert_eq!(
        view.notice().map(|report| report.code),
        Some(ErrorCode::SyncUnavailable)
    );
}

#[test]
fn loaded_list_keeps_order() {
    let view = ConversationListView::from_result(Ok(vec![conversation("b"), conversation("a")]));
    assert!(!view.shows_no_conversations());
    let ids: Vec<_> = view.conversations().iter().map(|c| c.id.as_str()).collect();
    assert_eq!(ids, vec!["b", "a"]);
}

#[test]
fn loading_is_neither_empty_nor_loaded() {
    let view = ConversationListView::Loading;
    assert!(!view.shows_no_conversations());
    assert!(view.conversations().is_empty());
}

#[test]
fn search_results_report_no_results_when_empty() {
    assert_eq!(
        SearchResultsView::from_matches(Vec::new()),
        SearchResultsView::NoResults
    );
    let user = SearchableUser {
        name: "Bob".into(),
        email: Identity::parse("bob@example.com").expect("identity"),
    };
    let view = SearchResultsView::from_matches(vec![user.clone()]);
    assert_eq!(view.users(), &[user]);
}
