use super::*;
use serde_json::json;

use crate::test_support::{identity, MemoryGateway};

fn user(name: &str, email: &str) -> SearchableUser {
    SearchableUser {
        name: name.to_string(),
        email: identity(email),
    }
}

#[test]
fn filter_matches_name_prefix_ignoring_case() {
    let users = vec![
        user("Anna Berzina", "anna@lv.com"),
        user("Andris Ozols", "andris@lv.com"),
        user("Janis Anna", "janis@lv.com"),
    ];
    let names: Vec<_> = filter_users(&users, "an")
        .into_iter()
        .map(|u| u.name)
        .collect();
    assert_eq!(names, vec!["Anna Berzina", "Andris Ozols"]);
    assert_eq!(filter_users(&users, "ANNA").len(), 1);
}

#[test]
fn whitespace_query_matches_nothing() {
    let users = vec![user("Anna Berzina", "anna@lv.com")];
    assert!(filter_users(&users, "   ").is_empty());
}

#[tokio::test]
async fn search_fetches_directory_once() {
    let gateway = MemoryGateway::new();
    let directory = UserDirectory::new(gateway.clone());
    directory
        .register(user("Anna Berzina", "anna@lv.com"))
        .await
        .expect("register");

    assert_eq!(directory.search("an").await.expect("first").len(), 1);
    assert_eq!(directory.search("zz").await.expect("second").len(), 0);
    assert_eq!(gateway.read_count(), 1);

    directory.refresh().await;
    directory.search("an").await.expect("after refresh");
    assert_eq!(gateway.read_count(), 2);
}

#[tokio::test]
async fn register_extends_warm_cache() {
    let gateway = MemoryGateway::new();
    let directory = UserDirectory::new(gateway.clone());
    assert!(directory.all().await.expect("empty").is_empty());

    directory
        .register(user("Liga Kalnina", "liga@lv.com"))
        .await
        .expect("register");
    assert_eq!(directory.search("li").await.expect("search").len(), 1);
    assert_eq!(gateway.read_count(), 1);
}

#[tokio::test]
async fn registrations_append_rather_than_rewrite() {
    let gateway = MemoryGateway::new();
    let first = UserDirectory::new(gateway.clone());
    let second = UserDirectory::new(gateway.clone());
    first
        .register(user("Anna Berzina", "anna@lv.com"))
        .await
        .expect("first");
    second
        .register(user("Liga Kalnina", "liga@lv.com"))
        .await
        .expect("second");
    assert_eq!(gateway.list("users").await.len(), 2);
}

#[tokio::test]
async fn repeated_entries_are_collapsed() {
    let gateway = MemoryGateway::new();
    gateway
        .put(
            "users",
            json!([
                { "name": "Anna Berzina", "email": "anna-lv-com" },
                { "name": "Anna B.", "email": "anna-lv-com" }
            ]),
        )
        .await
        .expect("seed");
    let directory = UserDirectory::new(gateway.clone());
    let users = directory.all().await.expect("all");
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].name, "Anna Berzina");
}

#[tokio::test]
async fn unreachable_directory_reports_sync_unavailable() {
    let gateway = MemoryGateway::new();
    gateway.fail_reads(true);
    let directory = UserDirectory::new(gateway.clone());
    let err = directory.search("an").await.expect_err("offline");
    assert!(matches!(err, SyncError::SyncUnavailable(_)));
}
