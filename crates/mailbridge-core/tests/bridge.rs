//! End-to-end checks of the bridge against the in-process IMAP server.

#![allow(
    clippy::unwrap_used,
    clippy::redundant_clone,
    clippy::manual_string_new,
    clippy::needless_collect,
    clippy::unreadable_literal,
    clippy::used_underscore_items,
    clippy::similar_names
)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use mailbridge_core::{
    Bridge, BridgeError, CHECKING, ChatId, CheckOptions, Connector, DeleteOutcome,
    DeleteStrategy, Event, GREETING, NO_NEW_MESSAGES, Reference,
};
use mailbridge_imap::{Uid, UidSet};
use support::{FakeServer, PASSWORD, RecordingSink, USER, config, garbage, message, simple};

const CHAT: ChatId = ChatId(42);

fn bridge(server: &FakeServer) -> Bridge<FakeServer, RecordingSink> {
    Bridge::new(server.clone(), RecordingSink::new(), config())
}

fn uid(n: u32) -> Option<Uid> {
    Uid::new(n)
}

async fn check(bridge: &Bridge<FakeServer, RecordingSink>) {
    bridge.handle(Event::Check { chat: CHAT }).await;
}

async fn delete(bridge: &Bridge<FakeServer, RecordingSink>, token: &str) {
    bridge
        .handle(Event::Delete {
            chat: CHAT,
            token: token.to_string(),
        })
        .await;
}

fn last_text(bridge: &Bridge<FakeServer, RecordingSink>) -> String {
    bridge.sink().texts().pop().unwrap()
}

#[tokio::test]
async fn nothing_unread_reports_once_and_skips_fetch() {
    let server = FakeServer::new();
    let bridge = bridge(&server);

    check(&bridge).await;

    let texts = bridge.sink().texts();
    assert_eq!(texts, vec![CHECKING.to_string(), NO_NEW_MESSAGES.to_string()]);
    assert_eq!(texts.iter().filter(|t| *t == NO_NEW_MESSAGES).count(), 1);
    assert_eq!(server.count("FETCH"), 0);
    assert_eq!(server.count("SEARCH UNSEEN UNDELETED"), 1);
    assert_eq!(server.count("LOGOUT"), 1);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn check_is_read_only_by_default() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("hello"));
    let bridge = bridge(&server);

    check(&bridge).await;

    let commands = server.commands();
    assert_eq!(
        commands,
        vec![
            format!("LOGIN {} {}", support::USER, support::PASSWORD),
            "EXAMINE INBOX".to_string(),
            "SEARCH UNSEEN UNDELETED".to_string(),
            "FETCH 1 (UID BODY.PEEK[])".to_string(),
            "LOGOUT".to_string(),
        ]
    );
    assert!(server.messages("INBOX").iter().all(|m| !m.seen));
}

#[tokio::test]
async fn missing_headers_render_placeholders() {
    let server = FakeServer::new();
    server.deliver("INBOX", message(None, None, None, "body only"));
    let bridge = bridge(&server);

    check(&bridge).await;

    let summary = last_text(&bridge);
    assert!(summary.starts_with("#1\n"), "{summary}");
    assert!(summary.contains("From: unknown sender"));
    assert!(summary.contains("Subject: (no subject)"));
    assert!(summary.contains("Date: unknown date"));
}

#[tokio::test]
async fn summary_shows_sender_subject_and_local_date() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("Quarterly report"));
    let bridge = bridge(&server);

    check(&bridge).await;

    let deliveries = bridge.sink().deliveries();
    assert_eq!(deliveries[1].text(), "1 new message:");
    let summary = deliveries[2].text();
    assert!(summary.contains("From: Alice Example <alice@example.com>"));
    assert!(summary.contains("Subject: Quarterly report"));
    // 09:30 UTC shown at +03:00.
    assert!(summary.contains("Date: 14.09.2026 12:30"), "{summary}");
    let labels: Vec<&str> = deliveries[2]
        .buttons()
        .iter()
        .map(|b| b.label.as_str())
        .collect();
    assert_eq!(labels, vec!["Delete #1", "Check again"]);
}

#[tokio::test]
async fn reference_resolves_to_its_uid() {
    let server = FakeServer::new().with_next_uid("INBOX", 4711);
    server.deliver("INBOX", simple("one"));
    let bridge = bridge(&server);

    check(&bridge).await;

    assert_eq!(bridge.cache().get(CHAT, &Reference::current("1")), uid(4711));
    assert_eq!(bridge.cache().get(ChatId(7), &Reference::current("1")), None);
}

#[tokio::test]
async fn two_unread_then_delete_second() {
    let server = FakeServer::new()
        .with_capability("UIDPLUS")
        .with_next_uid("INBOX", 101);
    server.deliver("INBOX", simple("first"));
    let server = server.with_next_uid("INBOX", 205);
    server.deliver("INBOX", simple("second"));
    let bridge = bridge(&server);

    check(&bridge).await;
    assert_eq!(bridge.cache().get(CHAT, &Reference::current("1")), uid(101));
    assert_eq!(bridge.cache().get(CHAT, &Reference::current("2")), uid(205));

    delete(&bridge, "2").await;

    assert_eq!(last_text(&bridge), "Message #2 deleted.");
    let commands = server.commands();
    let store = commands
        .iter()
        .position(|c| c == "UID STORE 205 +FLAGS.SILENT (\\Deleted)")
        .unwrap();
    let expunge = commands.iter().position(|c| c == "UID EXPUNGE 205").unwrap();
    assert!(store < expunge);
    assert!(commands.contains(&"SELECT INBOX".to_string()));

    let left: Vec<u32> = server.messages("INBOX").iter().map(|m| m.uid).collect();
    assert_eq!(left, vec![101]);
    assert_eq!(bridge.cache().get(CHAT, &Reference::current("2")), None);
    assert_eq!(bridge.cache().get(CHAT, &Reference::current("1")), uid(101));
    assert_eq!(server.count("LOGOUT"), 2);
}

#[tokio::test]
async fn deleting_twice_is_stale_not_a_protocol_error() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("once"));
    let bridge = bridge(&server);
    check(&bridge).await;

    let (reference, outcome) = bridge.delete(CHAT, "1").await.unwrap();
    assert_eq!(reference.key, "1");
    assert_eq!(outcome, DeleteOutcome::Expunged);

    let again = bridge.delete(CHAT, "1").await.unwrap_err();
    assert!(matches!(again, BridgeError::StaleReference { reference } if reference == "1"));

    delete(&bridge, "#1").await;
    assert_eq!(last_text(&bridge), "Message not found, please check mail again.");
    // The stale lookups never reached the server.
    assert_eq!(server.connections(), 2);
}

#[tokio::test]
async fn message_gone_on_server_is_stale() {
    let server = FakeServer::new();
    let gone = server.deliver("INBOX", simple("vanishing"));
    let bridge = bridge(&server);
    check(&bridge).await;

    server.remove("INBOX", gone);
    delete(&bridge, "1").await;

    assert_eq!(last_text(&bridge), "Message not found, please check mail again.");
    assert_eq!(server.count("UID STORE"), 0);
    assert_eq!(bridge.cache().get(CHAT, &Reference::current("1")), None);
    assert_eq!(server.count("LOGOUT"), 2);
}

#[tokio::test]
async fn button_from_an_older_check_is_stale() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("old"));
    let bridge = bridge(&server);

    check(&bridge).await;
    let old_token = bridge
        .sink()
        .actions()
        .into_iter()
        .find(|a| a.starts_with("del:"))
        .unwrap();
    server.deliver("INBOX", simple("new"));
    check(&bridge).await;

    delete(&bridge, &old_token).await;

    assert_eq!(last_text(&bridge), "Message not found, please check mail again.");
    assert_eq!(server.messages("INBOX").len(), 2);
    assert_eq!(server.count("UID STORE"), 0);
}

#[tokio::test]
async fn unparseable_message_is_skipped() {
    let server = FakeServer::new();
    for n in 1..=5 {
        if n == 3 {
            server.deliver("INBOX", garbage());
        } else {
            server.deliver("INBOX", simple(&format!("message {n}")));
        }
    }
    let bridge = bridge(&server);

    let report = bridge.check().await.unwrap();
    assert_eq!(report.summaries.len(), 4);
    assert_eq!(report.failures, 1);
    let seqs: Vec<u32> = report.summaries.iter().map(|s| s.seq.get()).collect();
    assert_eq!(seqs, vec![1, 2, 4, 5]);

    check(&bridge).await;
    let texts = bridge.sink().texts();
    assert_eq!(texts[1], "4 new messages:");
    let body = &texts[2];
    assert_eq!(body.matches("\nFrom: ").count(), 4);
    assert!(body.ends_with("1 message(s) could not be read."));
}

#[tokio::test]
async fn rejected_credentials_stop_before_search() {
    let server = FakeServer::new().rejecting_logins();
    server.deliver("INBOX", simple("unreachable"));
    let bridge = bridge(&server);

    let err = bridge.check().await.unwrap_err();
    assert!(matches!(err, BridgeError::Authentication(_)));

    check(&bridge).await;
    assert_eq!(
        last_text(&bridge),
        "The mail server rejected the login. Check the username and password."
    );
    assert_eq!(server.count("SEARCH"), 0);
    assert_eq!(server.count("FETCH"), 0);
    assert_eq!(server.count("EXAMINE"), 0);
}

#[tokio::test]
async fn missing_folder_is_reported() {
    let server = FakeServer::new();
    let mut config = config();
    config.mail.folder = "Archive".to_string();
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);

    let err = bridge.check().await.unwrap_err();
    assert!(matches!(err, BridgeError::Folder { ref folder, .. } if folder == "Archive"));
    assert_eq!(server.count("SEARCH"), 0);
    assert_eq!(server.connections(), 1);
}

#[tokio::test]
async fn limit_leaves_the_rest_waiting() {
    let server = FakeServer::new();
    for n in 1..=3 {
        server.deliver("INBOX", simple(&format!("m{n}")));
    }
    let config = config().with_check(CheckOptions {
        max_messages: 2,
        ..CheckOptions::default()
    });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);

    check(&bridge).await;

    assert_eq!(bridge.sink().texts()[1], "2 new messages shown, 1 more waiting:");
    assert!(server.commands().contains(&"FETCH 1:2 (UID BODY.PEEK[])".to_string()));
}

#[tokio::test]
async fn mark_seen_selects_and_fetches_body() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("read me"));
    let config = config().with_check(CheckOptions {
        mark_seen: true,
        ..CheckOptions::default()
    });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);

    check(&bridge).await;

    let commands = server.commands();
    assert!(commands.contains(&"SELECT INBOX".to_string()));
    assert!(commands.contains(&"FETCH 1 (UID BODY[])".to_string()));
    assert!(server.messages("INBOX")[0].seen);

    check(&bridge).await;
    assert_eq!(last_text(&bridge), NO_NEW_MESSAGES);
}

#[tokio::test]
async fn excerpt_is_appended() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("with excerpt"));
    let config = config().with_check(CheckOptions {
        excerpt_chars: 5,
        ..CheckOptions::default()
    });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);

    check(&bridge).await;

    assert!(last_text(&bridge).ends_with("\nHello…"), "{}", last_text(&bridge));
}

#[tokio::test]
async fn move_to_discovered_trash() {
    let server = FakeServer::new()
        .with_capability("MOVE")
        .with_folder("Deleted Items", true);
    server.deliver("INBOX", simple("to trash"));
    let config = config().with_delete(DeleteStrategy::MoveToTrash { folder: None });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);
    check(&bridge).await;

    delete(&bridge, "1").await;

    assert_eq!(last_text(&bridge), "Message #1 moved to Deleted Items.");
    assert!(server.messages("INBOX").is_empty());
    assert_eq!(server.messages("Deleted Items").len(), 1);
    assert_eq!(server.count("LIST"), 1);
    assert_eq!(server.count("UID MOVE 1 \"Deleted Items\""), 1);
    assert_eq!(server.count("UID STORE"), 0);
}

#[tokio::test]
async fn copy_then_expunge_without_move() {
    let server = FakeServer::new()
        .with_capability("UIDPLUS")
        .with_folder("Trash", false);
    server.deliver("INBOX", simple("copied"));
    let config = config().with_delete(DeleteStrategy::MoveToTrash {
        folder: Some("Trash".to_string()),
    });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);
    check(&bridge).await;

    delete(&bridge, "1").await;

    assert_eq!(last_text(&bridge), "Message #1 moved to Trash.");
    let commands = server.commands();
    let tail: Vec<&str> = commands.iter().rev().take(4).rev().map(String::as_str).collect();
    assert_eq!(
        tail,
        vec![
            "UID COPY 1 Trash",
            "UID STORE 1 +FLAGS.SILENT (\\Deleted)",
            "UID EXPUNGE 1",
            "LOGOUT"
        ]
    );
    assert_eq!(server.count("LIST"), 1);
    assert_eq!(server.messages("Trash").len(), 1);
}

#[tokio::test]
async fn missing_configured_trash_falls_back_to_expunge() {
    let server = FakeServer::new()
        .with_capability("MOVE")
        .with_capability("UIDPLUS");
    server.deliver("INBOX", simple("no trash here"));
    let config = config().with_delete(DeleteStrategy::MoveToTrash {
        folder: Some("Trash".to_string()),
    });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);
    check(&bridge).await;

    delete(&bridge, "1").await;

    assert_eq!(last_text(&bridge), "Message #1 deleted.");
    assert_eq!(server.count("UID MOVE"), 0);
    assert_eq!(server.count("UID EXPUNGE 1"), 1);
    assert!(server.messages("INBOX").is_empty());
    assert_eq!(server.count("LOGOUT"), 2);
}

#[tokio::test]
async fn connection_lost_while_looking_up_trash() {
    let server = FakeServer::new().hanging_up_on("LIST");
    server.deliver("INBOX", simple("kept"));
    let config = config().with_delete(DeleteStrategy::MoveToTrash { folder: None });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);
    check(&bridge).await;

    delete(&bridge, "1").await;

    let text = last_text(&bridge);
    assert!(text.starts_with("Could not connect to the mail server:"), "{text}");
    assert_eq!(server.count("SELECT"), 0);
    assert_eq!(server.count("UID STORE"), 0);
    assert_eq!(server.messages("INBOX").len(), 1);
    assert_eq!(bridge.cache().get(CHAT, &Reference::current("1")), uid(1));
}

#[tokio::test]
async fn failed_move_leaves_the_source_alone() {
    let server = FakeServer::new().with_capability("MOVE");
    let stored = server.deliver("INBOX", simple("stays"));
    let client = server.connect().await.unwrap();
    let client = client.login(USER, PASSWORD).await.unwrap();
    let mut client = client.select("INBOX").await.unwrap();

    let moved = client
        .uid_move(&UidSet::single(Uid::new(stored).unwrap()), "Nowhere")
        .await;

    assert!(moved.is_err());
    assert_eq!(server.messages("INBOX").len(), 1);
    client.logout().await;
}

#[tokio::test]
async fn no_trash_folder_falls_back_to_expunge() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("plain delete"));
    let config = config().with_delete(DeleteStrategy::MoveToTrash { folder: None });
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);
    check(&bridge).await;

    delete(&bridge, "1").await;

    assert_eq!(last_text(&bridge), "Message #1 deleted.");
    assert!(server.commands().contains(&"EXPUNGE".to_string()));
    assert!(server.messages("INBOX").is_empty());
}

#[tokio::test]
async fn undelivered_summaries_publish_no_references() {
    let server = FakeServer::new();
    server.deliver("INBOX", simple("lost"));
    let bridge = bridge(&server);
    bridge.sink().fail_buttons();

    check(&bridge).await;

    assert_eq!(bridge.cache().get(CHAT, &Reference::current("1")), None);
    delete(&bridge, "1").await;
    assert_eq!(last_text(&bridge), "Message not found, please check mail again.");
}

#[tokio::test]
async fn start_offers_a_check_button() {
    let server = FakeServer::new();
    let bridge = bridge(&server);

    bridge.handle(Event::Start { chat: CHAT }).await;

    let deliveries = bridge.sink().deliveries();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].text(), GREETING);
    assert_eq!(bridge.sink().actions(), vec!["check".to_string()]);
    assert_eq!(server.connections(), 0);
}

#[tokio::test(start_paused = true)]
async fn stalled_server_times_out() {
    let server = FakeServer::new().stalling_on("SEARCH");
    let config = config().with_operation_timeout(Duration::from_secs(5));
    let bridge = Bridge::new(server.clone(), RecordingSink::new(), config);

    check(&bridge).await;

    assert_eq!(last_text(&bridge), "The mail server did not answer in time.");
    assert_eq!(server.count("FETCH"), 0);
    assert_eq!(server.count("LOGOUT"), 1);
}

#[tokio::test]
async fn second_request_while_busy_is_refused() {
    let server = FakeServer::new().stalling_on("FETCH");
    server.deliver("INBOX", simple("slow"));
    let config = config().with_operation_timeout(Duration::from_millis(300));
    let bridge = Arc::new(Bridge::new(server.clone(), RecordingSink::new(), config));

    let first = tokio::spawn({
        let bridge = Arc::clone(&bridge);
        async move { bridge.handle(Event::Check { chat: CHAT }).await }
    });
    while server.count("FETCH") == 0 {
        tokio::task::yield_now().await;
    }

    check(&bridge).await;
    delete(&bridge, "1").await;
    let texts = bridge.sink().texts();
    let busy = "Please wait, the previous request is still running.";
    assert_eq!(texts.iter().filter(|t| *t == busy).count(), 2);

    // Other chats are not blocked.
    bridge.handle(Event::Start { chat: ChatId(1) }).await;
    assert_eq!(last_text(&bridge), GREETING);

    first.await.unwrap();
    assert_eq!(last_text(&bridge), "The mail server did not answer in time.");
    assert_eq!(server.connections(), 1);
    assert_eq!(server.count("LOGOUT"), 1);

    // The slot is free again once the first check finished.
    delete(&bridge, "1").await;
    assert_eq!(last_text(&bridge), "Message not found, please check mail again.");
}
