//! LinkService integration tests
//!
//! Runs the service on the in-memory store with a channel-backed audit
//! subscriber.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::Span;
use urlshrt::config::DeletionConfig;
use urlshrt::errors::{Result, UrlshrtError};
use urlshrt::model::{AuditAction, AuditEvent, BatchShortenRequestItem, UserId};
use urlshrt::services::{AuditNotifier, AuditSubscriber, LinkService};
use urlshrt::storage::MemoryStore;

struct ChannelAudit {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

#[async_trait]
impl AuditSubscriber for ChannelAudit {
    async fn notify(&self, event: &AuditEvent) -> Result<()> {
        let _ = self.tx.send(event.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "channel"
    }
}

fn setup() -> (LinkService, mpsc::UnboundedReceiver<AuditEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let audit = AuditNotifier::new(vec![Arc::new(ChannelAudit { tx })]);
    let deletion = DeletionConfig {
        batch_size: 10,
        batch_timeout_ms: 20,
    };
    let store = MemoryStore::open(None, deletion, Span::none()).unwrap();
    (
        LinkService::new(Arc::new(store), "http://localhost:8080", audit),
        rx,
    )
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<AuditEvent>) -> AuditEvent {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("audit event not delivered")
        .expect("audit channel closed")
}

fn item(correlation_id: &str, url: &str) -> BatchShortenRequestItem {
    BatchShortenRequestItem {
        correlation_id: correlation_id.to_string(),
        original_url: url.to_string(),
    }
}

#[tokio::test]
async fn test_shorten_then_lengthen() {
    let (service, mut rx) = setup();
    let user = service.create_user().await.unwrap();

    let short = service.shorten(user, "https://practicum.yandex.ru").await.unwrap();
    assert_eq!(short, "http://localhost:8080/0");

    let url = service.lengthen(user, "0").await.unwrap();
    assert_eq!(url, "https://practicum.yandex.ru");

    let shorten = next_event(&mut rx).await;
    assert_eq!(shorten.action, AuditAction::Shorten);
    assert_eq!(shorten.user_id, user);
    assert_eq!(shorten.url, "https://practicum.yandex.ru");

    let follow = next_event(&mut rx).await;
    assert_eq!(follow.action, AuditAction::Follow);
}

#[tokio::test]
async fn test_ids_are_case_insensitive() {
    let (service, _rx) = setup();
    let user = service.create_user().await.unwrap();
    let mut last = String::new();
    for i in 0..11 {
        last = service
            .shorten(user, &format!("https://example.com/{}", i))
            .await
            .unwrap();
    }

    assert!(last.ends_with("/a"));
    assert_eq!(
        service.lengthen(user, "A").await.unwrap(),
        "https://example.com/10"
    );
}

#[tokio::test]
async fn test_duplicate_shorten_still_audited() {
    let (service, mut rx) = setup();
    let user = service.create_user().await.unwrap();
    service.shorten(user, "https://example.com").await.unwrap();
    let _ = next_event(&mut rx).await;

    let err = service.shorten(user, "https://example.com").await.unwrap_err();
    assert!(matches!(err, UrlshrtError::DuplicateUrl { .. }));
    assert_eq!(
        service.existing_short_url(&err).as_deref(),
        Some("http://localhost:8080/0")
    );
    assert_eq!(next_event(&mut rx).await.action, AuditAction::Shorten);
}

#[tokio::test]
async fn test_batch_shorten_keeps_correlation_ids() {
    let (service, _rx) = setup();
    let user = service.create_user().await.unwrap();

    let result = service
        .batch_shorten(
            user,
            vec![
                item("first", "https://example.com/1"),
                item("second", "https://example.com/2"),
            ],
        )
        .await
        .unwrap();

    assert!(!result.duplicate);
    assert_eq!(result.items.len(), 2);
    assert_eq!(result.items[0].correlation_id, "first");
    assert_eq!(result.items[0].short_url, "http://localhost:8080/0");
    assert_eq!(result.items[1].correlation_id, "second");
    assert_eq!(result.items[1].short_url, "http://localhost:8080/1");
}

#[tokio::test]
async fn test_batch_shorten_reports_duplicates() {
    let (service, _rx) = setup();
    let user = service.create_user().await.unwrap();
    service.shorten(user, "https://example.com/1").await.unwrap();

    let result = service
        .batch_shorten(
            user,
            vec![
                item("a", "https://example.com/1"),
                item("b", "https://example.com/2"),
            ],
        )
        .await
        .unwrap();

    assert!(result.duplicate);
    assert_eq!(result.items[0].short_url, "http://localhost:8080/0");
    assert_eq!(result.items[1].short_url, "http://localhost:8080/1");
}

#[tokio::test]
async fn test_repeated_batch_echoes_new_correlation_id() {
    let (service, _rx) = setup();
    let user = service.create_user().await.unwrap();

    let first = service
        .batch_shorten(user, vec![item("req-1", "https://example.com/same")])
        .await
        .unwrap();
    assert!(!first.duplicate);

    let second = service
        .batch_shorten(user, vec![item("req-2", "https://example.com/same")])
        .await
        .unwrap();
    assert!(second.duplicate);
    assert_eq!(second.items.len(), 1);
    assert_eq!(second.items[0].correlation_id, "req-2");
    assert_eq!(second.items[0].short_url, first.items[0].short_url);
}

#[tokio::test]
async fn test_lengthen_errors() {
    let (service, _rx) = setup();
    let user = UserId::new(0);

    assert!(matches!(
        service.lengthen(user, "zz").await,
        Err(UrlshrtError::NotFound(_))
    ));
    assert!(matches!(
        service.lengthen(user, "not-an-id").await,
        Err(UrlshrtError::MalformedIdentifier(_))
    ));
}

#[tokio::test]
async fn test_user_urls_and_batch_delete() {
    let (service, _rx) = setup();
    let alice = service.create_user().await.unwrap();
    let bob = service.create_user().await.unwrap();

    service.shorten(alice, "https://example.com/a").await.unwrap();
    service.shorten(bob, "https://example.com/b").await.unwrap();

    let urls = service.user_urls(alice).await.unwrap();
    assert_eq!(urls.len(), 1);
    assert_eq!(urls[0].short_url, "http://localhost:8080/0");
    assert_eq!(urls[0].original_url, "https://example.com/a");

    // bob 无权删除 alice 的链接
    service
        .batch_delete(bob, &["0".to_string(), "1".to_string()])
        .await
        .unwrap();
    service.store().shutdown().await;

    assert_eq!(
        service.lengthen(alice, "0").await.unwrap(),
        "https://example.com/a"
    );
    assert!(matches!(
        service.lengthen(bob, "1").await,
        Err(UrlshrtError::Gone(_))
    ));
}

#[tokio::test]
async fn test_ping() {
    let (service, _rx) = setup();
    assert!(service.ping().await.is_ok());
}
