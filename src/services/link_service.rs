//! Link management service
//!
//! Business logic shared by the HTTP handlers: builds short URLs from store
//! ids, decodes textual ids, and emits audit events.

use std::sync::Arc;

use tracing::{debug, info};

use super::audit::AuditNotifier;
use crate::errors::{Result, UrlshrtError};
use crate::model::{
    AuditAction, AuditEvent, BatchShortenRequestItem, BatchShortenResponseItem, LinkId, UserId,
    UrlsByUserResponseItem,
};
use crate::storage::LinkStore;

/// Result of a batch shorten
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchShortenResult {
    /// One item per request item, in request order
    pub items: Vec<BatchShortenResponseItem>,
    /// Whether any URL was already stored
    pub duplicate: bool,
}

/// Service for link operations
pub struct LinkService {
    store: Arc<dyn LinkStore>,
    base_url: String,
    audit: AuditNotifier,
}

impl LinkService {
    pub fn new(store: Arc<dyn LinkStore>, base_url: impl Into<String>, audit: AuditNotifier) -> Self {
        Self {
            store,
            base_url: base_url.into(),
            audit,
        }
    }

    pub fn store(&self) -> &Arc<dyn LinkStore> {
        &self.store
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full short URL for a stored id
    pub fn short_url(&self, id: LinkId) -> String {
        id.short_url(&self.base_url)
    }

    /// Shorten one URL and fire a `shorten` audit event
    ///
    /// On `DuplicateUrl` the error carries the existing id; the caller can
    /// build its short URL with [`LinkService::short_url`].
    pub async fn shorten(&self, user: UserId, url: &str) -> Result<String> {
        let result = self.store.put(user, url).await;
        self.audit
            .notify(AuditEvent::now(AuditAction::Shorten, user, url));

        let id = result?;
        debug!("Link {} created for user {}", id, user);
        Ok(self.short_url(id))
    }

    /// Shorten a batch of URLs, preserving correlation ids and order
    pub async fn batch_shorten(
        &self,
        user: UserId,
        items: Vec<BatchShortenRequestItem>,
    ) -> Result<BatchShortenResult> {
        let urls: Vec<String> = items.iter().map(|i| i.original_url.clone()).collect();
        let outcome = self.store.batch_put(user, &urls).await?;

        if let Some(err) = outcome.duplicate_error() {
            debug!("Batch shorten for user {}: {}", user, err);
        }

        let items = items
            .into_iter()
            .zip(&outcome.ids)
            .map(|(item, &id)| BatchShortenResponseItem {
                correlation_id: item.correlation_id,
                short_url: self.short_url(id),
            })
            .collect();

        Ok(BatchShortenResult {
            items,
            duplicate: outcome.has_duplicates(),
        })
    }

    /// Resolve a textual id to its original URL
    pub async fn lengthen(&self, user: UserId, text_id: &str) -> Result<String> {
        let id = LinkId::decode(text_id)?;
        let url = self.store.get(id).await?;
        self.audit
            .notify(AuditEvent::now(AuditAction::Follow, user, url.as_str()));
        Ok(url)
    }

    /// All links of a user ordered by id, deleted ones included
    pub async fn user_urls(&self, user: UserId) -> Result<Vec<UrlsByUserResponseItem>> {
        let links = self.store.user_links(user).await?;
        Ok(links
            .into_iter()
            .map(|(id, url)| UrlsByUserResponseItem {
                short_url: self.short_url(id),
                original_url: url,
            })
            .collect())
    }

    /// Queue deletion of textual ids; nothing is queued if any id is malformed
    pub async fn batch_delete(&self, user: UserId, text_ids: &[String]) -> Result<()> {
        let ids = text_ids
            .iter()
            .map(|t| LinkId::decode(t))
            .collect::<Result<Vec<_>>>()?;

        self.store.request_delete(user, &ids).await?;
        info!("Queued {} deletions for user {}", ids.len(), user);
        Ok(())
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }

    pub async fn create_user(&self) -> Result<UserId> {
        self.store.create_user().await
    }

    /// Short URL of the existing link behind a `DuplicateUrl` error
    pub fn existing_short_url(&self, err: &UrlshrtError) -> Option<String> {
        err.existing_id().map(|id| self.short_url(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeletionConfig;
    use crate::storage::MemoryStore;
    use tracing::Span;

    fn service() -> LinkService {
        let store = MemoryStore::open(None, DeletionConfig::default(), Span::none()).unwrap();
        LinkService::new(Arc::new(store), "http://sho.rt/", AuditNotifier::default())
    }

    #[tokio::test]
    async fn test_shorten_builds_short_url() {
        let service = service();
        let url = service.shorten(UserId::new(1), "http://a.com").await.unwrap();
        assert_eq!(url, "http://sho.rt/0");
    }

    #[tokio::test]
    async fn test_duplicate_short_url_recoverable() {
        let service = service();
        service.shorten(UserId::new(1), "http://a.com").await.unwrap();

        let err = service
            .shorten(UserId::new(2), "http://a.com")
            .await
            .unwrap_err();
        assert_eq!(
            service.existing_short_url(&err).as_deref(),
            Some("http://sho.rt/0")
        );
    }

    #[tokio::test]
    async fn test_batch_delete_rejects_malformed_before_queueing() {
        let service = service();
        let user = UserId::new(1);
        service.shorten(user, "http://a.com").await.unwrap();

        let err = service
            .batch_delete(user, &["0".to_string(), "not-valid".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, UrlshrtError::MalformedIdentifier(_)));

        service.store().shutdown().await;
        assert_eq!(service.lengthen(user, "0").await.unwrap(), "http://a.com");
    }
}
