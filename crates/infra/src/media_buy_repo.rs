//! Media-buy persistence: event streams plus a serialized audit trail.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use salesagent_core::TenantId;
use salesagent_events::EventRecord;
use salesagent_media_buy::{MediaBuy, MediaBuyEvent, MediaBuyId};

#[derive(Debug, Clone, thiserror::Error)]
pub enum RepositoryError {
    #[error("concurrency conflict: {0}")]
    Concurrency(String),
    #[error("tenant isolation violation")]
    TenantIsolation,
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("repository storage error: {0}")]
    Storage(String),
}

#[async_trait::async_trait]
pub trait MediaBuyRepository: Send + Sync {
    /// Append events. `expected_version` is the version the caller rebuilt
    /// the media buy at (0 for a new one).
    async fn append(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
        expected_version: u64,
        events: &[MediaBuyEvent],
    ) -> Result<(), RepositoryError>;

    async fn load(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
    ) -> Result<Option<MediaBuy>, RepositoryError>;

    /// Serialized events of one media buy, oldest first.
    async fn audit_log(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
    ) -> Result<Vec<EventRecord>, RepositoryError>;
}

#[async_trait::async_trait]
impl<S> MediaBuyRepository for Arc<S>
where
    S: MediaBuyRepository + ?Sized,
{
    async fn append(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
        expected_version: u64,
        events: &[MediaBuyEvent],
    ) -> Result<(), RepositoryError> {
        (**self)
            .append(tenant_id, media_buy_id, expected_version, events)
            .await
    }

    async fn load(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
    ) -> Result<Option<MediaBuy>, RepositoryError> {
        (**self).load(tenant_id, media_buy_id).await
    }

    async fn audit_log(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        (**self).audit_log(tenant_id, media_buy_id).await
    }
}

fn event_stream(event: &MediaBuyEvent) -> (TenantId, MediaBuyId) {
    match event {
        MediaBuyEvent::MediaBuyCreated(e) => (e.tenant_id, e.media_buy_id),
        MediaBuyEvent::MediaBuyApproved(e) => (e.tenant_id, e.media_buy_id),
        MediaBuyEvent::MediaBuyRejected(e) => (e.tenant_id, e.media_buy_id),
        MediaBuyEvent::AdServerOrderRecorded(e) => (e.tenant_id, e.media_buy_id),
        MediaBuyEvent::AdServerOrderFailed(e) => (e.tenant_id, e.media_buy_id),
    }
}

#[derive(Debug, Default)]
struct Stream {
    events: Vec<MediaBuyEvent>,
    records: Vec<EventRecord>,
}

/// In-memory media-buy repository for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMediaBuyRepository {
    streams: RwLock<HashMap<MediaBuyId, (TenantId, Stream)>>,
}

impl InMemoryMediaBuyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Storage("lock poisoned".to_string())
}

#[async_trait::async_trait]
impl MediaBuyRepository for InMemoryMediaBuyRepository {
    async fn append(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
        expected_version: u64,
        events: &[MediaBuyEvent],
    ) -> Result<(), RepositoryError> {
        let mut records = Vec::with_capacity(events.len());
        for event in events {
            let (event_tenant, event_id) = event_stream(event);
            if event_tenant != tenant_id {
                return Err(RepositoryError::TenantIsolation);
            }
            if event_id != media_buy_id {
                return Err(RepositoryError::Concurrency(format!(
                    "event targets media buy {event_id}, not {media_buy_id}"
                )));
            }
            records.push(
                EventRecord::from_typed(tenant_id, media_buy_id.to_string(), event)
                    .map_err(|e| RepositoryError::Serialization(e.to_string()))?,
            );
        }

        let mut streams = self.streams.write().map_err(poisoned)?;
        let (owner, stream) = streams
            .entry(media_buy_id)
            .or_insert_with(|| (tenant_id, Stream::default()));
        if *owner != tenant_id {
            return Err(RepositoryError::TenantIsolation);
        }
        if stream.events.len() as u64 != expected_version {
            return Err(RepositoryError::Concurrency(format!(
                "expected version {expected_version}, found {}",
                stream.events.len()
            )));
        }
        stream.events.extend_from_slice(events);
        stream.records.extend(records);
        Ok(())
    }

    async fn load(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
    ) -> Result<Option<MediaBuy>, RepositoryError> {
        let streams = self.streams.read().map_err(poisoned)?;
        match streams.get(&media_buy_id) {
            None => Ok(None),
            Some((owner, _)) if *owner != tenant_id => Err(RepositoryError::TenantIsolation),
            Some((_, stream)) if stream.events.is_empty() => Ok(None),
            Some((_, stream)) => Ok(Some(MediaBuy::from_events(media_buy_id, &stream.events))),
        }
    }

    async fn audit_log(
        &self,
        tenant_id: TenantId,
        media_buy_id: MediaBuyId,
    ) -> Result<Vec<EventRecord>, RepositoryError> {
        let streams = self.streams.read().map_err(poisoned)?;
        match streams.get(&media_buy_id) {
            None => Ok(Vec::new()),
            Some((owner, _)) if *owner != tenant_id => Err(RepositoryError::TenantIsolation),
            Some((_, stream)) => Ok(stream.records.clone()),
        }
    }
}
