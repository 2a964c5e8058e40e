use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::error::RecordError;
use crate::core::types::{UserId, VideoId, VideoRecord};

// ---------------------------------------------------------------------------
// VideoStore trait
// ---------------------------------------------------------------------------

/// The video-record store collaborator.
///
/// The ingestion pipeline reads a record once (done by the handler, to check
/// ownership) and writes it once, setting only the URL field; it never
/// creates or deletes records. `create` and `list_by_owner` exist for the
/// surrounding API surface.
#[async_trait]
pub trait VideoStore: Send + Sync {
    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, RecordError>;

    async fn create(&self, record: VideoRecord) -> Result<(), RecordError>;

    async fn update(&self, record: &VideoRecord) -> Result<(), RecordError>;

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<VideoRecord>, RecordError>;
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// In-memory record store for development and tests.
pub struct InMemoryVideoStore {
    records: Mutex<HashMap<VideoId, VideoRecord>>,
}

impl InMemoryVideoStore {
    pub fn new() -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVideoStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VideoStore for InMemoryVideoStore {
    async fn get(&self, id: VideoId) -> Result<Option<VideoRecord>, RecordError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        Ok(records.get(&id).cloned())
    }

    async fn create(&self, record: VideoRecord) -> Result<(), RecordError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.insert(record.id, record);
        Ok(())
    }

    async fn update(&self, record: &VideoRecord) -> Result<(), RecordError> {
        let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        match records.get_mut(&record.id) {
            Some(existing) => {
                *existing = record.clone();
                Ok(())
            }
            None => Err(RecordError::NotFound {
                id: record.id.to_string(),
            }),
        }
    }

    async fn list_by_owner(&self, owner: UserId) -> Result<Vec<VideoRecord>, RecordError> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        let mut owned: Vec<VideoRecord> = records
            .values()
            .filter(|r| r.owner_id == owner)
            .cloned()
            .collect();
        owned.sort_by_key(|r| r.created_at);
        Ok(owned)
    }
}
