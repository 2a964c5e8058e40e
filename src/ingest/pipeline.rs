use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chrono::Utc;
use futures::Stream;
use tracing::{info, warn};

use crate::core::config::UploadConfig;
use crate::core::error::IngestError;
use crate::core::types::{VideoRecord, VIDEO_CONTENT_TYPE};
use crate::observability::metrics as obs;
use crate::records::VideoStore;
use crate::storage::key::StorageKey;
use crate::storage::MediaStore;

use super::probe::Prober;
use super::stage::{self, TempFileGuard};
use super::transcode::Remuxer;

// ---------------------------------------------------------------------------
// Ingestion orchestrator
// ---------------------------------------------------------------------------

/// Sequences one video ingestion from inbound bytes to a persisted URL:
///
/// `Received → Staged → Transcoded → Probed → Uploaded → Persisted`
///
/// The orchestrator is the sole owner of both temp files; their guards are
/// created at acquisition so every exit path, success or failure, deletes
/// them. Ordering is strict: the probe runs only on the transcoded output,
/// and the upload only after a successful probe. No stage is retried; a
/// failure is terminal for the request and scoped to it.
pub struct IngestPipeline {
    config: UploadConfig,
    remuxer: Arc<dyn Remuxer>,
    prober: Arc<dyn Prober>,
    store: Arc<dyn MediaStore>,
    videos: Arc<dyn VideoStore>,
}

impl IngestPipeline {
    pub fn new(
        config: UploadConfig,
        remuxer: Arc<dyn Remuxer>,
        prober: Arc<dyn Prober>,
        store: Arc<dyn MediaStore>,
        videos: Arc<dyn VideoStore>,
    ) -> Self {
        Self {
            config,
            remuxer,
            prober,
            store,
            videos,
        }
    }

    /// Run the full pipeline for one upload.
    ///
    /// `record` is the owning video record, already fetched and
    /// ownership-checked by the caller. On success the updated record
    /// (with its new URL) is returned; the record store has been written.
    pub async fn ingest<S, E>(
        &self,
        record: VideoRecord,
        declared_content_type: &str,
        body: S,
    ) -> Result<VideoRecord, IngestError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let result = self.run(record, declared_content_type, body).await;

        match &result {
            Ok(record) => {
                obs::inc_ingest_outcome("success");
                obs::record_ingest_duration(start.elapsed().as_secs_f64());
                info!(video_id = %record.id, "video ingestion complete");
            }
            Err(e) => {
                obs::inc_ingest_failure(e.stage());
                obs::record_ingest_duration(start.elapsed().as_secs_f64());
                warn!(stage = e.stage(), error = %e, "video ingestion failed");
            }
        }

        result
    }

    async fn run<S, E>(
        &self,
        mut record: VideoRecord,
        declared_content_type: &str,
        body: S,
    ) -> Result<VideoRecord, IngestError>
    where
        S: Stream<Item = Result<Bytes, E>> + Unpin,
        E: std::fmt::Display,
    {
        // Received → Rejected: content type is checked before any local I/O
        // or process spawn, so a bad request allocates nothing.
        if declared_content_type != VIDEO_CONTENT_TYPE {
            return Err(IngestError::UnsupportedContentType {
                expected: VIDEO_CONTENT_TYPE.to_string(),
                actual: declared_content_type.to_string(),
            });
        }

        let staging_dir = PathBuf::from(&self.config.staging_dir);
        tokio::fs::create_dir_all(&staging_dir).await?;

        // Received → Staged
        let token = stage::request_token();
        let staged = TempFileGuard::new(stage::staged_path(&staging_dir, record.id, &token));
        let size_bytes =
            stage::materialize(body, staged.path(), self.config.max_upload_size_bytes).await?;
        obs::record_upload_size(size_bytes as f64);

        // Staged → Transcoded
        let transcoded =
            TempFileGuard::new(stage::transcoded_path(&staging_dir, record.id, &token));
        self.remuxer.remux(staged.path(), transcoded.path()).await?;
        // Both files hold the same payload and only the transcoded one is
        // needed past this point; release the staged copy now.
        drop(staged);

        // Transcoded → Probed
        let orientation = self.prober.probe(transcoded.path()).await?;

        // Probed → Uploaded
        let key = StorageKey::derive(orientation);
        self.store
            .put_file(key.as_str(), transcoded.path(), VIDEO_CONTENT_TYPE)
            .await?;

        // Uploaded → Persisted
        let url = self.store.public_url(key.as_str());
        record.video_url = Some(url.clone());
        record.updated_at = Utc::now();
        if let Err(e) = self.videos.update(&record).await {
            // The object is already stored and there is no compensating
            // delete; the orphaned key is logged so an operator can reclaim it.
            warn!(
                video_id = %record.id,
                key = key.as_str(),
                error = %e,
                "record update failed after upload; stored object is orphaned"
            );
            return Err(IngestError::Persist(e));
        }

        info!(
            video_id = %record.id,
            %orientation,
            size_bytes,
            url = %url,
            "video uploaded and record updated"
        );
        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use crate::core::error::{ProbeError, RecordError, StorageError, TranscodeError};
    use crate::core::types::{Orientation, UserId};
    use crate::records::InMemoryVideoStore;
    use crate::storage::memory::InMemoryMediaStore;

    // -- Fakes ------------------------------------------------------------

    /// Remuxer fake: copies input to output, counting invocations.
    struct CopyRemuxer {
        calls: AtomicUsize,
        fail: bool,
    }

    impl CopyRemuxer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    #[async_trait]
    impl Remuxer for CopyRemuxer {
        async fn remux(&self, input: &Path, output: &Path) -> Result<(), TranscodeError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TranscodeError::ExitFailure {
                    status: "exit status: 1".to_string(),
                    stderr: "moov atom not found".to_string(),
                });
            }
            tokio::fs::copy(input, output)
                .await
                .map_err(|e| TranscodeError::UnreadableOutput {
                    path: output.display().to_string(),
                    reason: e.to_string(),
                })?;
            Ok(())
        }
    }

    /// Prober fake answering with a fixed ratio string.
    struct FixedProber {
        ratio: &'static str,
    }

    #[async_trait]
    impl Prober for FixedProber {
        async fn probe(&self, _path: &Path) -> Result<Orientation, ProbeError> {
            Ok(Orientation::from_display_aspect_ratio(self.ratio))
        }
    }

    /// Prober fake that always fails structurally.
    struct BrokenProber;

    #[async_trait]
    impl Prober for BrokenProber {
        async fn probe(&self, _path: &Path) -> Result<Orientation, ProbeError> {
            Err(ProbeError::NoStreams)
        }
    }

    /// Store fake that always fails the PUT.
    struct FailingMediaStore;

    #[async_trait]
    impl MediaStore for FailingMediaStore {
        async fn put_file(
            &self,
            key: &str,
            _path: &Path,
            _content_type: &str,
        ) -> Result<(), StorageError> {
            Err(StorageError::PutFailed {
                key: key.to_string(),
                reason: "connection refused".to_string(),
            })
        }

        fn public_url(&self, key: &str) -> String {
            format!("https://unused.example/{}", key)
        }
    }

    /// Record store fake whose update always fails.
    struct FailingVideoStore;

    #[async_trait]
    impl VideoStore for FailingVideoStore {
        async fn get(
            &self,
            _id: crate::core::types::VideoId,
        ) -> Result<Option<VideoRecord>, RecordError> {
            Ok(None)
        }

        async fn create(&self, _record: VideoRecord) -> Result<(), RecordError> {
            Ok(())
        }

        async fn update(&self, _record: &VideoRecord) -> Result<(), RecordError> {
            Err(RecordError::Backend {
                reason: "database unavailable".to_string(),
            })
        }

        async fn list_by_owner(
            &self,
            _owner: UserId,
        ) -> Result<Vec<VideoRecord>, RecordError> {
            Ok(Vec::new())
        }
    }

    // -- Harness ----------------------------------------------------------

    const BUCKET: &str = "clips-test";
    const REGION: &str = "eu-west-2";

    struct Harness {
        pipeline: IngestPipeline,
        media: Arc<InMemoryMediaStore>,
        videos: Arc<InMemoryVideoStore>,
        record: VideoRecord,
        // Held so the staging dir outlives the test body.
        staging: tempfile::TempDir,
    }

    impl Harness {
        fn staging_entries(&self) -> usize {
            std::fs::read_dir(self.staging.path()).unwrap().count()
        }
    }

    fn upload_config(staging_dir: &Path) -> UploadConfig {
        UploadConfig {
            max_upload_size_bytes: 1024 * 1024,
            max_thumbnail_size_bytes: 1024,
            staging_dir: staging_dir.display().to_string(),
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }

    async fn harness(remuxer: Arc<dyn Remuxer>, prober: Arc<dyn Prober>) -> Harness {
        let staging = tempfile::tempdir().unwrap();
        let media = Arc::new(InMemoryMediaStore::new(BUCKET, REGION));
        let videos = Arc::new(InMemoryVideoStore::new());
        let record = VideoRecord::new(
            UserId::from_uuid(uuid::Uuid::new_v4()),
            "boots learns to fly".to_string(),
            String::new(),
        );
        videos.create(record.clone()).await.unwrap();

        let pipeline = IngestPipeline::new(
            upload_config(staging.path()),
            remuxer,
            prober,
            media.clone(),
            videos.clone(),
        );
        Harness {
            pipeline,
            media,
            videos,
            record,
            staging,
        }
    }

    fn mp4_body() -> impl Stream<Item = Result<Bytes, std::io::Error>> + Unpin {
        futures::stream::iter(vec![Ok(Bytes::from_static(b"\x00\x00\x00\x18ftypmp42-payload"))])
    }

    fn is_lower_hex(s: &str) -> bool {
        !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
    }

    // -- Scenarios --------------------------------------------------------

    #[tokio::test]
    async fn test_landscape_upload_end_to_end() {
        let h = harness(
            Arc::new(CopyRemuxer::new()),
            Arc::new(FixedProber { ratio: "16:9" }),
        )
        .await;

        let updated = h
            .pipeline
            .ingest(h.record.clone(), "video/mp4", mp4_body())
            .await
            .unwrap();

        let url = updated.video_url.as_deref().unwrap();
        let prefix = format!("https://{}.s3.{}.amazonaws.com/landscape/", BUCKET, REGION);
        let ident = url
            .strip_prefix(&prefix)
            .and_then(|rest| rest.strip_suffix(".mp4"))
            .unwrap();
        assert_eq!(ident.len(), 64);
        assert!(is_lower_hex(ident));

        // Record store saw the same URL, object store holds the bytes.
        let persisted = h.videos.get(h.record.id).await.unwrap().unwrap();
        assert_eq!(persisted.video_url.as_deref(), Some(url));
        assert_eq!(h.media.object_count(), 1);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_wrong_content_type_rejected_before_any_io() {
        let remuxer = Arc::new(CopyRemuxer::new());
        let h = harness(remuxer.clone(), Arc::new(FixedProber { ratio: "16:9" })).await;

        let err = h
            .pipeline
            .ingest(h.record.clone(), "video/avi", mp4_body())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UnsupportedContentType { .. }));
        assert_eq!(remuxer.calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.staging_entries(), 0);
        assert_eq!(h.media.object_count(), 0);
        let persisted = h.videos.get(h.record.id).await.unwrap().unwrap();
        assert!(persisted.video_url.is_none());
    }

    #[tokio::test]
    async fn test_transcoder_failure_uploads_nothing_and_cleans_up() {
        let h = harness(
            Arc::new(CopyRemuxer::failing()),
            Arc::new(FixedProber { ratio: "16:9" }),
        )
        .await;

        let err = h
            .pipeline
            .ingest(h.record.clone(), "video/mp4", mp4_body())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Transcode(_)));
        assert_eq!(h.media.object_count(), 0);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_nonstandard_ratio_lands_under_other_prefix() {
        let h = harness(
            Arc::new(CopyRemuxer::new()),
            Arc::new(FixedProber { ratio: "4:3" }),
        )
        .await;

        let updated = h
            .pipeline
            .ingest(h.record.clone(), "video/mp4", mp4_body())
            .await
            .unwrap();

        let url = updated.video_url.unwrap();
        assert!(url.contains("/other/"), "url was {}", url);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_probe_structural_failure_cleans_up() {
        let h = harness(Arc::new(CopyRemuxer::new()), Arc::new(BrokenProber)).await;

        let err = h
            .pipeline
            .ingest(h.record.clone(), "video/mp4", mp4_body())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Probe(ProbeError::NoStreams)));
        assert_eq!(h.media.object_count(), 0);
        assert_eq!(h.staging_entries(), 0);
    }

    #[tokio::test]
    async fn test_upload_failure_cleans_local_state() {
        let staging = tempfile::tempdir().unwrap();
        let videos = Arc::new(InMemoryVideoStore::new());
        let record = VideoRecord::new(
            UserId::from_uuid(uuid::Uuid::new_v4()),
            "t".to_string(),
            String::new(),
        );
        videos.create(record.clone()).await.unwrap();

        let pipeline = IngestPipeline::new(
            upload_config(staging.path()),
            Arc::new(CopyRemuxer::new()),
            Arc::new(FixedProber { ratio: "16:9" }),
            Arc::new(FailingMediaStore),
            videos.clone(),
        );

        let err = pipeline
            .ingest(record.clone(), "video/mp4", mp4_body())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Upload(_)));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
        let persisted = videos.get(record.id).await.unwrap().unwrap();
        assert!(persisted.video_url.is_none());
    }

    #[tokio::test]
    async fn test_persist_failure_surfaces_and_leaves_remote_object() {
        let staging = tempfile::tempdir().unwrap();
        let media = Arc::new(InMemoryMediaStore::new(BUCKET, REGION));
        let record = VideoRecord::new(
            UserId::from_uuid(uuid::Uuid::new_v4()),
            "t".to_string(),
            String::new(),
        );

        let pipeline = IngestPipeline::new(
            upload_config(staging.path()),
            Arc::new(CopyRemuxer::new()),
            Arc::new(FixedProber { ratio: "9:16" }),
            media.clone(),
            Arc::new(FailingVideoStore),
        );

        let err = pipeline
            .ingest(record, "video/mp4", mp4_body())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::Persist(_)));
        // Known consistency gap: the upload already happened and no
        // compensating delete runs.
        assert_eq!(media.object_count(), 1);
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_reingesting_same_bytes_yields_distinct_objects() {
        let h = harness(
            Arc::new(CopyRemuxer::new()),
            Arc::new(FixedProber { ratio: "16:9" }),
        )
        .await;

        let first = h
            .pipeline
            .ingest(h.record.clone(), "video/mp4", mp4_body())
            .await
            .unwrap();
        let second = h
            .pipeline
            .ingest(first.clone(), "video/mp4", mp4_body())
            .await
            .unwrap();

        assert_ne!(first.video_url, second.video_url);
        assert_eq!(h.media.object_count(), 2);
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_and_cleaned() {
        let staging = tempfile::tempdir().unwrap();
        let mut config = upload_config(staging.path());
        config.max_upload_size_bytes = 8;

        let videos = Arc::new(InMemoryVideoStore::new());
        let record = VideoRecord::new(
            UserId::from_uuid(uuid::Uuid::new_v4()),
            "t".to_string(),
            String::new(),
        );
        videos.create(record.clone()).await.unwrap();

        let pipeline = IngestPipeline::new(
            config,
            Arc::new(CopyRemuxer::new()),
            Arc::new(FixedProber { ratio: "16:9" }),
            Arc::new(InMemoryMediaStore::new(BUCKET, REGION)),
            videos,
        );

        let err = pipeline
            .ingest(record, "video/mp4", mp4_body())
            .await
            .unwrap_err();

        assert!(matches!(err, IngestError::UploadTooLarge { .. }));
        assert_eq!(std::fs::read_dir(staging.path()).unwrap().count(), 0);
    }
}
