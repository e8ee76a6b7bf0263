//! Polling trigger that announces new and modified documents.
//!
//! Each call to [`poll`] is one cycle: it lists the configured folder,
//! compares the listing with the snapshot left by the previous cycle and
//! replaces that snapshot. Nothing is reported on the first cycle of an
//! instance; it only records the baseline.
//!
//! In [`ExecutionMode::Manual`] the cycle neither reads nor writes the
//! snapshot and instead returns a small random sample of existing files so
//! the output shape can be inspected.

use std::time::Duration;

use chrono::{DateTime, Utc};
use graphwatch::{
    BinaryData, Context, ExecutionItem, ExecutionMode, JsonSchema, Result, anyhow::Context as _,
    info, schemars, warn,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use crate::{
    changes::{
        PollScope, PollSnapshot, TriggerEvent, detect_changes, filter_by_extension, sample_files,
    },
    content::fetch_content,
    error::SharePointError,
    listing::{ListOptions, list_files},
    path::FolderPath,
    session::GraphSession,
    traversal::{DEFAULT_MAX_DEPTH, list_files_recursive},
    types::FileRecord,
};

/// Value of the `trigger` field on every emitted item.
pub const TRIGGER_NAME: &str = "sharePointTrigger";

/// Shortest and longest accepted poll intervals, in seconds.
pub const POLL_INTERVAL_RANGE: std::ops::RangeInclusive<u64> = 10..=3600;

const SAMPLE_NOTE: &str = "This is a TEST execution showing existing files. In normal operation, \
                           only NEW or MODIFIED files will trigger this workflow.";
const EMPTY_SAMPLE_NOTE: &str =
    "This is a TEST execution. No files were found in the specified folder.";

/// Configuration of one trigger instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TriggerOptions {
    /// Which changes to report.
    #[serde(default)]
    pub event: TriggerEvent,
    /// Folder to watch, relative to the document library root.
    #[serde(default = "default_folder_path")]
    pub folder_path: String,
    /// Seconds between polls (10-3600).
    #[serde(default = "default_poll_interval")]
    pub poll_interval: u64,
    /// Only report files with these extensions. Accepts a list or a
    /// comma-separated string; empty means every file.
    #[serde(default, deserialize_with = "deserialize_extensions")]
    #[schemars(with = "Vec<String>")]
    pub file_extensions: Vec<String>,
    /// Also watch every folder below `folderPath`.
    #[serde(default)]
    pub include_subfolders: bool,
    /// Attach each reported file's content to its item.
    #[serde(default)]
    pub download_content: bool,
    /// Deepest subfolder level visited when `includeSubfolders` is set.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

impl Default for TriggerOptions {
    fn default() -> Self {
        Self {
            event: TriggerEvent::default(),
            folder_path: default_folder_path(),
            poll_interval: default_poll_interval(),
            file_extensions: Vec::new(),
            include_subfolders: false,
            download_content: false,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

fn default_folder_path() -> String {
    "/".to_string()
}

const fn default_poll_interval() -> u64 {
    60
}

const fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}

fn deserialize_extensions<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<Vec<String>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Extensions {
        List(Vec<String>),
        Joined(String),
    }

    let raw = match Extensions::deserialize(deserializer)? {
        Extensions::List(list) => list,
        Extensions::Joined(joined) => joined.split(',').map(str::to_string).collect(),
    };
    Ok(raw
        .into_iter()
        .map(|e| e.trim().to_string())
        .filter(|e| !e.is_empty())
        .collect())
}

impl TriggerOptions {
    /// Checks ranges and that the folder path is well formed.
    ///
    /// # Errors
    ///
    /// Returns [`SharePointError::InvalidOption`] for an out-of-range poll
    /// interval or [`SharePointError::InvalidPath`] for a malformed folder.
    pub fn validate(&self) -> std::result::Result<(), SharePointError> {
        if !POLL_INTERVAL_RANGE.contains(&self.poll_interval) {
            return Err(SharePointError::InvalidOption(format!(
                "pollInterval must be between {} and {} seconds, got {}",
                POLL_INTERVAL_RANGE.start(),
                POLL_INTERVAL_RANGE.end(),
                self.poll_interval
            )));
        }
        FolderPath::parse(&self.folder_path)?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    /// The options a stored snapshot must have been taken under to be
    /// compared with a new listing.
    ///
    /// # Errors
    ///
    /// Returns [`SharePointError::InvalidPath`] for a malformed folder.
    pub fn scope(&self) -> std::result::Result<PollScope, SharePointError> {
        Ok(PollScope::new(
            &FolderPath::parse(&self.folder_path)?,
            self.event,
            &self.file_extensions,
            self.include_subfolders,
            self.max_depth,
        ))
    }
}

/// Runs one poll cycle for the context's instance.
///
/// Returns `None` when a scheduled cycle found nothing to report.
///
/// # Errors
///
/// Fails with `Trigger failed: <cause>` if the options are invalid, another
/// cycle of the same instance is running, or authentication, site
/// resolution, listing or state access fails. The stored snapshot is left
/// unchanged in that case. Failed content downloads do not fail the cycle;
/// they are reported as `downloadError` on the affected item.
pub async fn poll(ctx: &Context, options: &TriggerOptions) -> Result<Option<Vec<ExecutionItem>>> {
    run_cycle(ctx, options).await.context("Trigger failed")
}

async fn run_cycle(ctx: &Context, options: &TriggerOptions) -> Result<Option<Vec<ExecutionItem>>> {
    options.validate()?;
    let scope = options.scope()?;
    let state = ctx.poll_state();
    let _lease = state.acquire()?;

    let session = GraphSession::connect(ctx).await?;
    let listed = list_folder(&session, options).await?;
    let total_listed = listed.len();
    let files = filter_by_extension(listed, &options.file_extensions);
    let now = Utc::now();

    if ctx.mode() == ExecutionMode::Manual {
        let sample = sample_files(&files, &mut rand::thread_rng());
        info!(
            instance_id = ctx.instance_id(),
            sampled = sample.len(),
            "manual run, returning sample files"
        );
        if sample.is_empty() {
            return Ok(Some(vec![empty_sample_item(options, total_listed, files.len())]));
        }
        let emitter = Emitter {
            session: &session,
            options,
            now,
        };
        return Ok(Some(emitter.emit(&sample, None).await));
    }

    let previous = state
        .load::<PollSnapshot>()
        .await?
        .map(|stored| stored.for_scope(&scope))
        .unwrap_or_default();
    let changed = detect_changes(&previous, &files, options.event);
    if previous.last_poll_time.is_none() {
        info!(
            instance_id = ctx.instance_id(),
            files = files.len(),
            "no baseline for the current options, recording one"
        );
    }
    state.save(&PollSnapshot::replaced(scope, files, now)).await?;

    if changed.is_empty() {
        return Ok(None);
    }
    info!(
        instance_id = ctx.instance_id(),
        event = %options.event,
        changed = changed.len(),
        "detected document changes"
    );
    let emitter = Emitter {
        session: &session,
        options,
        now,
    };
    Ok(Some(emitter.emit(&changed, Some(options.event)).await))
}

async fn list_folder(
    session: &GraphSession,
    options: &TriggerOptions,
) -> std::result::Result<Vec<FileRecord>, SharePointError> {
    if options.include_subfolders {
        let traversal = list_files_recursive(
            &session.client,
            &session.drive_id,
            &options.folder_path,
            options.max_depth,
        )
        .await?;
        if !traversal.skipped.is_empty() {
            warn!(
                skipped = traversal.skipped.len(),
                "some subfolders were skipped"
            );
        }
        Ok(traversal.files)
    } else {
        list_files(
            &session.client,
            &session.drive_id,
            &options.folder_path,
            &ListOptions::default(),
        )
        .await
    }
}

/// Builds output items for one cycle.
struct Emitter<'a> {
    session: &'a GraphSession,
    options: &'a TriggerOptions,
    now: DateTime<Utc>,
}

impl Emitter<'_> {
    /// `event` is `None` for manual sample runs.
    async fn emit(&self, files: &[FileRecord], event: Option<TriggerEvent>) -> Vec<ExecutionItem> {
        let mut items = Vec::with_capacity(files.len());
        for file in files {
            let mut item = self.record(file, event);
            if self.options.download_content {
                item = self.attach_content(file, item).await;
            }
            items.push(item);
        }
        items
    }

    fn record(&self, file: &FileRecord, event: Option<TriggerEvent>) -> ExecutionItem {
        let mut item = ExecutionItem::new(json!({
            "event": event.map_or("test", TriggerEvent::as_str),
            "trigger": TRIGGER_NAME,
            "file": file,
            "folder": {
                "path": self.options.folder_path,
                "driveId": self.session.drive_id,
                "siteId": self.session.site_id,
            },
            "timestamp": self.now,
        }));
        if event.is_none() {
            item.insert("testMode", json!(true));
            item.insert("testNote", json!(SAMPLE_NOTE));
            item.insert("testExecutionTime", json!(self.now));
        }
        item
    }

    async fn attach_content(&self, file: &FileRecord, mut item: ExecutionItem) -> ExecutionItem {
        match fetch_content(&self.session.client, &self.session.drive_id, &file.id).await {
            Ok(bytes) => item.with_binary(BinaryData::from_bytes(
                &bytes,
                file.mime_type.as_deref(),
                &file.name,
                file.size,
            )),
            Err(e) => {
                warn!(file_id = %file.id, error = %e, "failed to download file content");
                item.insert("downloadError", json!(e.to_string()));
                item
            }
        }
    }
}

fn empty_sample_item(options: &TriggerOptions, listed: usize, matched: usize) -> ExecutionItem {
    let extensions = if options.file_extensions.is_empty() {
        json!("none")
    } else {
        json!(options.file_extensions)
    };
    ExecutionItem::new(json!({
        "event": "test",
        "trigger": TRIGGER_NAME,
        "testMode": true,
        "testNote": EMPTY_SAMPLE_NOTE,
        "message": format!(
            "TEST MODE: No files found in folder path: \"{}\". Please check: 1) The folder path \
             is correct, 2) There are files in the folder, 3) Your credentials have access to \
             the folder.",
            options.folder_path
        ),
        "folderPath": options.folder_path,
        "totalFilesFound": matched,
        "debug": {
            "originalFilesFound": listed,
            "afterExtensionFilter": matched,
            "fileExtensionsFilter": extensions,
        },
        "timestamp": Utc::now(),
        "nextSteps": [
            "1. Verify the folder path exists in SharePoint",
            "2. Check if there are actually files in that folder",
            "3. Ensure your app registration has proper permissions",
            "4. Try using \"/\" to test the root folder first",
        ],
    }))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    use super::*;
    use crate::testing::{file_json, folder_json, mount_children, mount_identity, test_ctx};

    const ROOT_CHILDREN: &str = "/v1.0/drives/drive-1/root/children";

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn known(id: &str) -> FileRecord {
        FileRecord {
            id: id.to_string(),
            name: format!("{id}.txt"),
            last_modified: t0() - chrono::Duration::seconds(10),
            size: None,
            web_url: None,
            download_url: None,
            mime_type: None,
        }
    }

    async fn seed(ctx: &Context, snapshot: &PollSnapshot) {
        ctx.poll_state().save(snapshot).await.unwrap();
    }

    fn baseline(options: &TriggerOptions, files: Vec<FileRecord>) -> PollSnapshot {
        PollSnapshot::replaced(options.scope().unwrap(), files, t0())
    }

    fn stored_ids(snapshot: &PollSnapshot) -> Vec<&str> {
        let mut ids: Vec<_> = snapshot
            .last_known_files
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_options_defaults() {
        let options: TriggerOptions = serde_json::from_str("{}").unwrap();

        assert_eq!(options, TriggerOptions::default());
        assert_eq!(options.poll_interval(), Duration::from_secs(60));
        assert_eq!(options.folder_path, "/");
        assert_eq!(options.max_depth, 32);
    }

    #[test]
    fn test_options_accept_extensions_as_list_or_string() {
        let from_list: TriggerOptions =
            serde_json::from_str(r#"{"fileExtensions":["pdf"," docx "]}"#).unwrap();
        let from_string: TriggerOptions =
            serde_json::from_str(r#"{"fileExtensions":"pdf, docx,"}"#).unwrap();

        assert_eq!(from_list.file_extensions, ["pdf", "docx"]);
        assert_eq!(from_string.file_extensions, ["pdf", "docx"]);
    }

    #[test]
    fn test_validate_rejects_out_of_range_interval() {
        for interval in [9, 3601] {
            let options = TriggerOptions {
                poll_interval: interval,
                ..TriggerOptions::default()
            };
            assert!(matches!(
                options.validate(),
                Err(SharePointError::InvalidOption(_))
            ));
        }
    }

    #[test]
    fn test_validate_rejects_bad_folder_path() {
        let options = TriggerOptions {
            folder_path: "Reports?".to_string(),
            ..TriggerOptions::default()
        };

        assert!(matches!(
            options.validate(),
            Err(SharePointError::InvalidPath(_))
        ));
    }

    #[tokio::test]
    async fn test_first_poll_records_baseline_and_emits_nothing() {
        // Arrange
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[file_json("A", "a.txt", "2024-06-01T11:00:00Z")],
        )
        .await;
        let ctx = test_ctx(&server);

        // Act
        let result = poll(&ctx, &TriggerOptions::default()).await.unwrap();

        // Assert
        assert!(result.is_none());
        let snapshot: PollSnapshot = ctx.poll_state().load().await.unwrap().unwrap();
        assert!(snapshot.last_poll_time.is_some());
        assert_eq!(snapshot.last_known_files.len(), 1);
        assert_eq!(snapshot.last_known_files[0].id, "A");
    }

    #[tokio::test]
    async fn test_poll_emits_added_file_and_replaces_snapshot() {
        // Arrange
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[
                file_json("A", "A.txt", "2024-06-01T11:59:50Z"),
                file_json("B", "b.txt", "2024-06-01T12:00:05Z"),
            ],
        )
        .await;
        let ctx = test_ctx(&server);
        seed(&ctx, &baseline(&TriggerOptions::default(), vec![known("A")])).await;

        // Act
        let items = poll(&ctx, &TriggerOptions::default())
            .await
            .unwrap()
            .unwrap();

        // Assert
        assert_eq!(items.len(), 1);
        let json = &items[0].json;
        assert_eq!(json["event"], "fileAdded");
        assert_eq!(json["trigger"], TRIGGER_NAME);
        assert_eq!(json["file"]["id"], "B");
        assert_eq!(json["folder"]["driveId"], "drive-1");
        assert_eq!(json["folder"]["siteId"], "site-1");
        assert_eq!(json["folder"]["path"], "/");

        let snapshot: PollSnapshot = ctx.poll_state().load().await.unwrap().unwrap();
        assert_eq!(stored_ids(&snapshot), ["A", "B"]);
        assert!(snapshot.last_poll_time.unwrap() > t0());
    }

    #[tokio::test]
    async fn test_poll_with_no_changes_returns_none() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[file_json("A", "A.txt", "2024-06-01T11:59:50Z")],
        )
        .await;
        let ctx = test_ctx(&server);
        let options = TriggerOptions {
            event: TriggerEvent::FileAddedOrModified,
            ..TriggerOptions::default()
        };
        seed(&ctx, &baseline(&options, vec![known("A")])).await;

        let result = poll(&ctx, &options).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_poll_applies_extension_filter_before_snapshot() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[
                file_json("A", "a.pdf", "2024-06-01T11:00:00Z"),
                file_json("B", "b.txt", "2024-06-01T11:00:00Z"),
            ],
        )
        .await;
        let ctx = test_ctx(&server);
        let options = TriggerOptions {
            file_extensions: vec!["PDF".to_string()],
            ..TriggerOptions::default()
        };

        poll(&ctx, &options).await.unwrap();

        let snapshot: PollSnapshot = ctx.poll_state().load().await.unwrap().unwrap();
        assert_eq!(snapshot.last_known_files.len(), 1);
        assert_eq!(snapshot.last_known_files[0].id, "A");
    }

    #[tokio::test]
    async fn test_poll_includes_subfolders_when_enabled() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[
                file_json("A", "a.txt", "2024-06-01T11:00:00Z"),
                folder_json("Sub"),
            ],
        )
        .await;
        mount_children(
            &server,
            "/v1.0/drives/drive-1/root:/Sub:/children",
            &[file_json("B", "b.txt", "2024-06-01T12:30:00Z")],
        )
        .await;
        let ctx = test_ctx(&server);
        let options = TriggerOptions {
            include_subfolders: true,
            ..TriggerOptions::default()
        };
        seed(&ctx, &baseline(&options, vec![known("A")])).await;

        let items = poll(&ctx, &options).await.unwrap().unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].json["file"]["id"], "B");
    }

    #[tokio::test]
    async fn test_download_content_attaches_binary_or_records_error() {
        // Arrange
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[
                file_json("B", "b.txt", "2024-06-01T12:00:05Z"),
                file_json("C", "c.txt", "2024-06-01T12:00:05Z"),
            ],
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/drive-1/items/B/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"abc".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/drive-1/items/C/content"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        let ctx = test_ctx(&server);
        let options = TriggerOptions {
            download_content: true,
            ..TriggerOptions::default()
        };
        seed(&ctx, &baseline(&options, Vec::new())).await;

        // Act
        let mut items = poll(&ctx, &options).await.unwrap().unwrap();
        items.sort_by(|a, b| a.json["file"]["id"].as_str().cmp(&b.json["file"]["id"].as_str()));

        // Assert
        let binary = items[0].binary.as_ref().unwrap();
        assert_eq!(binary.decode().unwrap(), b"abc");
        assert_eq!(binary.mime_type, "text/plain");
        assert_eq!(binary.file_name, "b.txt");
        assert!(items[0].json.get("downloadError").is_none());

        assert!(items[1].binary.is_none());
        assert!(
            items[1].json["downloadError"]
                .as_str()
                .unwrap()
                .contains("access denied")
        );
    }

    #[tokio::test]
    async fn test_consecutive_polls_keep_only_the_latest_listing() {
        // Arrange
        let server = MockServer::start().await;
        mount_identity(&server).await;
        let ctx = test_ctx(&server);
        let options = TriggerOptions::default();
        seed(&ctx, &baseline(&options, vec![known("A"), known("B")])).await;
        let listings = [
            vec![
                file_json("B", "b.txt", "2024-06-01T11:00:00Z"),
                file_json("C", "c.txt", "2024-06-01T11:00:00Z"),
            ],
            vec![
                file_json("C", "c.txt", "2024-06-01T11:00:00Z"),
                file_json("D", "d.txt", "2024-06-01T11:00:00Z"),
            ],
        ];

        // Act
        let mut emitted = Vec::new();
        let mut stored = Vec::new();
        for listing in &listings {
            server.reset().await;
            mount_identity(&server).await;
            mount_children(&server, ROOT_CHILDREN, listing).await;
            let items = poll(&ctx, &options).await.unwrap().unwrap();
            emitted.push(
                items
                    .iter()
                    .map(|item| item.json["file"]["id"].as_str().unwrap().to_string())
                    .collect::<Vec<_>>(),
            );
            let snapshot: PollSnapshot = ctx.poll_state().load().await.unwrap().unwrap();
            stored.push(
                stored_ids(&snapshot)
                    .into_iter()
                    .map(str::to_string)
                    .collect::<Vec<_>>(),
            );
        }

        // Assert
        assert_eq!(emitted, [vec!["C"], vec!["D"]]);
        assert_eq!(stored, [vec!["B", "C"], vec!["C", "D"]]);
    }

    #[tokio::test]
    async fn test_changing_folder_starts_a_new_baseline() {
        // Arrange
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[file_json("A", "a.txt", "2024-06-01T11:00:00Z")],
        )
        .await;
        mount_children(
            &server,
            "/v1.0/drives/drive-1/root:/Archive:/children",
            &[
                file_json("X", "x.txt", "2024-06-01T11:00:00Z"),
                file_json("Y", "y.txt", "2024-06-01T11:00:00Z"),
            ],
        )
        .await;
        let ctx = test_ctx(&server);
        let archive = TriggerOptions {
            folder_path: "Archive".to_string(),
            ..TriggerOptions::default()
        };
        assert!(
            poll(&ctx, &TriggerOptions::default())
                .await
                .unwrap()
                .is_none()
        );

        // Act
        let result = poll(&ctx, &archive).await.unwrap();

        // Assert
        assert!(result.is_none());
        let snapshot: PollSnapshot = ctx.poll_state().load().await.unwrap().unwrap();
        assert_eq!(stored_ids(&snapshot), ["X", "Y"]);
        assert_eq!(snapshot.scope, Some(archive.scope().unwrap()));
    }

    #[tokio::test]
    async fn test_changing_extension_filter_starts_a_new_baseline() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[
                file_json("A", "a.pdf", "2024-06-01T11:00:00Z"),
                file_json("B", "b.docx", "2024-06-01T11:00:00Z"),
            ],
        )
        .await;
        let ctx = test_ctx(&server);
        let pdf_only = TriggerOptions {
            file_extensions: vec!["pdf".to_string()],
            ..TriggerOptions::default()
        };
        poll(&ctx, &pdf_only).await.unwrap();

        let result = poll(&ctx, &TriggerOptions::default()).await.unwrap();

        assert!(result.is_none());
    }

    #[tokio::test]
    async fn test_manual_run_samples_files_without_touching_snapshot() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        let entries: Vec<_> = (0..5)
            .map(|i| file_json(&format!("F{i}"), &format!("f{i}.txt"), "2024-06-01T11:00:00Z"))
            .collect();
        mount_children(&server, ROOT_CHILDREN, &entries).await;
        let ctx = test_ctx(&server).with_mode(ExecutionMode::Manual);

        let items = poll(&ctx, &TriggerOptions::default())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(items.len(), 3);
        for item in &items {
            assert_eq!(item.json["event"], "test");
            assert_eq!(item.json["testMode"], true);
            assert!(item.json["testNote"].is_string());
        }
        let snapshot: Option<PollSnapshot> = ctx.poll_state().load().await.unwrap();
        assert!(snapshot.is_none());
    }

    #[tokio::test]
    async fn test_manual_run_on_empty_folder_explains_what_to_check() {
        let server = MockServer::start().await;
        mount_identity(&server).await;
        mount_children(
            &server,
            ROOT_CHILDREN,
            &[file_json("A", "a.txt", "2024-06-01T11:00:00Z")],
        )
        .await;
        let ctx = test_ctx(&server).with_mode(ExecutionMode::Manual);
        let options = TriggerOptions {
            file_extensions: vec!["pdf".to_string()],
            ..TriggerOptions::default()
        };

        let items = poll(&ctx, &options).await.unwrap().unwrap();

        assert_eq!(items.len(), 1);
        let json = &items[0].json;
        assert_eq!(json["totalFilesFound"], 0);
        assert_eq!(json["debug"]["originalFilesFound"], 1);
        assert_eq!(json["debug"]["fileExtensionsFilter"], serde_json::json!(["pdf"]));
        assert_eq!(json["nextSteps"].as_array().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_concurrent_poll_of_same_instance_fails_fast() {
        let server = MockServer::start().await;
        let ctx = test_ctx(&server);
        let state = ctx.poll_state();
        let _held = state.acquire().unwrap();

        let err = poll(&ctx, &TriggerOptions::default()).await.unwrap_err();

        assert!(format!("{err:#}").contains("already in flight"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_cycle_leaves_snapshot_untouched() {
        // Arrange
        let server = MockServer::start().await;
        mount_identity(&server).await;
        Mock::given(method("GET"))
            .and(path("/v1.0/drives/drive-1/root:/Missing:/children"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let ctx = test_ctx(&server);
        let options = TriggerOptions {
            folder_path: "Missing".to_string(),
            ..TriggerOptions::default()
        };
        let before = baseline(&options, vec![known("A")]);
        seed(&ctx, &before).await;

        // Act
        let err = poll(&ctx, &options).await.unwrap_err();

        // Assert
        assert_eq!(
            format!("{err:#}"),
            "Trigger failed: folder not found: Missing. Please verify the path exists in SharePoint"
        );
        let after: PollSnapshot = ctx.poll_state().load().await.unwrap().unwrap();
        assert_eq!(after, before);
        assert!(ctx.poll_state().acquire().is_ok());
    }
}
