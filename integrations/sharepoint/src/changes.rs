//! Change detection between consecutive polls.

use std::{collections::HashSet, fmt};

use chrono::{DateTime, Utc};
use graphwatch::{JsonSchema, schemars};
use rand::{Rng, seq::SliceRandom};
use serde::{Deserialize, Serialize};

use crate::{path::FolderPath, types::FileRecord};

/// Number of files returned by a manual sample run.
pub const TEST_SAMPLE_SIZE: usize = 3;

/// Which changes a trigger reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum TriggerEvent {
    /// Files whose id was not present in the previous poll.
    #[default]
    FileAdded,
    /// Known files modified since the previous poll.
    FileModified,
    /// Either of the above.
    FileAddedOrModified,
}

impl TriggerEvent {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::FileAdded => "fileAdded",
            Self::FileModified => "fileModified",
            Self::FileAddedOrModified => "fileAddedOrModified",
        }
    }
}

impl fmt::Display for TriggerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The trigger options that decide which files a listing contains.
///
/// A snapshot is only comparable with a listing taken under the same scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollScope {
    /// Normalized folder path.
    pub folder: String,
    pub event: TriggerEvent,
    /// Lowercased extensions without leading dots, sorted.
    pub file_extensions: Vec<String>,
    pub include_subfolders: bool,
    /// Only set when `include_subfolders` is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<usize>,
}

impl PollScope {
    pub fn new(
        folder: &FolderPath,
        event: TriggerEvent,
        file_extensions: &[String],
        include_subfolders: bool,
        max_depth: usize,
    ) -> Self {
        let mut extensions: Vec<String> = normalized_extensions(file_extensions)
            .into_iter()
            .collect();
        extensions.sort_unstable();
        Self {
            folder: folder.to_string(),
            event,
            file_extensions: extensions,
            include_subfolders,
            max_depth: include_subfolders.then_some(max_depth),
        }
    }
}

/// What the poller remembers between polls of one trigger instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollSnapshot {
    #[serde(default)]
    pub last_poll_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_known_files: Vec<FileRecord>,
    /// Scope the listing was taken under. Snapshots written without one are
    /// never reused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<PollScope>,
}

impl PollSnapshot {
    /// The snapshot that replaces this one after a poll at `now` saw `files`
    /// under `scope`.
    pub fn replaced(scope: PollScope, files: Vec<FileRecord>, now: DateTime<Utc>) -> Self {
        Self {
            last_poll_time: Some(now),
            last_known_files: files,
            scope: Some(scope),
        }
    }

    /// Returns this snapshot if it was taken under `scope`, otherwise an
    /// empty one, so a reconfigured trigger starts from a new baseline.
    #[must_use]
    pub fn for_scope(self, scope: &PollScope) -> Self {
        if self.scope.as_ref() == Some(scope) {
            self
        } else {
            Self::default()
        }
    }
}

/// Returns the files in `current` that match `event` relative to `previous`.
///
/// Nothing is reported until a previous poll has set a baseline. Deletions
/// are never reported.
pub fn detect_changes(
    previous: &PollSnapshot,
    current: &[FileRecord],
    event: TriggerEvent,
) -> Vec<FileRecord> {
    let Some(last_poll) = previous.last_poll_time else {
        return Vec::new();
    };
    let known: HashSet<&str> = previous
        .last_known_files
        .iter()
        .map(|f| f.id.as_str())
        .collect();

    current
        .iter()
        .filter(|file| {
            let is_new = !known.contains(file.id.as_str());
            let is_modified = file.last_modified > last_poll;
            match event {
                TriggerEvent::FileAdded => is_new,
                TriggerEvent::FileModified => !is_new && is_modified,
                TriggerEvent::FileAddedOrModified => is_new || is_modified,
            }
        })
        .cloned()
        .collect()
}

/// Keeps files whose extension is in `extensions`.
///
/// Entries are compared case-insensitively, ignoring surrounding whitespace
/// and a leading `.`. An empty list keeps everything.
pub fn filter_by_extension(files: Vec<FileRecord>, extensions: &[String]) -> Vec<FileRecord> {
    let wanted = normalized_extensions(extensions);
    if wanted.is_empty() {
        return files;
    }

    files
        .into_iter()
        .filter(|file| file.extension().is_some_and(|ext| wanted.contains(&ext)))
        .collect()
}

fn normalized_extensions(extensions: &[String]) -> HashSet<String> {
    extensions
        .iter()
        .map(|e| e.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|e| !e.is_empty())
        .collect()
}

/// Picks up to [`TEST_SAMPLE_SIZE`] files at random.
pub fn sample_files<R: Rng + ?Sized>(files: &[FileRecord], rng: &mut R) -> Vec<FileRecord> {
    files
        .choose_multiple(rng, TEST_SAMPLE_SIZE)
        .cloned()
        .collect()
}
