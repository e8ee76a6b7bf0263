//! Type definitions for the SharePoint integration.

use chrono::{DateTime, Utc};
use graphwatch::{JsonSchema, schemars};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// One page of a Graph collection response.
#[derive(Debug, Deserialize)]
pub(crate) struct GraphPage<T> {
    #[serde(default = "Vec::new")]
    pub value: Vec<T>,
    #[serde(rename = "@odata.nextLink", default)]
    pub next_link: Option<String>,
}

/// SharePoint site as returned by `/sites`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Site {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "displayName", default)]
    pub display_name: Option<String>,
}

/// Document library (drive) of a site.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Drive {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "webUrl", default)]
    pub web_url: Option<String>,
}

/// File or folder entry from a document library.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct DriveItem {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(rename = "webUrl", default)]
    pub web_url: Option<String>,
    #[serde(rename = "createdDateTime", default)]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(rename = "lastModifiedDateTime", default)]
    pub last_modified_date_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub file: Option<FileFacet>,
    #[serde(default)]
    pub folder: Option<FolderFacet>,
    #[serde(rename = "@microsoft.graph.downloadUrl", default)]
    pub download_url: Option<String>,
    #[serde(rename = "createdBy", default)]
    pub created_by: Option<JsonValue>,
    #[serde(rename = "lastModifiedBy", default)]
    pub last_modified_by: Option<JsonValue>,
}

/// Folder facet indicating an item is a folder.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FolderFacet {}

/// File facet indicating an item is a file.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct FileFacet {
    #[serde(rename = "mimeType", default)]
    pub mime_type: Option<String>,
}

/// A file observed in a document library.
///
/// This is the unit the change detector compares: `id` is stable across
/// renames and `last_modified` drives modification detection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    #[serde(rename = "lastModifiedDateTime")]
    pub last_modified: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

impl FileRecord {
    /// Converts a listing entry into a record, or `None` for folders and
    /// other non-file entries.
    pub(crate) fn from_item(item: DriveItem) -> Option<Self> {
        item.file.is_some().then(|| Self::from_any_item(item))
    }

    /// Converts a listing entry without checking its kind.
    ///
    /// A missing modification time is treated as the Unix epoch, so such a
    /// file can be announced as added but never as modified.
    pub(crate) fn from_any_item(item: DriveItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            last_modified: item.last_modified_date_time.unwrap_or(DateTime::UNIX_EPOCH),
            size: item.size,
            web_url: item.web_url,
            download_url: item.download_url,
            mime_type: item.file.and_then(|f| f.mime_type),
        }
    }

    /// Lowercased text after the last `.` in the name, if any.
    pub fn extension(&self) -> Option<String> {
        self.name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
    }
}

/// Full metadata for one document.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetails {
    #[serde(flatten)]
    pub file: FileRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_date_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<JsonValue>,
}

impl From<DriveItem> for DocumentDetails {
    fn from(mut item: DriveItem) -> Self {
        let created_date_time = item.created_date_time;
        let created_by = item.created_by.take();
        let last_modified_by = item.last_modified_by.take();
        Self {
            file: FileRecord::from_any_item(item),
            created_date_time,
            created_by,
            last_modified_by,
        }
    }
}
