//! Shared types for kbfetch
//!
//! This crate contains the plain data structures passed between the
//! download host, its workers, the CLI and the collaborators that fetch
//! and persist objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

// ============================================================================
// Object Types
// ============================================================================

/// What a request asks the host to fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// Raw payload bytes, persisted as-is
    #[default]
    GenericData,
    /// A structured document record (info + body)
    Document,
}

/// Concrete type of a stored object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    #[default]
    None,
    Tag,
    Style,
    Attachment,
    Document,
    DeletedGuid,
}

impl ObjectType {
    /// Protocol string used when talking to the remote server and local store
    pub fn type_string(self) -> &'static str {
        match self {
            ObjectType::None => "",
            ObjectType::Tag => "tag",
            ObjectType::Style => "style",
            ObjectType::Attachment => "attachment",
            ObjectType::Document => "document",
            ObjectType::DeletedGuid => "deleted_guid",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_string())
    }
}

/// Error returned when parsing an unknown object type string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownObjectType(pub String);

impl fmt::Display for UnknownObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown object type: {}", self.0)
    }
}

impl std::error::Error for UnknownObjectType {}

impl FromStr for ObjectType {
    type Err = UnknownObjectType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "" => Ok(ObjectType::None),
            "tag" => Ok(ObjectType::Tag),
            "style" => Ok(ObjectType::Style),
            "attachment" => Ok(ObjectType::Attachment),
            "document" => Ok(ObjectType::Document),
            "deleted_guid" => Ok(ObjectType::DeletedGuid),
            other => Err(UnknownObjectType(other.to_string())),
        }
    }
}

/// One desired fetch, keyed by `object_id`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRequest {
    pub object_id: String,
    pub kb_id: String,
    pub kind: ObjectKind,
    pub object_type: ObjectType,
    /// Diagnostic only
    pub display_name: String,
    /// Filled in for `GenericData` after a successful fetch
    #[serde(default)]
    pub payload: Vec<u8>,
}

impl ObjectRequest {
    pub fn new(object_id: impl Into<String>, kb_id: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            object_id: object_id.into(),
            kb_id: kb_id.into(),
            kind: ObjectKind::GenericData,
            object_type,
            display_name: String::new(),
            payload: Vec::new(),
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Display name if set, otherwise the object id
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.object_id
        } else {
            &self.display_name
        }
    }
}

// ============================================================================
// Document Types
// ============================================================================

/// Document record as kept by the local store
///
/// Starts life as a stub (id, title, location) created by sync; a document
/// download fills in the info fields and the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub guid: String,
    pub kb_id: String,
    pub title: String,
    pub location: String,
    #[serde(default)]
    pub data_md5: Option<String>,
    #[serde(default)]
    pub modified: Option<DateTime<Utc>>,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub info_downloaded: bool,
    #[serde(default)]
    pub data_downloaded: bool,
    #[serde(default)]
    pub data: Vec<u8>,
}

impl DocumentRecord {
    pub fn stub(guid: impl Into<String>, kb_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            guid: guid.into(),
            kb_id: kb_id.into(),
            title: title.into(),
            location: "/My Notes/".to_string(),
            ..Default::default()
        }
    }
}

/// Which parts of a document to fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentParts {
    pub info: bool,
    pub data: bool,
}

impl DocumentParts {
    pub const INFO: DocumentParts = DocumentParts { info: true, data: false };
    pub const DATA: DocumentParts = DocumentParts { info: false, data: true };
    pub const INFO_AND_DATA: DocumentParts = DocumentParts::INFO.union(DocumentParts::DATA);

    /// Parts requested by either set
    pub const fn union(self, other: DocumentParts) -> DocumentParts {
        DocumentParts {
            info: self.info || other.info,
            data: self.data || other.data,
        }
    }
}

// ============================================================================
// Event Types
// ============================================================================

/// Events the download host delivers to its subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum HostEvent {
    Progress {
        object_id: String,
        total: u64,
        loaded: u64,
    },
    Done {
        request: ObjectRequest,
        success: bool,
    },
}

impl HostEvent {
    pub fn object_id(&self) -> &str {
        match self {
            HostEvent::Progress { object_id, .. } => object_id,
            HostEvent::Done { request, .. } => &request.object_id,
        }
    }
}

/// Result of submitting a request to the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    /// A worker was created and handed to the pool
    Queued,
    /// The object is already in flight; nothing was submitted
    AlreadyPending,
}

/// Completion notice of a file fetch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFetchDone {
    pub path: PathBuf,
    pub success: bool,
}

// ============================================================================
// Settings Types
// ============================================================================

/// Runtime settings for the host and the file fetcher
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Where the filesystem store keeps its data
    pub data_dir: PathBuf,
    /// Object downloads allowed at once; keeps load off the remote server
    pub max_concurrent_downloads: usize,
    /// 301 hops a file fetch may follow
    pub max_redirects: u32,
    /// Upper bound for a single worker run, `None` = unlimited
    pub fetch_timeout_secs: Option<u64>,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .map(|p| p.join("kbfetch"))
                .unwrap_or_else(|| PathBuf::from(".kbfetch")),
            max_concurrent_downloads: 1,
            max_redirects: 10,
            fetch_timeout_secs: None,
            connect_timeout_secs: 30,
            user_agent: concat!("kbfetch/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_strings_round_trip() {
        for ty in [
            ObjectType::None,
            ObjectType::Tag,
            ObjectType::Style,
            ObjectType::Attachment,
            ObjectType::Document,
            ObjectType::DeletedGuid,
        ] {
            assert_eq!(ty.type_string().parse::<ObjectType>(), Ok(ty));
        }
        assert_eq!(ObjectType::Attachment.type_string(), "attachment");
        assert!("folder".parse::<ObjectType>().is_err());
    }

    #[test]
    fn label_falls_back_to_object_id() {
        let req = ObjectRequest::new("abc", "kb1", ObjectType::Attachment);
        assert_eq!(req.label(), "abc");
        assert_eq!(req.with_display_name("photo.png").label(), "photo.png");
    }

    #[test]
    fn document_parts_combine() {
        assert_eq!(DocumentParts::default().union(DocumentParts::DATA), DocumentParts::DATA);
        assert_eq!(DocumentParts::INFO.union(DocumentParts::DATA), DocumentParts::INFO_AND_DATA);
        assert_eq!(DocumentParts::INFO.union(DocumentParts::INFO), DocumentParts::INFO);
        assert!(!DocumentParts::DATA.info && DocumentParts::DATA.data);
    }

    #[test]
    fn partial_settings_use_defaults() {
        let settings: Settings = serde_json::from_str(r#"{"max_redirects": 3}"#).unwrap();
        assert_eq!(settings.max_redirects, 3);
        assert_eq!(settings.max_concurrent_downloads, 1);
        assert_eq!(settings.connect_timeout_secs, 30);
    }
}
