//! Artifact Model
//!
//! Artifacts reported by the plan-mode workflow's structured artifact events.
//! Keyed by id in the workflow's registry and never mutated after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of artifact produced during plan execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    File,
    Presentation,
    Document,
    Data,
    Url,
    Other(String),
}

impl From<&str> for ArtifactKind {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "file" => ArtifactKind::File,
            "presentation" => ArtifactKind::Presentation,
            "document" => ArtifactKind::Document,
            "data" => ArtifactKind::Data,
            "url" => ArtifactKind::Url,
            other => ArtifactKind::Other(other.to_string()),
        }
    }
}

/// An artifact produced during plan execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique artifact identifier
    pub id: String,
    /// Artifact kind tag
    pub kind: ArtifactKind,
    /// Display name
    pub name: String,
    /// File path, if the artifact lives on disk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// URL, if the artifact is remote
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Optional preview payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview: Option<String>,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Create a new artifact with a generated id.
    pub fn new(kind: ArtifactKind, name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            name: name.into(),
            path: None,
            url: None,
            preview: None,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_kind_from_str() {
        assert_eq!(ArtifactKind::from("file"), ArtifactKind::File);
        assert_eq!(ArtifactKind::from("URL"), ArtifactKind::Url);
        assert_eq!(
            ArtifactKind::from("spreadsheet"),
            ArtifactKind::Other("spreadsheet".to_string())
        );
    }

    #[test]
    fn test_new_artifact() {
        let artifact = Artifact::new(ArtifactKind::Document, "report.md");
        assert!(!artifact.id.is_empty());
        assert_eq!(artifact.name, "report.md");
        assert!(artifact.path.is_none());
    }
}
