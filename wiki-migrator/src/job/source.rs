//! Source export access and target document storage
//!
//! Decoding the source wiki's export container is done upstream; the job
//! consumes already-decoded documents through [`SpaceSource`] and writes
//! converted documents through [`TargetStore`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use super::types::EntityReference;
use crate::error::{MigrationError, Result};
use crate::macros::MacroOccurrence;
use crate::metadata::MigrationMetadata;

/// Piece of source document content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain content copied as-is
    Text(String),
    /// Embedded macro
    Macro(MacroOccurrence),
}

/// Decoded source document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDocument {
    /// Identifier unique within its space
    pub id: String,
    pub title: String,
    /// Labels attached in the source wiki
    #[serde(default)]
    pub labels: Vec<String>,
    /// Short plain-text summary
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

impl SourceDocument {
    /// Metadata tag for this document, if it carries labels
    pub fn metadata(&self, space_key: &str) -> Option<MigrationMetadata> {
        if self.labels.is_empty() {
            return None;
        }
        Some(
            MigrationMetadata::new(&self.id, space_key, &self.title)
                .with_description(&self.excerpt)
                .with_fields(self.labels.iter().cloned()),
        )
    }
}

/// Converted document ready to be stored in the target wiki
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetDocument {
    pub reference: EntityReference,
    pub title: String,
    pub content: String,
    pub metadata: Option<MigrationMetadata>,
}

/// Read access to a decoded source export
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpaceSource: Send + Sync {
    /// Document identifiers of a space, in export order
    async fn list_documents(&self, space_key: &str) -> Result<Vec<String>>;

    async fn load_document(&self, space_key: &str, document_id: &str) -> Result<SourceDocument>;
}

/// Write access to the target wiki
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetStore: Send + Sync {
    async fn save_document(&self, document: TargetDocument) -> Result<()>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportSpace {
    key: String,
    name: String,
    #[serde(default)]
    documents: Vec<SourceDocument>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ExportFile {
    spaces: Vec<ExportSpace>,
}

/// Source backed by a JSON rendition of the export
pub struct JsonExportSource {
    spaces: HashMap<String, ExportSpace>,
}

impl JsonExportSource {
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = tokio::fs::read_to_string(path.as_ref()).await?;
        let source = Self::from_json(&content)?;
        info!(
            "Loaded export {} with {} spaces",
            path.as_ref().display(),
            source.spaces.len()
        );
        Ok(source)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        let export: ExportFile = serde_json::from_str(content)?;
        Ok(Self {
            spaces: export
                .spaces
                .into_iter()
                .map(|space| (space.key.clone(), space))
                .collect(),
        })
    }

    /// Display name of a space
    pub fn space_name(&self, space_key: &str) -> Option<&str> {
        self.spaces.get(space_key).map(|space| space.name.as_str())
    }

    /// All space keys, sorted
    pub fn space_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.spaces.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    fn space(&self, space_key: &str) -> Result<&ExportSpace> {
        self.spaces
            .get(space_key)
            .ok_or_else(|| MigrationError::NotFound(format!("space {}", space_key)))
    }
}

#[async_trait]
impl SpaceSource for JsonExportSource {
    async fn list_documents(&self, space_key: &str) -> Result<Vec<String>> {
        Ok(self
            .space(space_key)?
            .documents
            .iter()
            .map(|doc| doc.id.clone())
            .collect())
    }

    async fn load_document(&self, space_key: &str, document_id: &str) -> Result<SourceDocument> {
        self.space(space_key)?
            .documents
            .iter()
            .find(|doc| doc.id == document_id)
            .cloned()
            .ok_or_else(|| {
                MigrationError::NotFound(format!("document {} in space {}", document_id, space_key))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "spaces": [
            {
                "key": "ENG",
                "name": "Engineering",
                "documents": [
                    {
                        "id": "Home",
                        "title": "Engineering home",
                        "labels": ["Team", "Onboarding"],
                        "excerpt": "Start here",
                        "content": [
                            {"text": "Welcome\n"},
                            {"macro": {"macro_id": "code", "parameters": {"language": "rust"}, "body": "fn main() {}"}}
                        ]
                    },
                    {"id": "Empty", "title": "Nothing here"}
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_list_and_load() {
        let source = JsonExportSource::from_json(EXPORT).unwrap();
        assert_eq!(source.space_keys(), vec!["ENG"]);
        assert_eq!(source.space_name("ENG"), Some("Engineering"));

        let ids = source.list_documents("ENG").await.unwrap();
        assert_eq!(ids, vec!["Home", "Empty"]);

        let doc = source.load_document("ENG", "Home").await.unwrap();
        assert_eq!(doc.content.len(), 2);
        match &doc.content[1] {
            ContentBlock::Macro(occurrence) => assert_eq!(occurrence.macro_id(), "code"),
            ContentBlock::Text(_) => panic!("expected a macro block"),
        }
    }

    #[tokio::test]
    async fn test_missing_space_and_document() {
        let source = JsonExportSource::from_json(EXPORT).unwrap();
        assert!(matches!(
            source.list_documents("HR").await,
            Err(MigrationError::NotFound(_))
        ));
        assert!(matches!(
            source.load_document("ENG", "Missing").await,
            Err(MigrationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_metadata_only_for_labelled_documents() {
        let source = JsonExportSource::from_json(EXPORT).unwrap();

        let home = source.load_document("ENG", "Home").await.unwrap();
        let metadata = home.metadata("ENG").unwrap();
        assert_eq!(metadata.key(), "Home");
        assert_eq!(metadata.lower_space_key(), "eng");
        assert_eq!(metadata.description(), "Start here");
        assert_eq!(metadata.lower_fields(), ["team", "onboarding"]);

        let empty = source.load_document("ENG", "Empty").await.unwrap();
        assert!(empty.metadata("ENG").is_none());
    }

    #[test]
    fn test_invalid_macro_in_export_rejected() {
        let export = r#"{"spaces": [{"key": "A", "name": "A", "documents": [
            {"id": "x", "title": "x", "content": [{"macro": {"macro_id": ""}}]}
        ]}]}"#;
        assert!(JsonExportSource::from_json(export).is_err());
    }
}
