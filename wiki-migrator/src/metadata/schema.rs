//! Migration metadata record
//!
//! Tags a migrated content unit with its source key, space, title,
//! description and free-text fields. Lower-cased mirrors of the key, space
//! key and fields are stored alongside for case-insensitive lookups; they are
//! private and recomputed on every write so they can never drift.

use serde::{Deserialize, Serialize};

/// Storage kind of a metadata field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Short single-line text
    ShortText,
    /// Long plain text, no markup
    LongText,
    /// Ordered set of short text tokens
    TokenSet,
}

/// Field layout of a persisted metadata record
pub const METADATA_SCHEMA: &[(&str, FieldKind)] = &[
    ("key", FieldKind::ShortText),
    ("lower_key", FieldKind::ShortText),
    ("space_key", FieldKind::ShortText),
    ("lower_space_key", FieldKind::ShortText),
    ("title", FieldKind::ShortText),
    ("description", FieldKind::LongText),
    ("fields", FieldKind::TokenSet),
    ("lower_fields", FieldKind::TokenSet),
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MetadataFields")]
pub struct MigrationMetadata {
    key: String,
    lower_key: String,
    space_key: String,
    lower_space_key: String,
    title: String,
    description: String,
    fields: Vec<String>,
    lower_fields: Vec<String>,
}

/// Stored mirrors are ignored on input and rebuilt from their sources
#[derive(Deserialize)]
struct MetadataFields {
    key: String,
    space_key: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    fields: Vec<String>,
}

impl From<MetadataFields> for MigrationMetadata {
    fn from(raw: MetadataFields) -> Self {
        let mut metadata = MigrationMetadata::new(raw.key, raw.space_key, raw.title);
        metadata.set_description(raw.description);
        metadata.set_fields(raw.fields);
        metadata
    }
}

impl MigrationMetadata {
    pub fn new(key: impl Into<String>, space_key: impl Into<String>, title: impl Into<String>) -> Self {
        let key = key.into();
        let space_key = space_key.into();
        Self {
            lower_key: key.to_lowercase(),
            lower_space_key: space_key.to_lowercase(),
            key,
            space_key,
            title: title.into(),
            description: String::new(),
            fields: Vec::new(),
            lower_fields: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.set_description(description);
        self
    }

    pub fn with_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set_fields(fields);
        self
    }

    pub fn set_key(&mut self, key: impl Into<String>) {
        self.key = key.into();
        self.lower_key = self.key.to_lowercase();
    }

    pub fn set_space_key(&mut self, space_key: impl Into<String>) {
        self.space_key = space_key.into();
        self.lower_space_key = self.space_key.to_lowercase();
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = description.into();
    }

    /// Replace the field list. Repeated labels keep their first position.
    pub fn set_fields<I, S>(&mut self, fields: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.clear();
        for field in fields {
            let field = field.into();
            if !self.fields.contains(&field) {
                self.fields.push(field);
            }
        }
        self.lower_fields = self.fields.iter().map(|f| f.to_lowercase()).collect();
    }

    pub fn add_field(&mut self, field: impl Into<String>) {
        let field = field.into();
        if !self.fields.contains(&field) {
            self.lower_fields.push(field.to_lowercase());
            self.fields.push(field);
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lower_key(&self) -> &str {
        &self.lower_key
    }

    pub fn space_key(&self) -> &str {
        &self.space_key
    }

    pub fn lower_space_key(&self) -> &str {
        &self.lower_space_key
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn lower_fields(&self) -> &[String] {
        &self.lower_fields
    }

    /// Case-insensitive field membership
    pub fn has_field(&self, field: &str) -> bool {
        let needle = field.to_lowercase();
        self.lower_fields.iter().any(|f| *f == needle)
    }

    pub fn schema() -> &'static [(&'static str, FieldKind)] {
        METADATA_SCHEMA
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_consistent(metadata: &MigrationMetadata) {
        assert_eq!(metadata.lower_key(), metadata.key().to_lowercase());
        assert_eq!(metadata.lower_space_key(), metadata.space_key().to_lowercase());
        assert_eq!(metadata.lower_fields().len(), metadata.fields().len());
        for (field, lower) in metadata.fields().iter().zip(metadata.lower_fields()) {
            assert_eq!(*lower, field.to_lowercase());
        }
    }

    #[test]
    fn test_new_derives_lower_fields() {
        let metadata = MigrationMetadata::new("Release-Notes", "ENG", "Release notes")
            .with_description("Notes for each release")
            .with_fields(["Roadmap", "Q3"]);

        assert_eq!(metadata.lower_key(), "release-notes");
        assert_eq!(metadata.lower_space_key(), "eng");
        assert_eq!(metadata.lower_fields(), ["roadmap", "q3"]);
        assert_consistent(&metadata);
    }

    #[test]
    fn test_setters_keep_mirrors_in_sync() {
        let mut metadata = MigrationMetadata::new("a", "b", "t");
        metadata.set_key("ÀBC");
        metadata.set_space_key("Ops");
        metadata.add_field("Infra");
        metadata.add_field("Infra");
        metadata.set_fields(vec!["X", "y", "X"]);
        metadata.add_field("Z");

        assert_eq!(metadata.fields(), ["X", "y", "Z"]);
        assert_consistent(&metadata);
    }

    #[test]
    fn test_deserialize_recomputes_mirrors() {
        let json = r#"{
            "key": "Home",
            "lower_key": "stale",
            "space_key": "DOCS",
            "lower_space_key": "stale",
            "title": "Home",
            "description": "",
            "fields": ["Intro"],
            "lower_fields": ["stale", "extra"]
        }"#;
        let metadata: MigrationMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.lower_key(), "home");
        assert_eq!(metadata.lower_fields(), ["intro"]);
        assert_consistent(&metadata);
    }

    #[test]
    fn test_has_field_ignores_case() {
        let metadata = MigrationMetadata::new("k", "s", "t").with_fields(["Design"]);
        assert!(metadata.has_field("DESIGN"));
        assert!(!metadata.has_field("draft"));
    }

    #[test]
    fn test_schema_field_kinds() {
        let schema = MigrationMetadata::schema();
        assert_eq!(schema.len(), 8);
        assert!(schema.contains(&("description", FieldKind::LongText)));
        assert!(schema.contains(&("lower_fields", FieldKind::TokenSet)));
    }
}
