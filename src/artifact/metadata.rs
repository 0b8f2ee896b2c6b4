use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::nets::ModelKind;

/// Descriptive fields attached to a bundle before save
///
/// Pure in-memory mutation ahead of the save. Setting a field twice with
/// the same value leaves the serialized manifest unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub short_description: String,
    pub description: String,
    pub author: String,
    pub license: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub input_descriptions: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub output_descriptions: BTreeMap<String, String>,
}

impl ArtifactMetadata {
    /// Canonical metadata for a model kind with the configured identity
    /// fields filled in
    pub fn for_kind(kind: ModelKind, author: &str, license: &str, version: &str) -> Self {
        let mut meta = Self {
            short_description: kind.short_description().to_string(),
            description: kind.long_description().to_string(),
            author: author.to_string(),
            license: license.to_string(),
            version: version.to_string(),
            ..Default::default()
        };
        meta.describe_input(kind.input_port(), kind.input_description());
        meta.describe_output(kind.output_port(), kind.output_description());
        meta
    }

    /// Human-readable description for a named input port
    pub fn describe_input(&mut self, port: &str, text: &str) {
        self.input_descriptions
            .insert(port.to_string(), text.to_string());
    }

    /// Human-readable description for a named output port
    pub fn describe_output(&mut self, port: &str, text: &str) {
        self.output_descriptions
            .insert(port.to_string(), text.to_string());
    }
}
