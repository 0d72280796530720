//! Token Pipeline - Single Entry Point
//!
//! Holds one snapshot and hands it, read-only, to the validator, the layout
//! engine and the export engine. None of them share state.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::export::{export_collection, export_collections, CollectionExport, ExportReport};
use crate::hashing::compute_document_hash;
use crate::layout::{auto_layout_with, LayoutConfig, LayoutResult};
use crate::model::{CollectionNode, CollectionSet};
use crate::validation::{AliasValidation, CollectionReport, Validator};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Collection not found: {0}")]
    CollectionNotFound(String),

    #[error("Snapshot requires engine >= {0}, current is {1}")]
    EngineVersionMismatch(String, String),

    #[error("Invalid version: {0}")]
    InvalidVersion(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Export documents plus the provenance needed to reproduce or diff them
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportManifest {
    pub id: String,
    pub engine_version: String,
    pub created_at: DateTime<Utc>,
    /// Covers the documents only, so identical snapshots hash identically.
    pub document_hash: String,
    pub diagnostic_count: usize,
    pub collections: Vec<CollectionExport>,
}

pub struct TokenPipeline {
    collections: CollectionSet,
    validator: Validator,
    layout: LayoutConfig,
}

impl TokenPipeline {
    pub fn new(collections: CollectionSet) -> Self {
        Self {
            collections,
            validator: Validator::new(),
            layout: LayoutConfig::default(),
        }
    }

    pub fn with_layout_config(mut self, layout: LayoutConfig) -> Self {
        self.layout = layout;
        self
    }

    /// Refuse snapshots written for a newer engine
    pub fn check_engine_version(&self) -> Result<(), PipelineError> {
        let Some(required) = self.collections.engine_min_version() else {
            return Ok(());
        };
        let engine_ver = semver::Version::parse(ENGINE_VERSION)
            .map_err(|_| PipelineError::InvalidVersion(ENGINE_VERSION.to_string()))?;
        let min_ver = semver::Version::parse(required)
            .map_err(|_| PipelineError::InvalidVersion(required.to_string()))?;

        if engine_ver < min_ver {
            return Err(PipelineError::EngineVersionMismatch(
                required.to_string(),
                ENGINE_VERSION.to_string(),
            ));
        }
        Ok(())
    }

    pub fn list_collections(&self) -> Vec<&CollectionNode> {
        self.collections.list()
    }

    pub fn get_collection(&self, id: &str) -> Result<&CollectionNode, PipelineError> {
        self.collections
            .get(id)
            .ok_or_else(|| PipelineError::CollectionNotFound(id.to_string()))
    }

    /// Check a proposed alias edge between two collections
    pub fn check_alias(&self, source_id: &str, target_id: &str) -> Result<AliasValidation, PipelineError> {
        let source = self.get_collection(source_id)?;
        let target = self.get_collection(target_id)?;
        Ok(self.validator.validate_alias_relationship(source, target))
    }

    pub fn validate_collection(&self, id: &str) -> Result<CollectionReport, PipelineError> {
        let collection = self.get_collection(id)?;
        Ok(self
            .validator
            .validate_collection_variables(collection, self.collections.as_slice()))
    }

    pub fn validate_all(&self) -> Vec<CollectionReport> {
        let all = self.collections.as_slice();
        all.iter()
            .map(|c| self.validator.validate_collection_variables(c, all))
            .collect()
    }

    pub fn layout(&self) -> LayoutResult {
        auto_layout_with(self.collections.as_slice(), &self.layout)
    }

    /// Export a single collection without cross-collection context
    pub fn export_collection(&self, id: &str) -> Result<ExportReport, PipelineError> {
        let collection = self.get_collection(id)?;
        Ok(export_collection(collection))
    }

    pub fn export_all(&self) -> ExportReport {
        export_collections(self.collections.as_slice())
    }

    pub fn build_manifest(&self, report: ExportReport) -> Result<ExportManifest, PipelineError> {
        let document_hash = compute_document_hash(&report.documents)?;
        Ok(ExportManifest {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            created_at: Utc::now(),
            document_hash,
            diagnostic_count: report.diagnostics.len(),
            collections: report.documents,
        })
    }
}

impl Default for TokenPipeline {
    fn default() -> Self {
        Self::new(CollectionSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Layer, Variable, VariableValue};

    fn pipeline() -> TokenPipeline {
        TokenPipeline::new(CollectionSet::new(vec![
            CollectionNode::new("p", "Primitives", Some(Layer::Primitive))
                .with_mode("m", "Default")
                .with_variable(Variable::new("red", "Red").with_value("m", VariableValue::color("#f00"))),
            CollectionNode::new("s", "Semantic", Some(Layer::Semantic))
                .with_mode("m", "Default")
                .with_variable(Variable::new("error", "Error").with_value("m", VariableValue::alias("p", "red"))),
        ]))
    }

    #[test]
    fn test_unknown_collection() {
        let err = pipeline().check_alias("p", "nope").unwrap_err();
        assert!(err.to_string().contains("Collection not found"));
    }

    #[test]
    fn test_check_alias_direction() {
        let p = pipeline();
        assert!(p.check_alias("s", "p").unwrap().is_valid);
        assert!(!p.check_alias("p", "s").unwrap().is_valid);
    }

    #[test]
    fn test_validate_all_clean() {
        let reports = pipeline().validate_all();
        assert_eq!(reports.len(), 2);
        assert!(reports.iter().all(CollectionReport::is_valid));
    }

    #[test]
    fn test_manifest_hash_stable() {
        let p = pipeline();
        let m1 = p.build_manifest(p.export_all()).unwrap();
        let m2 = p.build_manifest(p.export_all()).unwrap();
        assert_eq!(m1.document_hash, m2.document_hash);
        assert_ne!(m1.id, m2.id);
        assert_eq!(m1.diagnostic_count, 0);
    }

    #[test]
    fn test_engine_version_gate() {
        let newer = CollectionSet::from_json(r#"{"engineMinVersion": "99.0.0", "collections": []}"#).unwrap();
        let err = TokenPipeline::new(newer).check_engine_version().unwrap_err();
        assert!(matches!(err, PipelineError::EngineVersionMismatch(..)));

        let bad = CollectionSet::from_json(r#"{"engineMinVersion": "soon", "collections": []}"#).unwrap();
        assert!(matches!(
            TokenPipeline::new(bad).check_engine_version(),
            Err(PipelineError::InvalidVersion(_))
        ));

        assert!(pipeline().check_engine_version().is_ok());
    }

    #[test]
    fn test_layout_uses_config() {
        let p = pipeline().with_layout_config(LayoutConfig { start_y: 0.0, ..LayoutConfig::default() });
        let result = p.layout();
        assert_eq!(result.column_count, 2);
        assert!(result.variables.iter().all(|v| v.position.y == 0.0));
    }
}
