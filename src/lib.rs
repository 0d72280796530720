//! TokenGraph Core - Design Token Graph Engine
//!
//! # The Five Laws (Non-Negotiable)
//! 1. Snapshots Are Read-Only
//! 2. Aliases Point One Layer Down
//! 3. Diagnostics Are Data
//! 4. Deterministic Output
//! 5. Export Identifiers Never Drift

pub mod model;
pub mod color;
pub mod circular;
pub mod validation;
pub mod layout;
pub mod hashing;
pub mod export;
pub mod pipeline;

pub use model::{CollectionNode, CollectionSet, Layer, Variable, VariableKey, VariableMode, VariableValue};
pub use validation::{AliasValidation, CollectionReport, Validator, validate_alias_relationship, validate_collection_variables};
pub use circular::{AliasPath, has_circular_dependency};
pub use layout::{LayoutConfig, LayoutResult, PositionedVariable, auto_layout_variables, auto_layout_with};
pub use hashing::{variable_export_id, collection_export_id, canonical_json};
pub use export::{CollectionExport, ExportReport, export_collection, export_collections};
pub use pipeline::{TokenPipeline, ExportManifest, PipelineError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
