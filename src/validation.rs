//! Validation System - Ordered Alias Rules
//!
//! Rules produce verdicts; the first rule with an opinion decides.
//! Results are data. The host decides whether to block a mutation.

use serde::{Deserialize, Serialize};

use crate::circular::{has_circular_dependency, AliasPath};
use crate::model::{find_variable, CollectionNode, Layer, VariableKey};

/// Outcome of checking a single alias edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AliasValidation {
    pub is_valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl AliasValidation {
    pub fn valid() -> Self {
        Self { is_valid: true, error: None, warning: None }
    }

    pub fn valid_with_warning(warning: impl Into<String>) -> Self {
        Self { is_valid: true, error: None, warning: Some(warning.into()) }
    }

    pub fn invalid(error: impl Into<String>) -> Self {
        Self { is_valid: false, error: Some(error.into()), warning: None }
    }
}

/// Alias rule trait - `None` means "no opinion, ask the next rule"
pub trait AliasRule {
    fn name(&self) -> &'static str;
    fn evaluate(&self, source: &CollectionNode, target: &CollectionNode) -> Option<AliasValidation>;
}

// --- Concrete Rules ---

/// Unlayered collections skip layering entirely.
pub struct LegacyModeRule;

impl AliasRule for LegacyModeRule {
    fn name(&self) -> &'static str { "legacy_mode" }

    fn evaluate(&self, source: &CollectionNode, target: &CollectionNode) -> Option<AliasValidation> {
        if source.layer.is_some() && target.layer.is_some() {
            return None;
        }
        Some(AliasValidation::valid_with_warning(
            "Layer not assigned; alias layering rules are not enforced",
        ))
    }
}

pub struct SelfAliasRule;

impl AliasRule for SelfAliasRule {
    fn name(&self) -> &'static str { "self_alias" }

    fn evaluate(&self, source: &CollectionNode, target: &CollectionNode) -> Option<AliasValidation> {
        (source.id == target.id)
            .then(|| AliasValidation::invalid("Cannot alias variables within the same collection"))
    }
}

pub struct PrimitiveSourceRule;

impl AliasRule for PrimitiveSourceRule {
    fn name(&self) -> &'static str { "primitive_source" }

    fn evaluate(&self, source: &CollectionNode, _target: &CollectionNode) -> Option<AliasValidation> {
        (source.layer == Some(Layer::Primitive))
            .then(|| AliasValidation::invalid("Primitive variables cannot alias other variables"))
    }
}

/// Semantic may only alias Primitive; Theme may only alias Semantic.
pub struct LayerStepRule {
    pub source: Layer,
}

impl AliasRule for LayerStepRule {
    fn name(&self) -> &'static str {
        match self.source {
            Layer::Primitive => "primitive_step",
            Layer::Semantic => "semantic_step",
            Layer::Theme => "theme_step",
        }
    }

    fn evaluate(&self, source: &CollectionNode, target: &CollectionNode) -> Option<AliasValidation> {
        if source.layer != Some(self.source) {
            return None;
        }
        let allowed = self.source.alias_target()?;
        if target.layer == Some(allowed) {
            return None;
        }
        Some(AliasValidation::invalid(format!(
            "{} variables can only alias {} variables (target \"{}\" is {})",
            self.source,
            allowed,
            target.name,
            target.layer.map_or("unassigned", Layer::label),
        )))
    }
}

/// Full diagnostic report for one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionReport {
    pub collection_id: String,
    pub collection_name: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CollectionReport {
    fn new(collection: &CollectionNode) -> Self {
        Self {
            collection_id: collection.id.clone(),
            collection_name: collection.name.clone(),
            errors: vec![],
            warnings: vec![],
        }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Validator orchestrates rules in order
pub struct Validator {
    rules: Vec<Box<dyn AliasRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(LegacyModeRule),
                Box::new(SelfAliasRule),
                Box::new(PrimitiveSourceRule),
                Box::new(LayerStepRule { source: Layer::Semantic }),
                Box::new(LayerStepRule { source: Layer::Theme }),
            ],
        }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// May `source` hold aliases into `target`?
    pub fn validate_alias_relationship(
        &self,
        source: &CollectionNode,
        target: &CollectionNode,
    ) -> AliasValidation {
        self.rules
            .iter()
            .find_map(|rule| rule.evaluate(source, target))
            .unwrap_or_else(AliasValidation::valid)
    }

    pub fn validate_collection_variables(
        &self,
        collection: &CollectionNode,
        all_collections: &[CollectionNode],
    ) -> CollectionReport {
        let mut report = CollectionReport::new(collection);

        let Some(layer) = collection.layer else {
            report.warnings.push(format!(
                "Collection \"{}\" has no layer assigned; alias rules are not enforced",
                collection.name
            ));
            return report;
        };

        for variable in &collection.variables {
            if layer == Layer::Primitive {
                if variable.has_aliases() {
                    report.errors.push(format!(
                        "Variable \"{}\": Primitive variables cannot contain aliases",
                        variable.name
                    ));
                }
                continue;
            }

            if !variable.has_aliases() {
                report.warnings.push(format!(
                    "Variable \"{}\": {} variables should alias {} variables",
                    variable.name,
                    layer,
                    layer.alias_target().map_or("other", Layer::label),
                ));
                continue;
            }

            let origin = collection.key_for(variable);
            for (mode_id, value) in variable.aliases() {
                let Some(target_key) = value.alias_target(&collection.id) else {
                    continue;
                };
                let context = format!("Variable \"{}\" (mode {})", variable.name, mode_id);

                let Some(target) = all_collections.iter().find(|c| c.id == target_key.collection_id) else {
                    report.warnings.push(format!(
                        "{}: references unknown collection \"{}\"",
                        context, target_key.collection_id
                    ));
                    continue;
                };

                let verdict = self.validate_alias_relationship(collection, target);
                if let Some(error) = verdict.error {
                    report.errors.push(format!("{}: {}", context, error));
                }

                if find_variable(all_collections, &target_key).is_none() {
                    report.warnings.push(format!(
                        "{}: references unknown variable \"{}\"",
                        context, target_key.variable_id
                    ));
                    continue;
                }

                if has_circular_dependency(&origin, &target_key, all_collections, AliasPath::new()) {
                    report.errors.push(format!(
                        "{}: alias to {} creates a circular dependency",
                        context,
                        describe(all_collections, &target_key),
                    ));
                }
            }
        }

        report
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

fn describe(collections: &[CollectionNode], key: &VariableKey) -> String {
    match find_variable(collections, key) {
        Some((collection, variable)) => format!("\"{}/{}\"", collection.name, variable.name),
        None => format!("\"{}\"", key),
    }
}

/// Shorthand for [`Validator::validate_alias_relationship`] with the default rules
pub fn validate_alias_relationship(source: &CollectionNode, target: &CollectionNode) -> AliasValidation {
    Validator::new().validate_alias_relationship(source, target)
}

/// Shorthand for [`Validator::validate_collection_variables`] with the default rules
pub fn validate_collection_variables(
    collection: &CollectionNode,
    all_collections: &[CollectionNode],
) -> CollectionReport {
    Validator::new().validate_collection_variables(collection, all_collections)
}
