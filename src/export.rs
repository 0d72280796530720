//! Export Engine - Variable Interchange Documents
//!
//! Every export completes and is well-formed. A bad value degrades to opaque
//! black for that one mode and leaves a diagnostic behind.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::color::Rgba;
use crate::hashing::{collection_export_id, variable_export_id};
use crate::model::{CollectionNode, ModeId, Variable, VariableKey, VariableValue};

pub const DEFAULT_SCOPE: &str = "ALL_SCOPES";
pub const CODE_SYNTAX_TARGET: &str = "WEB";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AliasKind {
    VariableAlias,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AliasReference {
    #[serde(rename = "type")]
    pub kind: AliasKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExportValue {
    Alias(AliasReference),
    Color(Rgba),
}

/// What a mode's value looks like once the alias is followed one hop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedPreview {
    pub resolved_value: Rgba,
    pub alias: Option<String>,
    pub alias_name: Option<String>,
}

impl ResolvedPreview {
    fn literal(color: Rgba) -> Self {
        Self { resolved_value: color, alias: None, alias_name: None }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedType {
    Color,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedVariable {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub resolved_type: ResolvedType,
    pub values_by_mode: BTreeMap<ModeId, ExportValue>,
    pub resolved_values_by_mode: BTreeMap<ModeId, ResolvedPreview>,
    pub scopes: Vec<String>,
    pub hidden_from_publishing: bool,
    pub code_syntax: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionExport {
    pub id: String,
    pub name: String,
    pub modes: BTreeMap<ModeId, String>,
    pub variable_ids: Vec<String>,
    pub variables: Vec<ExportedVariable>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDiagnostic {
    pub collection_id: String,
    pub variable_id: String,
    /// `None` for problems that are not tied to one mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode_id: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExportReport {
    pub documents: Vec<CollectionExport>,
    pub diagnostics: Vec<ExportDiagnostic>,
}

/// Export one collection on its own. Aliases into other collections cannot
/// resolve here and fall back to the default color.
pub fn export_collection(collection: &CollectionNode) -> ExportReport {
    ExportContext::new(std::slice::from_ref(collection)).run()
}

/// Export several collections together, one document per input, in input order.
pub fn export_collections(collections: &[CollectionNode]) -> ExportReport {
    ExportContext::new(collections).run()
}

/// External code-syntax name derived from a display name.
///
/// `"🎨 Brand/Primary Blue"` becomes `"brand-primary-blue"`.
pub fn derive_code_syntax(name: &str) -> String {
    let undecorated = name.trim_start_matches(|c: char| !c.is_alphanumeric());
    let lowered = undecorated.replace(['/', '\\'], "-").to_lowercase();
    lowered
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '_')
        .collect()
}

struct ExportContext<'a> {
    scope: &'a [CollectionNode],
    ids: BTreeMap<VariableKey, String>,
    diagnostics: Vec<ExportDiagnostic>,
}

impl<'a> ExportContext<'a> {
    /// The identifier map covers the whole scope before any document is built.
    /// A key whose id is already taken keeps it, but is reported.
    fn new(scope: &'a [CollectionNode]) -> Self {
        let mut ids = BTreeMap::new();
        let mut owners: BTreeMap<String, VariableKey> = BTreeMap::new();
        let mut diagnostics = vec![];

        for collection in scope {
            for variable in &collection.variables {
                let key = collection.key_for(variable);
                if ids.contains_key(&key) {
                    continue;
                }
                let id = variable_export_id(&key);
                match owners.get(&id) {
                    Some(owner) => {
                        let message = format!("Export identifier {} collides with {}", id, owner);
                        tracing::warn!(collection = %key.collection_id, variable = %key.variable_id, "{}", message);
                        diagnostics.push(ExportDiagnostic {
                            collection_id: key.collection_id.clone(),
                            variable_id: key.variable_id.clone(),
                            mode_id: None,
                            message,
                        });
                    }
                    None => {
                        owners.insert(id.clone(), key.clone());
                    }
                }
                ids.insert(key, id);
            }
        }

        Self { scope, ids, diagnostics }
    }

    fn run(mut self) -> ExportReport {
        let scope = self.scope;
        let documents = scope.iter().map(|c| self.export_one(c)).collect();
        ExportReport { documents, diagnostics: self.diagnostics }
    }

    fn export_one(&mut self, collection: &CollectionNode) -> CollectionExport {
        let variables: Vec<ExportedVariable> = collection
            .variables
            .iter()
            .map(|variable| self.export_variable(collection, variable))
            .collect();

        tracing::debug!(collection = %collection.id, variables = variables.len(), "collection exported");

        CollectionExport {
            id: collection_export_id(&collection.id),
            name: collection.name.clone(),
            modes: collection.modes.iter().map(|m| (m.id.clone(), m.name.clone())).collect(),
            variable_ids: variables.iter().map(|v| v.id.clone()).collect(),
            variables,
        }
    }

    fn export_variable(&mut self, collection: &CollectionNode, variable: &Variable) -> ExportedVariable {
        let key = collection.key_for(variable);
        let mut values_by_mode = BTreeMap::new();
        let mut resolved_values_by_mode = BTreeMap::new();

        for mode in &collection.modes {
            let (value, preview) = self.resolve_mode(collection, variable, &mode.id);
            values_by_mode.insert(mode.id.clone(), value);
            resolved_values_by_mode.insert(mode.id.clone(), preview);
        }

        let code_syntax = variable
            .code_syntax
            .clone()
            .unwrap_or_else(|| derive_code_syntax(&variable.name));

        ExportedVariable {
            id: self.ids.get(&key).cloned().unwrap_or_else(|| variable_export_id(&key)),
            name: variable.name.clone(),
            description: variable.description.clone().unwrap_or_default(),
            resolved_type: ResolvedType::Color,
            values_by_mode,
            resolved_values_by_mode,
            scopes: variable
                .scopes
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| vec![DEFAULT_SCOPE.to_string()]),
            hidden_from_publishing: false,
            code_syntax: BTreeMap::from([(CODE_SYNTAX_TARGET.to_string(), code_syntax)]),
        }
    }

    fn resolve_mode(
        &mut self,
        collection: &CollectionNode,
        variable: &Variable,
        mode_id: &str,
    ) -> (ExportValue, ResolvedPreview) {
        let fallback = (ExportValue::Color(Rgba::BLACK), ResolvedPreview::literal(Rgba::BLACK));

        match variable.values_by_mode.get(mode_id) {
            None => fallback,
            Some(VariableValue::Color { value }) => match Rgba::from_hex(value) {
                Ok(color) => (ExportValue::Color(color), ResolvedPreview::literal(color)),
                Err(e) => {
                    self.diagnose(collection, variable, mode_id, e.to_string());
                    fallback
                }
            },
            Some(alias @ VariableValue::Alias { .. }) => {
                let Some(target_key) = alias.alias_target(&collection.id) else {
                    return fallback;
                };
                match self.resolve_alias(&target_key, mode_id) {
                    Ok(resolved) => resolved,
                    Err(message) => {
                        self.diagnose(collection, variable, mode_id, message);
                        fallback
                    }
                }
            }
        }
    }

    fn resolve_alias(
        &self,
        target_key: &VariableKey,
        mode_id: &str,
    ) -> Result<(ExportValue, ResolvedPreview), String> {
        let target_collection = self
            .scope
            .iter()
            .find(|c| c.id == target_key.collection_id)
            .ok_or_else(|| format!("Alias target collection \"{}\" not found", target_key.collection_id))?;
        let target = target_collection.variable(&target_key.variable_id).ok_or_else(|| {
            format!(
                "Alias target variable \"{}\" not found in collection \"{}\"",
                target_key.variable_id, target_collection.name
            )
        })?;
        let id = self
            .ids
            .get(target_key)
            .ok_or_else(|| format!("No export identifier for alias target {}", target_key))?;

        // One hop only: an aliased or missing target value previews as black
        let preview_color = match target.values_by_mode.get(mode_id) {
            Some(VariableValue::Color { value }) => Rgba::from_hex(value).unwrap_or(Rgba::BLACK),
            _ => Rgba::BLACK,
        };

        Ok((
            ExportValue::Alias(AliasReference { kind: AliasKind::VariableAlias, id: id.clone() }),
            ResolvedPreview {
                resolved_value: preview_color,
                alias: Some(id.clone()),
                alias_name: Some(target.name.clone()),
            },
        ))
    }

    fn diagnose(&mut self, collection: &CollectionNode, variable: &Variable, mode_id: &str, message: String) {
        tracing::warn!(
            collection = %collection.id,
            variable = %variable.id,
            mode = mode_id,
            "{}", message
        );
        self.diagnostics.push(ExportDiagnostic {
            collection_id: collection.id.clone(),
            variable_id: variable.id.clone(),
            mode_id: Some(mode_id.to_string()),
            message,
        });
    }
}
