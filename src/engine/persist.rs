//! Serialized form of an engine's formula set.
//!
//! A [`FormulaSet`] is an ordered list of `{path, formula, comment?}` records plus their count.
//! Paths and formulas are stored in their textual form; restoring re-parses both and goes through
//! [`ExpressionEngine::set_formula`], so every restored formula is validated again.

use serde::{Deserialize, Serialize};

use super::base::ExpressionEngine;
use crate::{formula::FormulaParser, model::AttributeHost, paths::PathIdentifier, PathflowError};

fn is_false(value: &bool) -> bool {
    !value
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormulaEntry {
    pub path: String,
    pub formula: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FormulaSet {
    pub count: usize,
    #[serde(default)]
    pub formulas: Vec<FormulaEntry>,
}

impl FormulaSet {
    pub fn new(formulas: Vec<FormulaEntry>) -> FormulaSet {
        FormulaSet {
            count: formulas.len(),
            formulas,
        }
    }

    pub fn to_toml(&self) -> Result<String, PathflowError> {
        Ok(toml::to_string(self)?)
    }

    pub fn from_toml(text: &str) -> Result<FormulaSet, PathflowError> {
        Ok(toml::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, PathflowError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<FormulaSet, PathflowError> {
        Ok(serde_json::from_str(text)?)
    }
}

impl ExpressionEngine {
    /// Records in target order.
    pub fn save(&self) -> FormulaSet {
        FormulaSet::new(
            self.records()
                .into_iter()
                .map(|(path, record)| FormulaEntry {
                    path: path.to_string(),
                    formula: record.formula.to_string(),
                    comment: record.comment,
                    disabled: record.disabled,
                })
                .collect(),
        )
    }

    /// Replace the stored formulas with those of `set`.
    ///
    /// The store is cleared first. A record that fails to parse or validate aborts the restore
    /// with the records before it kept.
    #[tracing::instrument(skip_all, fields(owner = %self.owner(), count = set.count))]
    pub fn restore(
        &self,
        host: &dyn AttributeHost,
        parser: &dyn FormulaParser,
        set: &FormulaSet,
    ) -> Result<(), PathflowError> {
        if set.count != set.formulas.len() {
            return Err(PathflowError::Serialization(format!(
                "formula set declares {} records but holds {}",
                set.count,
                set.formulas.len()
            )));
        }
        self.clear_all();
        for entry in &set.formulas {
            let path = entry.path.parse::<PathIdentifier>()?;
            let formula = parser.parse(&entry.formula, &self.owner())?;
            self.set_formula(host, &path, formula, entry.comment.clone())?;
            if entry.disabled {
                self.set_disabled(host, &path, true)?;
            }
        }
        tracing::debug!("[Engine] restored {} formulas", set.count);
        Ok(())
    }
}
