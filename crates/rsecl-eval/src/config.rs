//! YAML configuration for compile options.
//!
//! ```yaml
//! legacy_attributes:
//!   process.exe: process.file.path
//! constants:
//!   MAX_DEPTH: 8
//!   SHELLS: [bash, zsh, sh]
//!   ROOT_ONLY: true
//! ```
//!
//! Constants are typed by their YAML shape.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::evaluator::{
    BoolArrayEvaluator, BoolEvaluator, Evaluator, IntArrayEvaluator, IntEvaluator,
    StringArrayEvaluator, StringEvaluator,
};
use crate::model::Field;
use crate::state::CompileOptions;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A constant value as written in configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConstantValue {
    Bool(bool),
    Int(i64),
    String(String),
    BoolArray(Vec<bool>),
    IntArray(Vec<i64>),
    StringArray(Vec<String>),
}

impl From<ConstantValue> for Evaluator {
    fn from(value: ConstantValue) -> Self {
        match value {
            ConstantValue::Bool(v) => BoolEvaluator::from_value(v).into(),
            ConstantValue::Int(v) => IntEvaluator::from_value(v).into(),
            ConstantValue::String(v) => StringEvaluator::from_value(v).into(),
            ConstantValue::BoolArray(v) => BoolArrayEvaluator::from_values(v).into(),
            ConstantValue::IntArray(v) => IntArrayEvaluator::from_values(v).into(),
            ConstantValue::StringArray(v) => StringArrayEvaluator::from_values(v).into(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct OptionsFile {
    #[serde(default)]
    legacy_attributes: HashMap<Field, Field>,
    #[serde(default)]
    constants: HashMap<String, ConstantValue>,
}

impl CompileOptions {
    /// Load legacy attributes and constants from YAML. Macros are compiled
    /// against a model and are added afterwards.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let file: OptionsFile = serde_yaml::from_str(yaml)?;
        Ok(CompileOptions {
            legacy_attributes: file.legacy_attributes,
            constants: file
                .constants
                .into_iter()
                .map(|(name, value)| (name, value.into()))
                .collect(),
            macros: HashMap::new(),
        })
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        CompileOptions::from_yaml(&content)
    }
}
