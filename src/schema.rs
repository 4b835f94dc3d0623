use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::{json, Value};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Invalid {0} schema: {1}")]
    Schema(&'static str, String),
    #[error("Invalid {kind} {path:?}:\n{}", .errors.join("\n"))]
    Invalid {
        kind: &'static str,
        path: PathBuf,
        errors: Vec<String>,
    },
}

/// Configuration files checked before anything runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schema {
    Strategies,
    MergeConfig,
    ExecutorConfig,
}

impl Schema {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Strategies => "strategies",
            Self::MergeConfig => "merge config",
            Self::ExecutorConfig => "executor config",
        }
    }

    fn definition(&self) -> Value {
        match self {
            Self::Strategies => strategies(),
            Self::MergeConfig => json!({
                "type": "object",
                "required": ["regions"],
                "properties": {
                    "regions": {
                        "type": "array",
                        "minItems": 1,
                        "items": {
                            "type": "object",
                            "required": ["strategies"],
                            "properties": { "strategies": strategies() },
                            "additionalProperties": false,
                        },
                    },
                },
                "additionalProperties": false,
            }),
            Self::ExecutorConfig => json!({
                "type": "object",
                "required": ["executor"],
                "properties": {
                    "executor": {
                        "type": "object",
                        "properties": {
                            "cluster": { "enum": ["debug", "local", "slurm"] },
                            "poll_interval": { "type": "number", "minimum": 0 },
                            "max_parallel": { "type": "integer", "minimum": 1 },
                            "partition": { "type": "string" },
                            "account": { "type": "string" },
                            "time": { "type": "string" },
                            "mem": { "type": "string" },
                            "extra_args": { "type": "array", "items": { "type": "string" } },
                            "program": { "type": "string" },
                        },
                        "additionalProperties": false,
                    },
                },
                "additionalProperties": false,
            }),
        }
    }

    /// Check an already loaded document, collecting every violation.
    pub fn validate(&self, instance: &Value, path: &Path) -> Result<(), Error> {
        let definition = self.definition();
        let compiled = jsonschema::JSONSchema::compile(&definition)
            .map_err(|e| Error::Schema(self.name(), e.to_string()))?;
        let result = compiled.validate(instance);
        if let Err(errors) = result {
            let errors = errors
                .map(|e| format!("  at '{}': {}", e.instance_path, e))
                .collect();
            return Err(Error::Invalid {
                kind: self.name(),
                path: path.to_path_buf(),
                errors,
            });
        }
        Ok(())
    }

    /// Read a YAML file and check it.
    pub fn validate_file(&self, path: &Path) -> Result<()> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("while reading {} {:?}", self.name(), path))?;
        let instance: Value = serde_yaml::from_str(&text)
            .with_context(|| format!("while parsing {} {:?}", self.name(), path))?;
        self.validate(&instance, path)?;
        Ok(())
    }
}

fn params() -> Value {
    json!({ "type": ["number", "string"] })
}

fn sample() -> Value {
    json!({
        "oneOf": [
            { "type": "string" },
            {
                "type": "object",
                "properties": {
                    "size": { "type": "integer", "minimum": 1 },
                    "target": { "type": "string" },
                    "region": { "type": "string" },
                    "assume_syns_bouton": { "type": "number" },
                    "pre": { "type": "string" },
                    "post": { "type": "string" },
                },
                "additionalProperties": false,
            },
        ],
    })
}

fn bouton_reduction() -> Value {
    json!({
        "type": "object",
        "required": ["bio_data"],
        "properties": {
            "bio_data": { "type": ["number", "string"] },
            "sample": sample(),
        },
        "additionalProperties": false,
    })
}

fn strategies() -> Value {
    let formula = json!({ "type": "string", "minLength": 1 });
    json!({
        "type": "array",
        "items": {
            "type": "object",
            "minProperties": 1,
            "maxProperties": 1,
            "properties": {
                "add_constraints": {
                    "type": "object",
                    "additionalProperties": params(),
                },
                "generalized_cv": {
                    "type": "object",
                    "required": ["cv"],
                    "properties": { "cv": { "type": "number" } },
                    "additionalProperties": false,
                },
                "override_mtype": {
                    "type": "object",
                    "required": ["mtype_pattern"],
                    "properties": { "mtype_pattern": { "type": "string" } },
                    "additionalProperties": params(),
                },
                "existing_recipe": {
                    "type": "object",
                    "required": ["recipe_path"],
                    "properties": { "recipe_path": { "type": "string" } },
                    "additionalProperties": false,
                },
                "experimental_syns_con": {
                    "type": "object",
                    "required": ["bio_data"],
                    "properties": { "bio_data": { "type": "string" } },
                    "additionalProperties": false,
                },
                "estimate_bouton_reduction": bouton_reduction(),
                "estimate_individual_bouton_reduction": bouton_reduction(),
                "estimate_syns_con": {
                    "type": "object",
                    "required": ["formula"],
                    "properties": {
                        "formula": formula,
                        "formula_ee": formula,
                        "formula_ei": formula,
                        "formula_ie": formula,
                        "formula_ii": formula,
                        "max_value": { "type": "number" },
                        "sample": sample(),
                    },
                    "additionalProperties": false,
                },
            },
            "additionalProperties": false,
        },
    })
}
