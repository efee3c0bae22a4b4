//! Recipe step binding-order validation.
//!
//! A recipe step's config may reference another step's output anywhere a
//! value is expected (parameters, timeout, name) via a `{"$ref": "<stepKey>"}`
//! object. A reference is only valid when the referenced step runs *before*
//! the referencing step: self-references and forward references are both
//! rejected. All violations are collected and returned together so callers
//! can surface every problem at once; this never fails fast.
//!
//! Runs before `deploy` commits, never on working-copy saves, which must
//! tolerate transiently invalid in-progress edits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Key that marks a JSON object as a reference to another step's output.
pub const REF_KEY: &str = "$ref";

/// One step of a recipe, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepDef {
    pub step_key: String,
    /// Typed step config; may contain literal values or `$ref` objects.
    pub config: Value,
    /// Keys of steps this step declares a dependency on.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

/// A single invalid reference found during validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BindingError {
    /// The step whose config holds the bad reference.
    pub step_key: String,
    /// Dotted path to the offending field inside the step config.
    pub field_path: String,
    /// The step key the reference points at.
    pub referenced_key: String,
    /// Human-readable description of why the reference is invalid.
    pub message: String,
}

/// Result of [`validate_step_bindings`]: all violations, not just the first.
#[derive(Debug, Clone, Serialize)]
pub struct BindingValidation {
    pub valid: bool,
    pub errors: Vec<BindingError>,
}

/// Check that every `$ref` in every step config targets a strictly earlier
/// step in execution order.
pub fn validate_step_bindings(steps: &[StepDef]) -> BindingValidation {
    // Position index over the ordered step list.
    let positions: HashMap<&str, usize> = steps
        .iter()
        .enumerate()
        .map(|(idx, step)| (step.step_key.as_str(), idx))
        .collect();

    let mut errors = Vec::new();

    for (position, step) in steps.iter().enumerate() {
        collect_refs(&step.config, &mut String::new(), &mut |path, target| {
            match positions.get(target) {
                None => errors.push(BindingError {
                    step_key: step.step_key.clone(),
                    field_path: path.to_string(),
                    referenced_key: target.to_string(),
                    message: format!(
                        "Step '{}' references unknown step '{target}'",
                        step.step_key
                    ),
                }),
                Some(&target_position) if target_position >= position => {
                    let why = if target_position == position {
                        "itself"
                    } else {
                        "a step that runs after it"
                    };
                    errors.push(BindingError {
                        step_key: step.step_key.clone(),
                        field_path: path.to_string(),
                        referenced_key: target.to_string(),
                        message: format!(
                            "Step '{}' references '{target}', which is {why}",
                            step.step_key
                        ),
                    });
                }
                Some(_) => {}
            }
        });
    }

    BindingValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// Walk a config value and invoke `found` for every `$ref` object,
/// passing the dotted field path and the referenced step key.
fn collect_refs(value: &Value, path: &mut String, found: &mut impl FnMut(&str, &str)) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(target)) = map.get(REF_KEY) {
                found(path, target);
                return;
            }
            for (key, child) in map {
                let saved = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(key);
                collect_refs(child, path, found);
                path.truncate(saved);
            }
        }
        Value::Array(items) => {
            for (idx, item) in items.iter().enumerate() {
                let saved = path.len();
                if !path.is_empty() {
                    path.push('.');
                }
                path.push_str(&idx.to_string());
                collect_refs(item, path, found);
                path.truncate(saved);
            }
        }
        _ => {}
    }
}
