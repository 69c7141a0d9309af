use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;

use crate::{container::child_path, NodeCategory, NodeType};

/// Findings of a validation pass. Violations are data, not errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }
}

/// Checks a candidate tree in its serialized shape, before anything is
/// built from it. Every violation is reported with the path to its node.
pub fn validate_tree(value: &Value) -> ValidationReport {
    let mut errors = vec![];
    let mut ids = HashSet::new();
    validate_recurse(value, "root", &mut ids, &mut errors);
    ValidationReport::from_errors(errors)
}

/// Checks a single node. Its children are counted but not inspected.
pub fn validate_node(value: &Value) -> ValidationReport {
    let mut errors = vec![];
    validate_one(value, "root", &mut errors);
    ValidationReport::from_errors(errors)
}

fn validate_recurse<'a>(
    value: &'a Value,
    path: &str,
    ids: &mut HashSet<&'a str>,
    errors: &mut Vec<String>,
) {
    if let Some(id) = value.get("id").and_then(Value::as_str) {
        if !id.is_empty() && !ids.insert(id) {
            errors.push(format!("{}: duplicate node id {:?}", path, id));
        }
    }
    if let Some(children) = validate_one(value, path, errors) {
        for (i, child) in children.iter().enumerate() {
            validate_recurse(child, &child_path(path, i), ids, errors);
        }
    }
}

fn validate_one<'a>(value: &'a Value, path: &str, errors: &mut Vec<String>) -> Option<&'a Vec<Value>> {
    let Some(node) = value.as_object() else {
        errors.push(format!("{}: node must be an object", path));
        return None;
    };

    let name = node.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.trim().is_empty() {
        errors.push(format!("{}: node has no name", path));
    }

    for axis in ["x", "y"] {
        if !node.get(axis).map_or(false, Value::is_number) {
            errors.push(format!("{}: position {} must be a number", path, axis));
        }
    }

    let children = match node.get("children") {
        None => None,
        Some(Value::Array(children)) => Some(children),
        Some(_) => {
            errors.push(format!("{}: children must be a list", path));
            None
        }
    };
    let num_children = children.map_or(0, Vec::len);

    match node.get("type").and_then(Value::as_str) {
        None => errors.push(format!("{}: missing node type", path)),
        Some(tag) => match NodeType::from_tag(tag) {
            None => errors.push(format!("{}: unknown node type {:?}", path, tag)),
            Some(ty) => match ty.category() {
                NodeCategory::Leaf if num_children > 0 => errors.push(format!(
                    "{} ({} {:?}): leaf nodes must not have children",
                    path, ty, name
                )),
                NodeCategory::Decorator | NodeCategory::Root if num_children > 1 => {
                    errors.push(format!(
                        "{} ({} {:?}): may have at most one child, found {}",
                        path, ty, name, num_children
                    ))
                }
                _ => (),
            },
        },
    }

    children
}
