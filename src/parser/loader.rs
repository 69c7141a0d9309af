use std::collections::HashSet;

use super::record::NodeRecord;
use crate::{
    container::{child_path, fresh_id},
    error::LoadError,
    BehaviorTree, Layout, NodeContainer, NodeStatus, NodeType, Registry,
};

/// Instantiates a whole tree. The top record must be a `Root`.
///
/// Ids are taken from the records as they are; records without an id get a
/// fresh one.
pub fn load(record: &NodeRecord, registry: &Registry) -> Result<BehaviorTree, LoadError> {
    if NodeType::from_tag(&record.ty) != Some(NodeType::Root) {
        return Err(LoadError::MissingRoot(record.ty.clone()));
    }
    let root = load_node(record, registry)?;
    BehaviorTree::from_root(root)
}

/// Instantiates any subtree, keeping the ids of the records.
pub fn load_node(record: &NodeRecord, registry: &Registry) -> Result<NodeContainer, LoadError> {
    let mut ids = HashSet::new();
    load_recurse(record, registry, "root", false, &mut ids)
}

pub fn load_json(source: &str, registry: &Registry) -> Result<BehaviorTree, LoadError> {
    load(&NodeRecord::from_json(source)?, registry)
}

pub fn load_yaml(source: &str, registry: &Registry) -> Result<BehaviorTree, LoadError> {
    load(&NodeRecord::from_yaml(source)?, registry)
}

/// Deep-copies a subtree with every id regenerated. Execution state is not
/// copied; the clone starts `Ready`.
pub fn clone_subtree(node: &NodeContainer, registry: &Registry) -> Result<NodeContainer, LoadError> {
    let mut ids = HashSet::new();
    load_recurse(&NodeRecord::from(node), registry, "root", true, &mut ids)
}

fn load_recurse(
    record: &NodeRecord,
    registry: &Registry,
    path: &str,
    regenerate_ids: bool,
    ids: &mut HashSet<String>,
) -> Result<NodeContainer, LoadError> {
    let ty = NodeType::from_tag(&record.ty).ok_or_else(|| LoadError::UnknownType {
        ty: record.ty.clone(),
        path: path.to_owned(),
    })?;
    let node = registry
        .build(ty, &record.properties)
        .map_err(|e| e.at(path))?;

    let id = if regenerate_ids || record.id.is_empty() {
        fresh_id()
    } else {
        record.id.clone()
    };
    if !ids.insert(id.clone()) {
        return Err(LoadError::DuplicateId {
            id,
            path: path.to_owned(),
        });
    }

    let mut ret = NodeContainer {
        id,
        ty,
        name: record.name.clone(),
        layout: Layout {
            x: record.x,
            y: record.y,
            width: record.width,
            height: record.height,
        },
        properties: record.properties.clone(),
        node,
        child_nodes: Vec::with_capacity(record.children.len()),
        status: NodeStatus::Ready,
        tick_count: 0,
        last_tick: None,
        total_time: Default::default(),
    };

    for (i, child) in record.children.iter().enumerate() {
        let child_path = child_path(path, i);
        let child_node = load_recurse(child, registry, &child_path, regenerate_ids, ids)?;
        ret.add_child(child_node)
            .map_err(|source| LoadError::AddChild {
                path: format!("{} ({} {:?})", path, ty, record.name),
                source,
            })?;
    }

    Ok(ret)
}

#[cfg(test)]
mod test;
