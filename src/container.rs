use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, HashSet},
    time::{Duration, Instant},
};
use tracing::{debug, error, warn};

use crate::{
    error::{AddChildError, AddChildResult, LoadError},
    BehaviorNode, Context, NodeCategory, NodeStatus, NodeType, NumChildren, Properties, Registry,
};

/// Editor-side placement of a node. Carried only so trees round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            x: 0.,
            y: 0.,
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

pub(crate) const DEFAULT_WIDTH: f64 = 150.;
pub(crate) const DEFAULT_HEIGHT: f64 = 60.;

/// A node of the tree: identity, layout and configuration, execution
/// bookkeeping, and the children it exclusively owns.
pub struct NodeContainer {
    pub(crate) id: String,
    pub(crate) ty: NodeType,
    pub(crate) name: String,
    pub(crate) layout: Layout,
    pub(crate) properties: Properties,
    pub(crate) node: Box<dyn BehaviorNode>,
    pub(crate) child_nodes: Vec<NodeContainer>,
    pub(crate) status: NodeStatus,
    pub(crate) tick_count: u64,
    pub(crate) last_tick: Option<u64>,
    pub(crate) total_time: Duration,
}

/// Per-node status for display, mirroring the tree's shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub ty: NodeType,
    pub name: String,
    pub status: NodeStatus,
    pub tick_count: u64,
    pub last_tick: Option<u64>,
    pub total_time_micros: u128,
    pub children: Vec<NodeSnapshot>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeStats {
    pub total_nodes: usize,
    pub nodes_by_type: BTreeMap<String, usize>,
    /// A lone node has depth 1.
    pub max_depth: usize,
    pub leaf_count: usize,
}

pub(crate) fn child_path(parent: &str, index: usize) -> String {
    format!("{}.child[{}]", parent, index)
}

impl NodeContainer {
    /// Wraps a behavior with a freshly generated id and default layout.
    pub fn new(ty: NodeType, name: impl Into<String>, node: Box<dyn BehaviorNode>) -> Self {
        Self {
            id: fresh_id(),
            ty,
            name: name.into(),
            layout: Layout::default(),
            properties: Properties::new(),
            node,
            child_nodes: vec![],
            status: NodeStatus::Ready,
            tick_count: 0,
            last_tick: None,
            total_time: Duration::ZERO,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    /// Ticks the node once. Context flags raised by the node (a Root's debug
    /// and profiling options) only last for this call.
    pub fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        let flags = (ctx.debug, ctx.profiling);
        let started = if ctx.profiling() {
            Some(Instant::now())
        } else {
            None
        };

        let mut status = self.node.tick(&mut self.child_nodes, ctx);
        if status == NodeStatus::Ready {
            error!(node = %self.id, ty = %self.ty, "node returned Ready from tick");
            status = NodeStatus::Error;
        }

        self.status = status;
        self.tick_count += 1;
        self.last_tick = Some(ctx.now_ms());
        if let Some(started) = started {
            self.total_time += started.elapsed();
        }

        if ctx.debug() {
            debug!(node = %self.id, ty = %self.ty, name = %self.name, %status, "tick");
            let message = format!("{} {:?} -> {}", self.ty, self.name, status);
            ctx.log("debug", &message, &self.id);
        }
        (ctx.debug, ctx.profiling) = flags;
        status
    }

    /// Returns the whole subtree to `Ready` and drops every resumption
    /// cursor. Execution counters are kept.
    pub fn reset(&mut self) {
        self.node.reset();
        self.status = NodeStatus::Ready;
        for child in &mut self.child_nodes {
            child.reset();
        }
    }

    pub fn clear_stats(&mut self) {
        self.tick_count = 0;
        self.last_tick = None;
        self.total_time = Duration::ZERO;
        for child in &mut self.child_nodes {
            child.clear_stats();
        }
    }

    pub fn add_child(&mut self, child: NodeContainer) -> AddChildResult {
        let index = self.child_nodes.len();
        self.insert_child(index, child)
    }

    /// Inserts `child` before `index`, clamped to the number of children.
    ///
    /// Ids are checked for uniqueness against this node's own subtree. Use
    /// [`BehaviorTree::insert_child`](crate::BehaviorTree::insert_child) to
    /// check against a whole tree.
    pub fn insert_child(&mut self, index: usize, child: NodeContainer) -> AddChildResult {
        match self.node.max_children() {
            NumChildren::Finite(0) => return Err(AddChildError::TooManyNodes),
            limit => {
                if NumChildren::Finite(self.child_nodes.len()) >= limit {
                    warn!(
                        node = %self.id,
                        ty = %self.ty,
                        "adding a child beyond the expected number of children"
                    );
                }
            }
        }

        self.check_unique_ids(&child)?;

        let index = index.min(self.child_nodes.len());
        self.child_nodes.insert(index, child);
        Ok(())
    }

    /// Detaches a direct child. The returned subtree is owned by the caller,
    /// who can attach it elsewhere.
    pub fn remove_child(&mut self, id: &str) -> Option<NodeContainer> {
        let pos = self.child_nodes.iter().position(|child| child.id == id)?;
        Some(self.child_nodes.remove(pos))
    }

    /// Detaches the node with `id` from anywhere below this node.
    pub fn detach(&mut self, id: &str) -> Option<NodeContainer> {
        if let Some(found) = self.remove_child(id) {
            return Some(found);
        }
        self.child_nodes
            .iter_mut()
            .find_map(|child| child.detach(id))
    }

    pub fn find(&self, id: &str) -> Option<&NodeContainer> {
        if self.id == id {
            return Some(self);
        }
        self.child_nodes.iter().find_map(|child| child.find(id))
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut NodeContainer> {
        if self.id == id {
            return Some(self);
        }
        self.child_nodes
            .iter_mut()
            .find_map(|child| child.find_mut(id))
    }

    /// Reconstructs the path from this node to `id`, e.g. `root.child[1].child[0]`.
    pub fn path_of(&self, id: &str) -> Option<String> {
        self.path_recurse(id, "root")
    }

    fn path_recurse(&self, id: &str, here: &str) -> Option<String> {
        if self.id == id {
            return Some(here.to_owned());
        }
        self.child_nodes
            .iter()
            .enumerate()
            .find_map(|(i, child)| child.path_recurse(id, &child_path(here, i)))
    }

    /// Nodes of the subtree in depth-first pre-order.
    pub fn depth_first(&self) -> Vec<&NodeContainer> {
        let mut ret = vec![];
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            ret.push(node);
            stack.extend(node.child_nodes.iter().rev());
        }
        ret
    }

    /// Fails if any id in `child`'s subtree is already used in this subtree.
    pub(crate) fn check_unique_ids(&self, child: &NodeContainer) -> AddChildResult {
        let mut existing = HashSet::new();
        self.collect_ids(&mut existing);
        let mut incoming = HashSet::new();
        child.collect_ids(&mut incoming);
        match incoming.into_iter().find(|id| existing.contains(id)) {
            Some(id) => Err(AddChildError::DuplicateId(id.to_owned())),
            None => Ok(()),
        }
    }

    fn collect_ids<'a>(&'a self, ids: &mut HashSet<&'a str>) {
        ids.insert(&self.id);
        for child in &self.child_nodes {
            child.collect_ids(ids);
        }
    }

    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats::default();
        self.stats_recurse(1, &mut stats);
        stats
    }

    fn stats_recurse(&self, depth: usize, stats: &mut TreeStats) {
        stats.total_nodes += 1;
        *stats
            .nodes_by_type
            .entry(self.ty.as_str().to_owned())
            .or_default() += 1;
        stats.max_depth = stats.max_depth.max(depth);
        if self.ty.category() == NodeCategory::Leaf {
            stats.leaf_count += 1;
        }
        for child in &self.child_nodes {
            child.stats_recurse(depth + 1, stats);
        }
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        NodeSnapshot {
            id: self.id.clone(),
            ty: self.ty,
            name: self.name.clone(),
            status: self.status,
            tick_count: self.tick_count,
            last_tick: self.last_tick,
            total_time_micros: self.total_time.as_micros(),
            children: self.child_nodes.iter().map(Self::snapshot).collect(),
        }
    }

    /// Collects structural and configuration findings for the subtree.
    pub(crate) fn validate_recurse(&self, path: &str, errors: &mut Vec<String>) {
        if self.name.trim().is_empty() {
            errors.push(format!("{}: node {:?} has no name", path, self.id));
        }
        if self.ty.is_leaf() && !self.child_nodes.is_empty() {
            errors.push(format!(
                "{} ({} {:?}): leaf nodes must not have children",
                path, self.ty, self.name
            ));
        }
        for finding in self.node.validate(&self.child_nodes) {
            errors.push(format!("{} ({} {:?}): {}", path, self.ty, self.name, finding));
        }
        for (i, child) in self.child_nodes.iter().enumerate() {
            child.validate_recurse(&child_path(path, i), errors);
        }
    }

    /// Replaces the property bag and rebuilds this node's behavior from it.
    /// The node's bookkeeping is reset; its children are kept.
    pub fn set_properties(
        &mut self,
        registry: &Registry,
        properties: Properties,
    ) -> Result<(), LoadError> {
        self.node = registry.build(self.ty, &properties)?;
        self.properties = properties;
        self.status = NodeStatus::Ready;
        Ok(())
    }

    pub fn set_property(
        &mut self,
        registry: &Registry,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Result<(), LoadError> {
        let mut properties = self.properties.clone();
        properties.insert(key.into(), value.into());
        self.set_properties(registry, properties)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn ty(&self) -> NodeType {
        self.ty
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn set_layout(&mut self, layout: Layout) {
        self.layout = layout;
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn status(&self) -> NodeStatus {
        self.status
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn total_time(&self) -> Duration {
        self.total_time
    }

    pub fn children(&self) -> &[NodeContainer] {
        &self.child_nodes
    }

    pub fn child_mut(&mut self, index: usize) -> Option<&mut NodeContainer> {
        self.child_nodes.get_mut(index)
    }
}

pub(crate) fn fresh_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
