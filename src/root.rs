use serde::Deserialize;
use std::{
    any::Any,
    panic::{catch_unwind, AssertUnwindSafe},
};
use tracing::{error, warn};

use crate::{
    error::{AddChildError, AddChildResult, LoadError},
    nodes::parse_config,
    parser::{NodeRecord, ValidationReport},
    BehaviorNode, Context, NodeContainer, NodeSnapshot, NodeStatus, NodeType, NumChildren,
    Properties, TreeStats,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RootConfig {
    /// Time budget of a single run in milliseconds, measured from the tick
    /// that started it
    pub max_execution_time: Option<u64>,
    pub debug: bool,
    pub profiling: bool,
}

/// The entry point of a tree. Applies the tree-wide options and shields the
/// host from faults below it.
#[derive(Debug, Default)]
pub struct RootNode {
    config: RootConfig,
    run_started: Option<u64>,
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg
    } else {
        "unknown panic"
    }
}

impl RootNode {
    pub fn new(config: RootConfig) -> Self {
        Self {
            config,
            run_started: None,
        }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, serde_json::Error> {
        parse_config(properties).map(Self::new)
    }
}

impl BehaviorNode for RootNode {
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        ctx.debug |= self.config.debug;
        ctx.profiling |= self.config.profiling;

        let Some((child, rest)) = children.split_first_mut() else {
            return NodeStatus::Failure;
        };
        if !rest.is_empty() {
            warn!(
                children = rest.len() + 1,
                "root has more than one child, only the first is used"
            );
        }

        let started = *self.run_started.get_or_insert(ctx.now_ms());

        let status = match catch_unwind(AssertUnwindSafe(|| child.tick(ctx))) {
            Ok(status) => status,
            Err(payload) => {
                error!(
                    node = %child.id,
                    panic = panic_message(payload.as_ref()),
                    "tree evaluation panicked"
                );
                ctx.log("error", panic_message(payload.as_ref()), &child.id);
                child.reset();
                self.run_started = None;
                return NodeStatus::Error;
            }
        };

        if let Some(budget) = self.config.max_execution_time {
            let elapsed = ctx.now_ms().saturating_sub(started);
            if elapsed > budget {
                warn!(elapsed, budget, "tree run exceeded its time budget");
                child.reset();
                self.run_started = None;
                return NodeStatus::Error;
            }
        }

        if status.is_terminal() {
            self.run_started = None;
        }
        status
    }

    fn reset(&mut self) {
        self.run_started = None;
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }

    fn validate(&self, children: &[NodeContainer]) -> Vec<String> {
        if children.len() == 1 {
            vec![]
        } else {
            vec![format!("root needs exactly one child, found {}", children.len())]
        }
    }
}

/// An owned tree, always topped by a `Root` node.
pub struct BehaviorTree {
    root: NodeContainer,
}

impl BehaviorTree {
    /// Puts `child` under a `Root` with default options.
    pub fn new(child: NodeContainer) -> Self {
        let mut root = NodeContainer::new(NodeType::Root, "Root", Box::new(RootNode::default()));
        root.child_nodes.push(child);
        Self { root }
    }

    pub fn from_root(root: NodeContainer) -> Result<Self, LoadError> {
        if root.ty != NodeType::Root {
            return Err(LoadError::MissingRoot(root.ty.to_string()));
        }
        Ok(Self { root })
    }

    /// Evaluates the tree once from the top.
    pub fn tick(&mut self, ctx: &mut Context) -> NodeStatus {
        self.root.tick(ctx)
    }

    /// Returns every node to `Ready`, abandoning any run in progress.
    pub fn reset(&mut self) {
        self.root.reset();
    }

    pub fn status(&self) -> NodeStatus {
        self.root.status
    }

    pub fn root(&self) -> &NodeContainer {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut NodeContainer {
        &mut self.root
    }

    pub fn into_root(self) -> NodeContainer {
        self.root
    }

    pub fn find(&self, id: &str) -> Option<&NodeContainer> {
        self.root.find(id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut NodeContainer> {
        self.root.find_mut(id)
    }

    pub fn path_of(&self, id: &str) -> Option<String> {
        self.root.path_of(id)
    }

    /// Appends `child` under the node `parent_id`. Every id in `child` must
    /// be unused anywhere in this tree.
    pub fn add_child(&mut self, parent_id: &str, child: NodeContainer) -> AddChildResult {
        self.insert_child(parent_id, usize::MAX, child)
    }

    /// Like [`NodeContainer::insert_child`], with ids checked against the
    /// whole tree.
    pub fn insert_child(
        &mut self,
        parent_id: &str,
        index: usize,
        child: NodeContainer,
    ) -> AddChildResult {
        self.root.check_unique_ids(&child)?;
        self.root
            .find_mut(parent_id)
            .ok_or_else(|| AddChildError::UnknownParent(parent_id.to_owned()))?
            .insert_child(index, child)
    }

    pub fn stats(&self) -> TreeStats {
        self.root.stats()
    }

    pub fn snapshot(&self) -> NodeSnapshot {
        self.root.snapshot()
    }

    /// Structural and configuration findings of the built tree.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = vec![];
        self.root.validate_recurse("root", &mut errors);
        ValidationReport::from_errors(errors)
    }

    pub fn to_record(&self) -> NodeRecord {
        NodeRecord::from(&self.root)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        self.to_record().to_json()
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        self.to_record().to_yaml()
    }
}
