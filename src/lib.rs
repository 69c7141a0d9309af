//! # behavior-tree-engine (Rust crate)
//!
//! A behavior tree interpreter for agent decision making.
//!
//!
//! ## Overview
//!
//! A behavior tree is a tree of control, decorator and leaf nodes that is
//! evaluated repeatedly ("ticked") by a host control loop.
//! Each tick re-enters the tree from the root, and nodes that reported
//! `Running` on the previous tick resume exactly where they left off instead of
//! starting over.
//!
//! The node types form a closed set:
//!
//! * Composites: `Selector`, `Sequence`, `Parallel`
//! * Decorators: `Inverter`, `Repeater`
//! * Leaves: `Action`, `Condition`
//! * `Root`, the entry point of a tree, which applies tree-wide options
//!
//! `Retry`, `Timeout` and `Cooldown` are reserved tags without implementation.
//!
//!
//! ## How it looks like
//!
//! Trees are usually loaded from data. The serialized form is a plain nested
//! record, which can be written in JSON or YAML.
//!
//! ```yaml
//! id: root
//! type: Root
//! name: Guard
//! x: 0.0
//! y: 0.0
//! children:
//! - id: patrol
//!   type: Sequence
//!   name: Patrol
//!   x: 0.0
//!   y: 100.0
//!   children:
//!   - id: low
//!     type: Condition
//!     name: Healthy?
//!     x: 0.0
//!     y: 200.0
//!     properties:
//!       conditionType: health
//!       operator: greater
//!       value: 50
//! ```
//!
//! A [`Registry`] maps every type tag to a constructor.
//! Host code that custom `Action` and `Condition` nodes refer to is registered
//! on it by name before loading.
//!
//! ```rust
//! # use behavior_tree_engine::*;
//! let mut registry = Registry::default();
//! registry.register_action("shout", |ctx: &mut Context| {
//!     ctx.set("shouted", true);
//!     Ok(NodeStatus::Success)
//! });
//!
//! let source = r#"{
//!     "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
//!     "children": [{
//!         "id": "a", "type": "Action", "name": "Shout", "x": 0, "y": 100,
//!         "properties": { "actionType": "custom", "script": "shout" }
//!     }]
//! }"#;
//! let mut tree = load_json(source, &registry).unwrap();
//!
//! let mut ctx = Context::default();
//! assert_eq!(tree.tick(&mut ctx), NodeStatus::Success);
//! assert_eq!(ctx.get_as::<bool>("shouted"), Some(true));
//! ```
//!
//! The caller decides when the next tick happens. `Running` is only a
//! signal that the tree wants to be ticked again.
//!
//!
//! ## The context
//!
//! A [`Context`] carries everything the tree can touch: a blackboard of named
//! values, and optional handles to the agent, the world and a logger.
//! All of them are borrowed for the duration of the context, so the tree can
//! drive objects with any lifetime.
//!
//! ```rust
//! # use behavior_tree_engine::*;
//! struct Scout { pos: Vec2, hp: f64 }
//!
//! impl Agent for Scout {
//!     fn position(&self) -> Vec2 { self.pos }
//!     fn set_position(&mut self, pos: Vec2) { self.pos = pos }
//!     fn health(&self) -> f64 { self.hp }
//!     fn max_health(&self) -> f64 { 100. }
//! }
//!
//! let mut scout = Scout { pos: Vec2::new(0., 0.), hp: 80. };
//! let mut ctx = Context::default().with_agent(&mut scout);
//! ctx.set("alarm", false);
//! ```
//!
//!
//! ## How to define your own node
//!
//! The node types are closed, but the behavior behind a node is a
//! [`BehaviorNode`] trait object, so trees can also be assembled in code with
//! any implementation of it.
//!
//! ```rust
//! # use behavior_tree_engine::*;
//! struct AlwaysYes;
//!
//! impl BehaviorNode for AlwaysYes {
//!     fn tick(&mut self, _children: &mut [NodeContainer], _ctx: &mut Context) -> NodeStatus {
//!         NodeStatus::Success
//!     }
//! }
//!
//! let mut seq = NodeContainer::new(NodeType::Sequence, "seq", Box::new(SequenceNode::default()));
//! seq.add_child(NodeContainer::new(NodeType::Action, "yes", Box::new(AlwaysYes))).unwrap();
//! let mut tree = BehaviorTree::new(seq);
//! assert_eq!(tree.tick(&mut Context::default()), NodeStatus::Success);
//! ```
//!
//!
//! ## Validation and statistics
//!
//! Candidate data can be checked before it is loaded with
//! [`validate_tree`], which reports every structural violation with the path
//! to the offending node (`root.child[2].child[0]`) instead of failing on
//! the first one. Built trees can report [`TreeStats`] and a
//! [`NodeSnapshot`] of every node's status for an editor to display.

mod container;
mod context;
pub mod error;
mod leaf;
mod node_type;
mod nodes;
pub mod parser;
mod registry;
mod root;

use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};

pub use crate::container::{Layout, NodeContainer, NodeSnapshot, TreeStats};
pub use crate::context::{
    Agent, Blackboard, Clock, Context, Entity, Logger, ManualClock, Vec2, World, WorldObject,
};
pub use crate::leaf::{ActionNode, ComparisonOperator, ConditionNode};
pub use crate::node_type::{NodeCategory, NodeType};
pub use crate::nodes::{
    InverterNode, ParallelNode, ParallelPolicy, RepeatUntil, RepeaterNode, SelectorNode,
    SelectorOrder, SequenceNode,
};
pub use crate::root::{BehaviorTree, RootNode};
pub use crate::{
    parser::{
        clone_subtree, load, load_json, load_node, load_yaml, validate_node, validate_tree,
        NodeRecord, ValidationReport,
    },
    registry::{ActionScript, ConditionScript, Constructor, Properties, Registry},
};

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Not ticked since creation or the last reset
    Ready,
    /// The node should keep running in the next tick
    Running,
    Success,
    Failure,
    /// Unexpected fault, terminal like `Failure` but never recovered from by
    /// composites on their own
    Error,
}

impl NodeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failure | Self::Error)
    }

    pub fn is_running(self) -> bool {
        self == Self::Running
    }

    /// Swaps `Success` and `Failure`, leaving the other statuses alone.
    pub fn invert(self) -> Self {
        match self {
            Self::Success => Self::Failure,
            Self::Failure => Self::Success,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Success => "success",
            Self::Failure => "failure",
            Self::Error => "error",
        }
    }
}

impl Display for NodeStatus {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum NumChildren {
    Finite(usize),
    Infinite,
}

impl PartialOrd for NumChildren {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(match (self, other) {
            (NumChildren::Finite(_), NumChildren::Infinite) => std::cmp::Ordering::Less,
            (NumChildren::Infinite, NumChildren::Finite(_)) => std::cmp::Ordering::Greater,
            (NumChildren::Finite(lhs), NumChildren::Finite(rhs)) => lhs.cmp(rhs),
            (NumChildren::Infinite, NumChildren::Infinite) => return None,
        })
    }
}

/// The behavior behind a node.
///
/// A node's children are owned by its [`NodeContainer`] and lent to `tick`,
/// so implementations only keep their own bookkeeping (resumption cursors,
/// retry counters and so on).
pub trait BehaviorNode {
    /// Evaluates the node once. Must not return [`NodeStatus::Ready`].
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus;

    /// Discards resumption bookkeeping. Children are reset by the container.
    fn reset(&mut self) {}

    /// `Finite(0)` nodes reject children outright. Any other limit is only
    /// reported by [`BehaviorNode::validate`].
    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(0)
    }

    /// Returns human readable findings about this node's configuration.
    fn validate(&self, _children: &[NodeContainer]) -> Vec<String> {
        vec![]
    }
}
