use ::once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

/// The closed set of node type tags a tree can be made of.
///
/// `Retry`, `Timeout` and `Cooldown` are reserved tags: they are recognized
/// by the parser and the validator, but the default registry has no
/// constructor for them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    Root,
    Selector,
    Sequence,
    Parallel,
    Inverter,
    Repeater,
    Action,
    Condition,
    Retry,
    Timeout,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeCategory {
    Root,
    Composite,
    Decorator,
    Leaf,
}

static TAGS: Lazy<HashMap<&'static str, NodeType>> = Lazy::new(|| {
    NodeType::ALL
        .iter()
        .map(|ty| (ty.as_str(), *ty))
        .collect()
});

impl NodeType {
    pub const ALL: [NodeType; 11] = [
        NodeType::Root,
        NodeType::Selector,
        NodeType::Sequence,
        NodeType::Parallel,
        NodeType::Inverter,
        NodeType::Repeater,
        NodeType::Action,
        NodeType::Condition,
        NodeType::Retry,
        NodeType::Timeout,
        NodeType::Cooldown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Selector => "Selector",
            Self::Sequence => "Sequence",
            Self::Parallel => "Parallel",
            Self::Inverter => "Inverter",
            Self::Repeater => "Repeater",
            Self::Action => "Action",
            Self::Condition => "Condition",
            Self::Retry => "Retry",
            Self::Timeout => "Timeout",
            Self::Cooldown => "Cooldown",
        }
    }

    /// Looks up a tag as it appears in serialized trees.
    pub fn from_tag(tag: &str) -> Option<Self> {
        TAGS.get(tag).copied()
    }

    pub fn category(self) -> NodeCategory {
        match self {
            Self::Root => NodeCategory::Root,
            Self::Selector | Self::Sequence | Self::Parallel => NodeCategory::Composite,
            Self::Inverter | Self::Repeater | Self::Retry | Self::Timeout | Self::Cooldown => {
                NodeCategory::Decorator
            }
            Self::Action | Self::Condition => NodeCategory::Leaf,
        }
    }

    pub fn is_leaf(self) -> bool {
        self.category() == NodeCategory::Leaf
    }

    pub fn is_decorator(self) -> bool {
        self.category() == NodeCategory::Decorator
    }

    pub fn is_reserved(self) -> bool {
        matches!(self, Self::Retry | Self::Timeout | Self::Cooldown)
    }
}

impl Display for NodeType {
    fn fmt(&self, fmt: &mut Formatter) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}
