use serde_json::{Map, Value};
use std::{collections::HashMap, rc::Rc};

use crate::{
    error::{LoadError, ScriptError},
    leaf::{ActionNode, ConditionNode},
    nodes::{InverterNode, ParallelNode, RepeaterNode, SelectorNode, SequenceNode},
    root::RootNode,
    BehaviorNode, Context, NodeContainer, NodeStatus, NodeType,
};

/// Named configuration values of a node.
pub type Properties = Map<String, Value>;

pub type ActionScript = Rc<dyn Fn(&mut Context) -> Result<NodeStatus, ScriptError>>;
pub type ConditionScript = Rc<dyn Fn(&mut Context) -> Result<bool, ScriptError>>;

pub type Constructor =
    Box<dyn Fn(&Properties, &Registry) -> Result<Box<dyn BehaviorNode>, LoadError>>;

/// Wraps a node's `from_properties` into a [`Constructor`].
pub fn boxify<T>(
    ty: NodeType,
    cons: impl (Fn(&Properties) -> Result<T, serde_json::Error>) + 'static,
) -> Constructor
where
    T: BehaviorNode + 'static,
{
    Box::new(move |properties: &Properties, _: &Registry| {
        cons(properties)
            .map(|node| Box::new(node) as Box<dyn BehaviorNode>)
            .map_err(|source| LoadError::InvalidProperties {
                ty: ty.to_string(),
                path: String::new(),
                source,
            })
    })
}

fn build_action(
    properties: &Properties,
    registry: &Registry,
) -> Result<Box<dyn BehaviorNode>, LoadError> {
    Ok(Box::new(ActionNode::build(properties, registry)?))
}

fn build_condition(
    properties: &Properties,
    registry: &Registry,
) -> Result<Box<dyn BehaviorNode>, LoadError> {
    Ok(Box::new(ConditionNode::build(properties, registry)?))
}

/// Constructors of the implemented node types. Reserved tags have none.
fn builtin(ty: NodeType) -> Option<Constructor> {
    let constructor: Constructor = match ty {
        NodeType::Root => boxify(ty, RootNode::from_properties),
        NodeType::Selector => boxify(ty, SelectorNode::from_properties),
        NodeType::Sequence => boxify(ty, SequenceNode::from_properties),
        NodeType::Parallel => boxify(ty, ParallelNode::from_properties),
        NodeType::Inverter => boxify(ty, InverterNode::from_properties),
        NodeType::Repeater => boxify(ty, RepeaterNode::from_properties),
        NodeType::Action => Box::new(build_action),
        NodeType::Condition => Box::new(build_condition),
        NodeType::Retry | NodeType::Timeout | NodeType::Cooldown => return None,
    };
    Some(constructor)
}

/// Maps node types to constructors, and script names to host code.
pub struct Registry {
    node_types: HashMap<NodeType, Constructor>,
    actions: HashMap<String, ActionScript>,
    conditions: HashMap<String, ConditionScript>,
}

impl Default for Registry {
    fn default() -> Self {
        let mut ret = Self {
            node_types: HashMap::new(),
            actions: HashMap::new(),
            conditions: HashMap::new(),
        };
        for ty in NodeType::ALL {
            if let Some(constructor) = builtin(ty) {
                ret.register(ty, constructor);
            }
        }
        ret
    }
}

impl Registry {
    /// Replaces the constructor of a node type.
    pub fn register(&mut self, ty: NodeType, constructor: Constructor) {
        self.node_types.insert(ty, constructor);
    }

    pub fn register_action(
        &mut self,
        name: impl ToString,
        script: impl Fn(&mut Context) -> Result<NodeStatus, ScriptError> + 'static,
    ) {
        self.actions.insert(name.to_string(), Rc::new(script));
    }

    pub fn register_condition(
        &mut self,
        name: impl ToString,
        script: impl Fn(&mut Context) -> Result<bool, ScriptError> + 'static,
    ) {
        self.conditions.insert(name.to_string(), Rc::new(script));
    }

    pub fn action_script(&self, name: &str) -> Option<ActionScript> {
        self.actions.get(name).cloned()
    }

    pub fn condition_script(&self, name: &str) -> Option<ConditionScript> {
        self.conditions.get(name).cloned()
    }

    pub fn build(
        &self,
        ty: NodeType,
        properties: &Properties,
    ) -> Result<Box<dyn BehaviorNode>, LoadError> {
        match self.node_types.get(&ty) {
            Some(constructor) => constructor(properties, self),
            None if ty.is_reserved() => Err(LoadError::Unimplemented {
                ty: ty.to_string(),
                path: String::new(),
            }),
            None => Err(LoadError::UnknownType {
                ty: ty.to_string(),
                path: String::new(),
            }),
        }
    }

    /// Builds a detached node with a fresh id.
    pub fn create(
        &self,
        ty: NodeType,
        name: impl Into<String>,
        properties: Properties,
    ) -> Result<NodeContainer, LoadError> {
        let node = self.build(ty, &properties)?;
        let mut ret = NodeContainer::new(ty, name, node);
        ret.properties = properties;
        Ok(ret)
    }
}

#[cfg(test)]
mod test;
