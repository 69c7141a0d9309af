use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::{
    error::{LoadError, ScriptError},
    nodes::parse_config,
    parser::path::{parse_path, resolve, PathSegment},
    ActionScript, BehaviorNode, ConditionScript, Context, NodeContainer, NodeStatus, NodeType,
    Properties, Registry, Vec2,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    Greater,
    Less,
    GreaterEqual,
    LessEqual,
}

impl Default for ComparisonOperator {
    fn default() -> Self {
        Self::Equals
    }
}

impl ComparisonOperator {
    pub fn compare_f64(self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            Self::Equals => (lhs - rhs).abs() <= tolerance,
            Self::NotEquals => (lhs - rhs).abs() > tolerance,
            Self::Greater => lhs > rhs,
            Self::Less => lhs < rhs,
            Self::GreaterEqual => lhs >= rhs,
            Self::LessEqual => lhs <= rhs,
        }
    }

    /// Numbers compare numerically. Other values only support equality.
    pub fn compare(self, lhs: &Value, rhs: &Value, tolerance: f64) -> Result<bool, ScriptError> {
        if let Some((lhs, rhs)) = lhs.as_f64().zip(rhs.as_f64()) {
            return Ok(self.compare_f64(lhs, rhs, tolerance));
        }
        match self {
            Self::Equals => Ok(lhs == rhs),
            Self::NotEquals => Ok(lhs != rhs),
            _ => Err(ScriptError::Message(format!(
                "cannot order non-numeric values {} and {}",
                lhs, rhs
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Custom,
    MoveTo,
    Attack,
    Interact,
    Wait,
}

impl Default for ActionKind {
    fn default() -> Self {
        Self::Custom
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ActionConfig {
    pub action_type: ActionKind,
    pub script: Option<String>,
    pub target_id: Option<String>,
    pub target: Option<Vec2>,
    pub speed: f64,
    pub arrival_distance: f64,
    pub damage: f64,
    pub range: f64,
    pub object_id: Option<String>,
    /// Milliseconds
    pub duration: u64,
    pub retry_count: u32,
    /// Milliseconds between a failed attempt and the next one
    pub retry_delay: u64,
}

impl Default for ActionConfig {
    fn default() -> Self {
        Self {
            action_type: ActionKind::Custom,
            script: None,
            target_id: None,
            target: None,
            speed: 1.,
            arrival_distance: 0.5,
            damage: 10.,
            range: 1.5,
            object_id: None,
            duration: 1000,
            retry_count: 0,
            retry_delay: 0,
        }
    }
}

#[derive(Debug, Default)]
struct RetryState {
    attempts: u32,
    next_attempt_at: Option<u64>,
}

pub struct ActionNode {
    config: ActionConfig,
    script: Option<ActionScript>,
    retry: RetryState,
    wait_started: Option<u64>,
}

impl ActionNode {
    pub fn new(config: ActionConfig, script: Option<ActionScript>) -> Self {
        Self {
            config,
            script,
            retry: RetryState::default(),
            wait_started: None,
        }
    }

    /// Decodes the configuration and resolves a custom script by name.
    pub fn build(properties: &Properties, registry: &Registry) -> Result<Self, LoadError> {
        let config: ActionConfig =
            parse_config(properties).map_err(|source| LoadError::InvalidProperties {
                ty: NodeType::Action.to_string(),
                path: String::new(),
                source,
            })?;
        let script = match config.script.as_deref() {
            Some(name) if config.action_type == ActionKind::Custom => {
                Some(registry.action_script(name).ok_or_else(|| {
                    LoadError::UnknownScript {
                        script: name.to_owned(),
                        path: String::new(),
                    }
                })?)
            }
            _ => None,
        };
        Ok(Self::new(config, script))
    }

    /// Failed attempts in the current run.
    pub fn attempts(&self) -> u32 {
        self.retry.attempts
    }

    fn perform(&mut self, ctx: &mut Context) -> Result<NodeStatus, ScriptError> {
        match self.config.action_type {
            ActionKind::Custom => match &self.script {
                Some(script) => script(ctx),
                None => Err(ScriptError::new("no script configured")),
            },
            ActionKind::MoveTo => self.move_to(ctx),
            ActionKind::Attack => self.attack(ctx),
            ActionKind::Interact => self.interact(ctx),
            ActionKind::Wait => {
                let now = ctx.now_ms();
                let started = *self.wait_started.get_or_insert(now);
                if now.saturating_sub(started) >= self.config.duration {
                    self.wait_started = None;
                    Ok(NodeStatus::Success)
                } else {
                    Ok(NodeStatus::Running)
                }
            }
        }
    }

    fn move_to(&self, ctx: &mut Context) -> Result<NodeStatus, ScriptError> {
        let target = match (&self.config.target_id, self.config.target) {
            (Some(id), _) => {
                let world = ctx
                    .world
                    .as_deref_mut()
                    .ok_or(ScriptError::MissingContext("world"))?;
                match locate(world, id) {
                    Some(pos) => pos,
                    None => return Ok(NodeStatus::Failure),
                }
            }
            (None, Some(pos)) => pos,
            (None, None) => return Err(ScriptError::new("move_to needs targetId or target")),
        };

        let agent = ctx
            .agent
            .as_deref_mut()
            .ok_or(ScriptError::MissingContext("agent"))?;
        let pos = agent.position();
        if pos.distance(target) <= self.config.arrival_distance {
            return Ok(NodeStatus::Success);
        }
        let next = pos.step_toward(target, self.config.speed);
        agent.set_position(next);
        if next.distance(target) <= self.config.arrival_distance {
            Ok(NodeStatus::Success)
        } else {
            Ok(NodeStatus::Running)
        }
    }

    fn attack(&self, ctx: &mut Context) -> Result<NodeStatus, ScriptError> {
        let id = self
            .config
            .target_id
            .as_deref()
            .ok_or_else(|| ScriptError::new("attack needs targetId"))?;
        let pos = ctx
            .agent
            .as_deref()
            .ok_or(ScriptError::MissingContext("agent"))?
            .position();
        let world = ctx
            .world
            .as_deref_mut()
            .ok_or(ScriptError::MissingContext("world"))?;
        let Some(entity) = world.entity(id) else {
            return Ok(NodeStatus::Failure);
        };
        if entity.position().distance(pos) > self.config.range {
            return Ok(NodeStatus::Failure);
        }
        entity.apply_damage(self.config.damage);
        Ok(NodeStatus::Success)
    }

    fn interact(&self, ctx: &mut Context) -> Result<NodeStatus, ScriptError> {
        let id = self
            .config
            .object_id
            .as_deref()
            .ok_or_else(|| ScriptError::new("interact needs objectId"))?;
        let pos = ctx
            .agent
            .as_deref()
            .ok_or(ScriptError::MissingContext("agent"))?
            .position();
        let world = ctx
            .world
            .as_deref_mut()
            .ok_or(ScriptError::MissingContext("world"))?;
        let Some(object) = world.object(id) else {
            return Ok(NodeStatus::Failure);
        };
        if object.position().distance(pos) > self.config.range {
            return Ok(NodeStatus::Failure);
        }
        Ok(if object.interact() {
            NodeStatus::Success
        } else {
            NodeStatus::Failure
        })
    }
}

/// Position of an entity or, failing that, an object with the given id.
fn locate(world: &mut dyn crate::World, id: &str) -> Option<Vec2> {
    if let Some(entity) = world.entity(id) {
        return Some(entity.position());
    }
    world.object(id).map(|object| object.position())
}

impl BehaviorNode for ActionNode {
    fn tick(&mut self, _children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        let now = ctx.now_ms();
        if let Some(at) = self.retry.next_attempt_at {
            if now < at {
                return NodeStatus::Running;
            }
            self.retry.next_attempt_at = None;
        }

        let status = match self.perform(ctx) {
            Ok(NodeStatus::Ready) => {
                warn!(action = ?self.config.action_type, "action returned Ready");
                NodeStatus::Error
            }
            Ok(status) => status,
            Err(e) => {
                warn!(action = ?self.config.action_type, error = %e, "action raised an error");
                NodeStatus::Error
            }
        };

        match status {
            NodeStatus::Failure if self.retry.attempts < self.config.retry_count => {
                self.retry.attempts += 1;
                self.retry.next_attempt_at = Some(now.saturating_add(self.config.retry_delay));
                debug!(
                    attempt = self.retry.attempts,
                    of = self.config.retry_count,
                    "action failed, retry scheduled"
                );
                NodeStatus::Running
            }
            NodeStatus::Running => NodeStatus::Running,
            terminal => {
                self.retry = RetryState::default();
                terminal
            }
        }
    }

    fn reset(&mut self) {
        self.retry = RetryState::default();
        self.wait_started = None;
    }

    fn validate(&self, _children: &[NodeContainer]) -> Vec<String> {
        let config = &self.config;
        let missing = match config.action_type {
            ActionKind::Custom if config.script.is_none() => Some("script"),
            ActionKind::MoveTo if config.target_id.is_none() && config.target.is_none() => {
                Some("targetId or target")
            }
            ActionKind::Attack if config.target_id.is_none() => Some("targetId"),
            ActionKind::Interact if config.object_id.is_none() => Some("objectId"),
            _ => None,
        };
        missing
            .map(|what| vec![format!("{:?} action needs {}", config.action_type, what)])
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    Custom,
    Distance,
    Health,
    Variable,
    Property,
}

impl Default for ConditionKind {
    fn default() -> Self {
        Self::Custom
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConditionConfig {
    pub condition_type: ConditionKind,
    pub operator: ComparisonOperator,
    pub value: Value,
    pub tolerance: f64,
    pub script: Option<String>,
    pub target_id: Option<String>,
    pub target: Option<Vec2>,
    /// Compare health as a percentage of the maximum
    pub percentage: bool,
    pub variable: Option<String>,
    pub path: Option<String>,
}

impl Default for ConditionConfig {
    fn default() -> Self {
        Self {
            condition_type: ConditionKind::Custom,
            operator: ComparisonOperator::Equals,
            value: Value::Null,
            tolerance: 1e-6,
            script: None,
            target_id: None,
            target: None,
            percentage: false,
            variable: None,
            path: None,
        }
    }
}

/// Evaluates a predicate. Never reports `Running`.
pub struct ConditionNode {
    config: ConditionConfig,
    script: Option<ConditionScript>,
    path: Vec<PathSegment>,
}

impl ConditionNode {
    pub fn new(config: ConditionConfig, script: Option<ConditionScript>) -> Result<Self, LoadError> {
        let path = match config.path.as_deref() {
            Some(path) if config.condition_type == ConditionKind::Property => {
                parse_path(path).map_err(|source| LoadError::InvalidPath {
                    path: String::new(),
                    source,
                })?
            }
            _ => vec![],
        };
        Ok(Self {
            config,
            script,
            path,
        })
    }

    pub fn build(properties: &Properties, registry: &Registry) -> Result<Self, LoadError> {
        let config: ConditionConfig =
            parse_config(properties).map_err(|source| LoadError::InvalidProperties {
                ty: NodeType::Condition.to_string(),
                path: String::new(),
                source,
            })?;
        let script = match config.script.as_deref() {
            Some(name) if config.condition_type == ConditionKind::Custom => {
                Some(registry.condition_script(name).ok_or_else(|| {
                    LoadError::UnknownScript {
                        script: name.to_owned(),
                        path: String::new(),
                    }
                })?)
            }
            _ => None,
        };
        Self::new(config, script)
    }

    fn compare(&self, lhs: &Value) -> Result<bool, ScriptError> {
        self.config
            .operator
            .compare(lhs, &self.config.value, self.config.tolerance)
    }

    /// `Ok(None)` means the data the predicate needs is absent.
    fn evaluate(&self, ctx: &mut Context) -> Result<Option<bool>, ScriptError> {
        match self.config.condition_type {
            ConditionKind::Custom => match &self.script {
                Some(script) => script(ctx).map(Some),
                None => Err(ScriptError::new("no script configured")),
            },
            ConditionKind::Distance => {
                let Some(pos) = ctx.agent.as_deref().map(|agent| agent.position()) else {
                    return Ok(None);
                };
                let target = match (&self.config.target_id, self.config.target) {
                    (Some(id), _) => match ctx.world.as_deref_mut() {
                        Some(world) => locate(world, id),
                        None => None,
                    },
                    (None, target) => target,
                };
                match target {
                    Some(target) => self.compare(&json!(pos.distance(target))).map(Some),
                    None => Ok(None),
                }
            }
            ConditionKind::Health => {
                let Some(agent) = ctx.agent.as_deref() else {
                    return Ok(None);
                };
                let health = if self.config.percentage {
                    if agent.max_health() > 0. {
                        agent.health() / agent.max_health() * 100.
                    } else {
                        0.
                    }
                } else {
                    agent.health()
                };
                self.compare(&json!(health)).map(Some)
            }
            ConditionKind::Variable => {
                let name = self
                    .config
                    .variable
                    .as_deref()
                    .ok_or_else(|| ScriptError::new("variable condition needs a variable"))?;
                match ctx.get(name) {
                    Some(value) => self.compare(value).map(Some),
                    None => Ok(None),
                }
            }
            ConditionKind::Property => {
                let Some((PathSegment::Key(head), rest)) = self.path.split_first() else {
                    return Err(ScriptError::new("property condition needs a path"));
                };
                let root = match ctx.get(head) {
                    Some(value) => Some(value.clone()),
                    None if head == "agent" => ctx.agent.as_deref().map(|agent| {
                        let pos = agent.position();
                        json!({
                            "x": pos.x,
                            "y": pos.y,
                            "health": agent.health(),
                            "maxHealth": agent.max_health(),
                        })
                    }),
                    None => None,
                };
                match root.as_ref().and_then(|root| resolve(root, rest)) {
                    Some(value) => self.compare(value).map(Some),
                    None => Ok(None),
                }
            }
        }
    }
}

impl BehaviorNode for ConditionNode {
    fn tick(&mut self, _children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        match self.evaluate(ctx) {
            Ok(Some(true)) => NodeStatus::Success,
            Ok(Some(false)) | Ok(None) => NodeStatus::Failure,
            Err(e) => {
                warn!(condition = ?self.config.condition_type, error = %e, "condition raised an error");
                NodeStatus::Error
            }
        }
    }

    fn validate(&self, _children: &[NodeContainer]) -> Vec<String> {
        let config = &self.config;
        let missing = match config.condition_type {
            ConditionKind::Custom if config.script.is_none() => Some("script"),
            ConditionKind::Distance if config.target_id.is_none() && config.target.is_none() => {
                Some("targetId or target")
            }
            ConditionKind::Variable if config.variable.is_none() => Some("variable"),
            ConditionKind::Property if self.path.is_empty() => Some("path"),
            _ => None,
        };
        missing
            .map(|what| vec![format!("{:?} condition needs {}", config.condition_type, what)])
            .unwrap_or_default()
    }
}
