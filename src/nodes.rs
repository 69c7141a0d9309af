use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{de::DeserializeOwned, Deserialize};
use std::collections::{HashMap, HashSet};
use tracing::{info, trace, warn};

use crate::{BehaviorNode, Context, NodeContainer, NodeStatus, NumChildren, Properties};

/// Decodes a property bag into a node's typed configuration.
pub(crate) fn parse_config<T: DeserializeOwned>(
    properties: &Properties,
) -> Result<T, serde_json::Error> {
    serde_json::from_value(serde_json::Value::Object(properties.clone()))
}

fn single_child_findings(children: &[NodeContainer]) -> Vec<String> {
    if children.len() == 1 {
        vec![]
    } else {
        vec![format!(
            "decorators need exactly one child, found {}",
            children.len()
        )]
    }
}

/// Bookkeeping of an unfinished run of a Sequence or Selector.
///
/// Children which already finished in this run are remembered by id, so the
/// run survives children being inserted or removed between ticks.
#[derive(Debug, Default)]
struct RunState {
    cursor: usize,
    completed: HashSet<String>,
    failed: bool,
    order: Vec<String>,
    planned: bool,
}

impl RunState {
    fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SequenceConfig {
    pub abort_on_failure: bool,
    pub stop_on_first_success: bool,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            abort_on_failure: true,
            stop_on_first_success: false,
        }
    }
}

/// Ticks children in order until one fails.
#[derive(Debug, Default)]
pub struct SequenceNode {
    config: SequenceConfig,
    run: RunState,
}

impl SequenceNode {
    pub fn new(config: SequenceConfig) -> Self {
        Self {
            config,
            run: RunState::default(),
        }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, serde_json::Error> {
        parse_config(properties).map(Self::new)
    }

    /// Index of the child the current run is paused at. Zero when idle.
    pub fn cursor(&self) -> usize {
        self.run.cursor
    }

    fn finish(&mut self, status: NodeStatus) -> NodeStatus {
        self.run.clear();
        status
    }
}

impl BehaviorNode for SequenceNode {
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        for (i, child) in children.iter_mut().enumerate() {
            if self.run.completed.contains(&child.id) {
                continue;
            }
            match child.tick(ctx) {
                NodeStatus::Running => {
                    trace!(child = %child.id, index = i, "sequence paused");
                    self.run.cursor = i;
                    return NodeStatus::Running;
                }
                NodeStatus::Success => {
                    if self.config.stop_on_first_success {
                        return self.finish(NodeStatus::Success);
                    }
                    self.run.completed.insert(child.id.clone());
                }
                NodeStatus::Failure => {
                    if self.config.abort_on_failure {
                        return self.finish(NodeStatus::Failure);
                    }
                    info!(child = %child.id, "sequence child failed, continuing");
                    ctx.log("sequence", "child failed, continuing", &child.id);
                    self.run.failed = true;
                    self.run.completed.insert(child.id.clone());
                }
                NodeStatus::Error | NodeStatus::Ready => return self.finish(NodeStatus::Error),
            }
        }

        let status = if self.run.failed {
            NodeStatus::Failure
        } else {
            NodeStatus::Success
        };
        self.finish(status)
    }

    fn reset(&mut self) {
        self.run.clear();
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorOrder {
    Sequential,
    /// Shuffled once at the start of every run
    Random,
    /// Descending weight, ties in insertion order
    Priority,
}

impl Default for SelectorOrder {
    fn default() -> Self {
        Self::Sequential
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SelectorConfig {
    pub execution_order: SelectorOrder,
    pub weights: Vec<f64>,
    pub shuffle_seed: Option<u64>,
}

/// Ticks children until one succeeds.
pub struct SelectorNode {
    config: SelectorConfig,
    run: RunState,
    rng: StdRng,
}

impl Default for SelectorNode {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}

impl SelectorNode {
    pub fn new(config: SelectorConfig) -> Self {
        let rng = match config.shuffle_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            config,
            run: RunState::default(),
            rng,
        }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, serde_json::Error> {
        parse_config(properties).map(Self::new)
    }

    pub fn cursor(&self) -> usize {
        self.run.cursor
    }

    fn weight(&self, index: usize) -> f64 {
        self.config.weights.get(index).copied().unwrap_or(1.)
    }

    fn plan(&mut self, children: &[NodeContainer]) -> Vec<String> {
        let mut indices: Vec<usize> = (0..children.len()).collect();
        match self.config.execution_order {
            SelectorOrder::Sequential => (),
            SelectorOrder::Random => indices.shuffle(&mut self.rng),
            // sort_by is stable, so equal weights keep their insertion order
            SelectorOrder::Priority => {
                indices.sort_by(|&lhs, &rhs| self.weight(rhs).total_cmp(&self.weight(lhs)))
            }
        }
        indices
            .into_iter()
            .map(|i| children[i].id.clone())
            .collect()
    }

    fn finish(&mut self, status: NodeStatus) -> NodeStatus {
        self.run.clear();
        status
    }
}

impl BehaviorNode for SelectorNode {
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        if !self.run.planned {
            self.run.order = self.plan(children);
            self.run.planned = true;
        }
        for child in children.iter() {
            if !self.run.order.contains(&child.id) {
                self.run.order.push(child.id.clone());
            }
        }

        for k in 0..self.run.order.len() {
            let Some(i) = children
                .iter()
                .position(|child| child.id == self.run.order[k])
            else {
                continue;
            };
            let child = &mut children[i];
            if self.run.completed.contains(&child.id) {
                continue;
            }
            match child.tick(ctx) {
                NodeStatus::Running => {
                    trace!(child = %child.id, index = i, "selector paused");
                    self.run.cursor = i;
                    return NodeStatus::Running;
                }
                NodeStatus::Success => return self.finish(NodeStatus::Success),
                NodeStatus::Failure => {
                    self.run.completed.insert(child.id.clone());
                }
                NodeStatus::Error | NodeStatus::Ready => return self.finish(NodeStatus::Error),
            }
        }

        self.finish(NodeStatus::Failure)
    }

    fn reset(&mut self) {
        self.run.clear();
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }

    fn validate(&self, children: &[NodeContainer]) -> Vec<String> {
        let weights = self.config.weights.len();
        if self.config.execution_order == SelectorOrder::Priority && weights != children.len() {
            vec![format!(
                "weights has {} entries for {} children",
                weights,
                children.len()
            )]
        } else {
            vec![]
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParallelPolicy {
    RequireAll,
    RequireOne,
    RequireMajority,
    /// `successThreshold` and `failureThreshold`, decided once every child
    /// has finished
    Custom,
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self::RequireAll
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParallelConfig {
    pub policy: ParallelPolicy,
    /// Defaults to the number of children
    pub success_threshold: Option<usize>,
    pub failure_threshold: usize,
    pub early_exit: bool,
    pub abort_on_failure: bool,
    pub max_concurrency: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            policy: ParallelPolicy::RequireAll,
            success_threshold: None,
            failure_threshold: 0,
            early_exit: true,
            abort_on_failure: false,
            max_concurrency: None,
        }
    }
}

/// Advances every unfinished child on each tick and decides by policy.
#[derive(Debug, Default)]
pub struct ParallelNode {
    config: ParallelConfig,
    results: HashMap<String, NodeStatus>,
}

impl ParallelNode {
    pub fn new(config: ParallelConfig) -> Self {
        Self {
            config,
            results: HashMap::new(),
        }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, serde_json::Error> {
        parse_config(properties).map(Self::new)
    }

    /// Last status a child reported in the current run.
    pub fn child_status(&self, id: &str) -> Option<NodeStatus> {
        self.results.get(id).copied()
    }

    fn decide(&self, total: usize, success: usize, failure: usize) -> Option<NodeStatus> {
        let remaining = total - success - failure;
        let may_decide = self.config.early_exit || remaining == 0;
        match self.config.policy {
            ParallelPolicy::RequireAll => {
                if failure > 0 && may_decide {
                    Some(NodeStatus::Failure)
                } else if success == total {
                    Some(NodeStatus::Success)
                } else {
                    None
                }
            }
            ParallelPolicy::RequireOne => {
                if success > 0 && may_decide {
                    Some(NodeStatus::Success)
                } else if remaining == 0 {
                    Some(NodeStatus::Failure)
                } else {
                    None
                }
            }
            ParallelPolicy::RequireMajority => {
                let majority = (total + 1) / 2;
                if success >= majority && may_decide {
                    Some(NodeStatus::Success)
                } else if success + remaining < majority && may_decide {
                    Some(NodeStatus::Failure)
                } else {
                    None
                }
            }
            ParallelPolicy::Custom => {
                if remaining > 0 {
                    return None;
                }
                let threshold = self.config.success_threshold.unwrap_or(total);
                if success >= threshold && failure <= self.config.failure_threshold {
                    Some(NodeStatus::Success)
                } else {
                    Some(NodeStatus::Failure)
                }
            }
        }
    }

    fn finish(&mut self, children: &mut [NodeContainer], status: NodeStatus) -> NodeStatus {
        if status != NodeStatus::Success && self.config.abort_on_failure {
            for child in children.iter_mut() {
                if self.results.get(&child.id) == Some(&NodeStatus::Running) {
                    trace!(child = %child.id, "parallel cancels running child");
                    child.reset();
                }
            }
        }
        self.results.clear();
        status
    }
}

impl BehaviorNode for ParallelNode {
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        let mut budget = self.config.max_concurrency.unwrap_or(usize::MAX);
        for child in children.iter_mut() {
            let finished = self
                .results
                .get(&child.id)
                .map_or(false, |status| status.is_terminal());
            if finished || budget == 0 {
                continue;
            }
            budget -= 1;
            let status = child.tick(ctx);
            self.results.insert(child.id.clone(), status);
        }

        let (mut success, mut failure, mut errored) = (0, 0, false);
        for child in children.iter() {
            match self.results.get(&child.id) {
                Some(NodeStatus::Success) => success += 1,
                Some(NodeStatus::Failure) => failure += 1,
                Some(NodeStatus::Error) => errored = true,
                _ => (),
            }
        }
        if errored {
            return self.finish(children, NodeStatus::Error);
        }

        match self.decide(children.len(), success, failure) {
            Some(status) => self.finish(children, status),
            None => NodeStatus::Running,
        }
    }

    fn reset(&mut self) {
        self.results.clear();
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Infinite
    }

    fn validate(&self, children: &[NodeContainer]) -> Vec<String> {
        let mut ret = vec![];
        if let Some(threshold) = self.config.success_threshold {
            if threshold > children.len() {
                ret.push(format!(
                    "successThreshold {} exceeds the {} children",
                    threshold,
                    children.len()
                ));
            }
        }
        if self.config.failure_threshold > children.len() {
            ret.push(format!(
                "failureThreshold {} exceeds the {} children",
                self.config.failure_threshold,
                children.len()
            ));
        }
        if self.config.max_concurrency == Some(0) {
            ret.push("maxConcurrency must be at least 1".to_owned());
        }
        ret
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InverterConfig {
    /// Report a running child as `Failure`
    pub invert_running: bool,
    /// Report a child `Error` as `Success`
    pub invert_error: bool,
}

#[derive(Debug, Default)]
pub struct InverterNode {
    config: InverterConfig,
}

impl InverterNode {
    pub fn new(config: InverterConfig) -> Self {
        Self { config }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, serde_json::Error> {
        parse_config(properties).map(Self::new)
    }
}

impl BehaviorNode for InverterNode {
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        let Some((child, rest)) = children.split_first_mut() else {
            return NodeStatus::Failure;
        };
        if !rest.is_empty() {
            warn!(
                children = rest.len() + 1,
                "inverter has more than one child, only the first is used"
            );
        }
        match child.tick(ctx) {
            NodeStatus::Success => NodeStatus::Failure,
            NodeStatus::Failure => NodeStatus::Success,
            NodeStatus::Running if self.config.invert_running => NodeStatus::Failure,
            NodeStatus::Running => NodeStatus::Running,
            NodeStatus::Error if self.config.invert_error => NodeStatus::Success,
            NodeStatus::Error | NodeStatus::Ready => NodeStatus::Error,
        }
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }

    fn validate(&self, children: &[NodeContainer]) -> Vec<String> {
        single_child_findings(children)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatUntil {
    /// `repeatCount` iterations, `-1` meaning no limit
    Count,
    Success,
    Failure,
    Always,
}

impl Default for RepeatUntil {
    fn default() -> Self {
        Self::Count
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepeaterConfig {
    pub repeat_count: i64,
    pub repeat_until: RepeatUntil,
    pub break_on_failure: bool,
    pub break_on_success: bool,
    /// Reset the child before every iteration but the first
    pub reset_child: bool,
    pub max_iterations: u32,
}

impl Default for RepeaterConfig {
    fn default() -> Self {
        Self {
            repeat_count: 1,
            repeat_until: RepeatUntil::Count,
            break_on_failure: false,
            break_on_success: false,
            reset_child: false,
            max_iterations: 1000,
        }
    }
}

/// Ticks its child repeatedly within a single tick until the configured
/// condition holds. A running child pauses the loop until the next tick.
#[derive(Debug, Default)]
pub struct RepeaterNode {
    config: RepeaterConfig,
    iteration: u32,
    in_progress: bool,
    last: Option<NodeStatus>,
    seen_success: bool,
    seen_failure: bool,
}

impl RepeaterNode {
    pub fn new(config: RepeaterConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn from_properties(properties: &Properties) -> Result<Self, serde_json::Error> {
        parse_config(properties).map(Self::new)
    }

    /// Iterations completed in the current run.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    fn count_reached(&self) -> bool {
        self.config.repeat_until == RepeatUntil::Count
            && self.config.repeat_count >= 0
            && i64::from(self.iteration) >= self.config.repeat_count
    }

    fn final_status(&self) -> NodeStatus {
        match self.config.repeat_until {
            RepeatUntil::Success if self.seen_success => NodeStatus::Success,
            RepeatUntil::Failure if self.seen_failure => NodeStatus::Success,
            RepeatUntil::Success | RepeatUntil::Failure => NodeStatus::Failure,
            RepeatUntil::Count | RepeatUntil::Always => self.last.unwrap_or(NodeStatus::Success),
        }
    }

    fn finish(&mut self, status: NodeStatus) -> NodeStatus {
        self.clear();
        status
    }

    fn clear(&mut self) {
        self.iteration = 0;
        self.in_progress = false;
        self.last = None;
        self.seen_success = false;
        self.seen_failure = false;
    }
}

impl BehaviorNode for RepeaterNode {
    fn tick(&mut self, children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        let Some((child, rest)) = children.split_first_mut() else {
            return NodeStatus::Failure;
        };
        if !rest.is_empty() {
            warn!(
                children = rest.len() + 1,
                "repeater has more than one child, only the first is used"
            );
        }

        loop {
            if self.count_reached() {
                break;
            }
            if self.iteration >= self.config.max_iterations {
                warn!(
                    node = %child.id,
                    iterations = self.iteration,
                    "repeater hit its iteration cap"
                );
                break;
            }

            if self.iteration > 0 && !self.in_progress && self.config.reset_child {
                child.reset();
            }

            let status = child.tick(ctx);
            if status == NodeStatus::Running {
                self.in_progress = true;
                return NodeStatus::Running;
            }
            self.in_progress = false;
            self.iteration += 1;
            self.last = Some(status);

            match status {
                NodeStatus::Success => self.seen_success = true,
                NodeStatus::Failure => self.seen_failure = true,
                _ => return self.finish(NodeStatus::Error),
            }

            if (self.config.break_on_failure && status == NodeStatus::Failure)
                || (self.config.break_on_success && status == NodeStatus::Success)
            {
                break;
            }
            match (self.config.repeat_until, status) {
                (RepeatUntil::Success, NodeStatus::Success)
                | (RepeatUntil::Failure, NodeStatus::Failure) => break,
                _ => (),
            }
        }

        let status = self.final_status();
        self.finish(status)
    }

    fn reset(&mut self) {
        self.clear();
    }

    fn max_children(&self) -> NumChildren {
        NumChildren::Finite(1)
    }

    fn validate(&self, children: &[NodeContainer]) -> Vec<String> {
        let mut ret = single_child_findings(children);
        if self.config.repeat_count < -1 {
            ret.push(format!(
                "repeatCount must be -1 or greater, found {}",
                self.config.repeat_count
            ));
        }
        ret
    }
}
