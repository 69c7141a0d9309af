use ::once_cell::sync::Lazy;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{cell::Cell, collections::HashMap, time::Instant};

/// Named values shared by every node ticked within one call chain.
pub type Blackboard = HashMap<String, Value>;

#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vec2) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Moves toward `target` by at most `step`, never overshooting.
    pub fn step_toward(self, target: Vec2, step: f64) -> Vec2 {
        let dist = self.distance(target);
        if dist <= step || dist == 0. {
            target
        } else {
            let t = step / dist;
            Vec2::new(
                self.x + (target.x - self.x) * t,
                self.y + (target.y - self.y) * t,
            )
        }
    }
}

/// The agent the tree is driving.
pub trait Agent {
    fn position(&self) -> Vec2;
    fn set_position(&mut self, pos: Vec2);
    fn health(&self) -> f64;
    fn max_health(&self) -> f64;
}

pub trait Entity {
    fn position(&self) -> Vec2;
    fn health(&self) -> f64;
    fn apply_damage(&mut self, amount: f64);
}

pub trait WorldObject {
    fn position(&self) -> Vec2;
    /// Returns whether the interaction took place.
    fn interact(&mut self) -> bool;
}

pub trait World {
    fn entity(&mut self, id: &str) -> Option<&mut dyn Entity>;
    fn object(&mut self, id: &str) -> Option<&mut dyn WorldObject>;
}

pub trait Logger {
    fn log(&mut self, category: &str, message: &str, node_id: &str);
}

/// Source of monotonic time in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> u64;
}

pub struct SystemClock {
    start: Instant,
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

static SYSTEM_CLOCK: Lazy<SystemClock> = Lazy::new(|| SystemClock {
    start: Instant::now(),
});

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<u64>,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self { now: Cell::new(now) }
    }

    pub fn advance(&self, ms: u64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: u64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.get()
    }
}

/// The host-supplied execution context.
///
/// Every handle is optional. Nodes that need a handle which is absent report
/// `Failure` (conditions) or `Error` (actions) instead of panicking.
#[derive(Default)]
pub struct Context<'e> {
    blackboard: Blackboard,
    pub agent: Option<&'e mut dyn Agent>,
    pub world: Option<&'e mut dyn World>,
    pub logger: Option<&'e mut dyn Logger>,
    clock: Option<&'e dyn Clock>,
    pub(crate) debug: bool,
    pub(crate) profiling: bool,
}

impl<'e> Context<'e> {
    pub fn new(blackboard: Blackboard) -> Self {
        Self {
            blackboard,
            ..Self::default()
        }
    }

    pub fn with_agent(mut self, agent: &'e mut dyn Agent) -> Self {
        self.agent = Some(agent);
        self
    }

    pub fn with_world(mut self, world: &'e mut dyn World) -> Self {
        self.world = Some(world);
        self
    }

    pub fn with_logger(mut self, logger: &'e mut dyn Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_clock(mut self, clock: &'e dyn Clock) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn take_blackboard(self) -> Blackboard {
        self.blackboard
    }

    pub fn blackboard(&self) -> &Blackboard {
        &self.blackboard
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.blackboard.get(key)
    }

    /// Reads a blackboard value and converts it into `T`, returning `None`
    /// if it is missing or has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.blackboard
            .get(key)
            .and_then(|val| T::deserialize(val).ok())
    }

    pub fn set(&mut self, key: impl Into<String>, val: impl Into<Value>) {
        self.blackboard.insert(key.into(), val.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.blackboard.remove(key)
    }

    pub fn now_ms(&self) -> u64 {
        match self.clock {
            Some(clock) => clock.now_ms(),
            None => SYSTEM_CLOCK.now_ms(),
        }
    }

    /// Whether the Root asked descendants for debug traces.
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn profiling(&self) -> bool {
        self.profiling
    }

    /// Forwards a message to the host logger, if one is attached.
    pub fn log(&mut self, category: &str, message: &str, node_id: &str) {
        if let Some(logger) = self.logger.as_deref_mut() {
            logger.log(category, message, node_id);
        }
    }
}
