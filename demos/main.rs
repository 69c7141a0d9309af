use ::behavior_tree_engine::{
    Agent, BehaviorNode, BehaviorTree, Context, NodeContainer, NodeStatus, NodeType, Registry,
    SequenceNode, Vec2,
};
use serde_json::json;

#[derive(Debug)]
struct Patroller {
    pos: Vec2,
    hp: f64,
}

impl Agent for Patroller {
    fn position(&self) -> Vec2 {
        self.pos
    }
    fn set_position(&mut self, pos: Vec2) {
        self.pos = pos;
    }
    fn health(&self) -> f64 {
        self.hp
    }
    fn max_health(&self) -> f64 {
        100.
    }
}

/// Counts its own ticks into the blackboard.
struct CountTicks;

impl BehaviorNode for CountTicks {
    fn tick(&mut self, _children: &mut [NodeContainer], ctx: &mut Context) -> NodeStatus {
        let ticks = ctx.get_as::<u64>("ticks").unwrap_or(0) + 1;
        ctx.set("ticks", ticks);
        NodeStatus::Success
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut registry = Registry::default();
    registry.register_action("report", |ctx: &mut Context| {
        if let Some(agent) = ctx.agent.as_deref() {
            println!("arrived at {:?}", agent.position());
        }
        Ok(NodeStatus::Success)
    });

    let mut patrol = NodeContainer::new(
        NodeType::Sequence,
        "Patrol",
        Box::new(SequenceNode::default()),
    );
    patrol.add_child(NodeContainer::new(
        NodeType::Action,
        "Count",
        Box::new(CountTicks),
    ))?;
    for (name, x, y) in [("North", 0., 5.), ("East", 5., 5.)] {
        let props = json!({
            "actionType": "move_to",
            "target": {"x": x, "y": y},
            "speed": 2.0,
        });
        let props = props.as_object().cloned().unwrap_or_default();
        patrol.add_child(registry.create(NodeType::Action, name, props)?)?;
    }
    let report = json!({"actionType": "custom", "script": "report"});
    patrol.add_child(registry.create(
        NodeType::Action,
        "Report",
        report.as_object().cloned().unwrap_or_default(),
    )?)?;

    let mut tree = BehaviorTree::new(patrol);
    println!("{:?}", tree.stats());

    let mut agent = Patroller {
        pos: Vec2::new(0., 0.),
        hp: 100.,
    };
    let mut ctx = Context::default().with_agent(&mut agent);
    for i in 0..10 {
        let status = tree.tick(&mut ctx);
        println!("tick {}: {}", i, status);
        if status.is_terminal() {
            break;
        }
    }
    println!("ticks seen by Count: {:?}", ctx.get("ticks"));
    println!("{}", serde_json::to_string_pretty(&tree.snapshot())?);

    Ok(())
}
