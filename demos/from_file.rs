use ::behavior_tree_engine::{
    load_yaml, validate_tree, Agent, Context, Entity, NodeStatus, Registry, Vec2, World,
    WorldObject,
};
use std::{collections::HashMap, fs};

struct Guard {
    pos: Vec2,
    hp: f64,
}

impl Agent for Guard {
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

#[derive(Debug)]
struct Intruder {
    pos: Vec2,
    hp: f64,
}

impl Entity for Intruder {
    fn position(&self) -> Vec2 {
        self.pos
    }
    fn health(&self) -> f64 {
        self.hp
    }
    fn apply_damage(&mut self, amount: f64) {
        self.hp -= amount;
        println!("intruder takes {} damage, {} left", amount, self.hp);
    }
}

#[derive(Default)]
struct Yard {
    intruders: HashMap<String, Intruder>,
}

impl World for Yard {
    fn entity(&mut self, id: &str) -> Option<&mut dyn Entity> {
        self.intruders
            .get_mut(id)
            .filter(|intruder| intruder.hp > 0.)
            .map(|intruder| intruder as &mut dyn Entity)
    }

    fn object(&mut self, _id: &str) -> Option<&mut dyn WorldObject> {
        None
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "demos/guard.yaml".to_owned());
    let file = fs::read_to_string(&path)?;

    let report = validate_tree(&serde_yaml::from_str(&file)?);
    if !report.is_valid {
        for error in &report.errors {
            eprintln!("{}", error);
        }
        anyhow::bail!("{} is not a valid tree", path);
    }

    let mut registry = Registry::default();
    registry.register_action("shout", |ctx: &mut Context| {
        println!("Halt!");
        ctx.set("alerted", true);
        Ok(NodeStatus::Success)
    });
    let mut tree = load_yaml(&file, &registry)?;

    let mut guard = Guard {
        pos: Vec2::new(0., 0.),
        hp: 100.,
    };
    let mut yard = Yard::default();
    yard.intruders.insert(
        "intruder".to_owned(),
        Intruder {
            pos: Vec2::new(6., 2.),
            hp: 30.,
        },
    );

    let mut ctx = Context::default()
        .with_agent(&mut guard)
        .with_world(&mut yard);
    for i in 0..20 {
        let result = tree.tick(&mut ctx);
        eprintln!("tick {}: {}", i, result);
        if result == NodeStatus::Failure {
            break;
        }
    }
    drop(ctx);

    println!("guard ended at {:?}", guard.pos);
    println!("{:?}", yard.intruders);
    println!("{:?}", tree.stats());

    Ok(())
}
