use behavior_tree_engine::{
    load_json, validate_tree, Agent, Context, Entity, Logger, ManualClock, NodeRecord,
    NodeStatus, Registry, Vec2, World, WorldObject,
};
use serde_json::json;
use std::collections::HashMap;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

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
    }
}

#[derive(Default)]
struct Map {
    intruders: HashMap<String, Intruder>,
}

impl World for Map {
    fn entity(&mut self, id: &str) -> Option<&mut dyn Entity> {
        self.intruders.get_mut(id).map(|e| e as &mut dyn Entity)
    }
    fn object(&mut self, _id: &str) -> Option<&mut dyn WorldObject> {
        None
    }
}

#[derive(Default)]
struct Journal {
    entries: Vec<(String, String, String)>,
}

impl Logger for Journal {
    fn log(&mut self, category: &str, message: &str, node_id: &str) {
        self.entries
            .push((category.to_owned(), message.to_owned(), node_id.to_owned()));
    }
}

const TEN_NODES: &str = r#"{
    "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
    "properties": {"maxExecutionTime": 5000},
    "children": [{
        "id": "main", "type": "Selector", "name": "Main", "x": 0, "y": 100,
        "properties": {"executionOrder": "priority", "weights": [2.0, 1.0]},
        "children": [
            {
                "id": "fight", "type": "Sequence", "name": "Fight", "x": -200, "y": 200,
                "children": [
                    {"id": "close", "type": "Condition", "name": "Close?", "x": -300, "y": 300,
                     "properties": {"conditionType": "distance", "targetId": "intruder",
                                    "operator": "less", "value": 3}},
                    {"id": "strike", "type": "Action", "name": "Strike", "x": -200, "y": 300,
                     "properties": {"actionType": "attack", "targetId": "intruder",
                                    "damage": 15}},
                    {"id": "not-dead", "type": "Inverter", "name": "Not dead", "x": -100, "y": 300,
                     "width": 180, "height": 80,
                     "children": [
                        {"id": "dead", "type": "Condition", "name": "Dead?", "x": -100, "y": 400,
                         "properties": {"conditionType": "health", "operator": "less_equal",
                                        "value": 0}}
                     ]}
                ]
            },
            {
                "id": "watch", "type": "Parallel", "name": "Watch", "x": 200, "y": 200,
                "properties": {"policy": "require_one"},
                "children": [
                    {"id": "wait", "type": "Action", "name": "Wait", "x": 150, "y": 300,
                     "properties": {"actionType": "wait", "duration": 250}},
                    {"id": "approach", "type": "Action", "name": "Approach", "x": 250, "y": 300,
                     "properties": {"actionType": "move_to", "targetId": "intruder",
                                    "speed": 1.0, "arrivalDistance": 1.0}}
                ]
            }
        ]
    }]
}"#;

#[test]
fn test_round_trip_is_stable() -> anyhow::Result<()> {
    let registry = Registry::default();
    let tree = load_json(TEN_NODES, &registry)?;
    assert_eq!(tree.stats().total_nodes, 10);

    let first = tree.to_json()?;
    let second = load_json(&first, &registry)?.to_json()?;
    assert_eq!(first, second);

    assert_eq!(NodeRecord::from_json(&first)?, NodeRecord::from_json(TEN_NODES)?);
    assert_eq!(tree.find("not-dead").unwrap().layout().width, 180.);
    Ok(())
}

#[test]
fn test_yaml_round_trip() -> anyhow::Result<()> {
    let registry = Registry::default();
    let tree = load_json(TEN_NODES, &registry)?;
    let yaml = tree.to_yaml()?;
    let again = behavior_tree_engine::load_yaml(&yaml, &registry)?;
    assert_eq!(again.to_record(), tree.to_record());
    Ok(())
}

#[test]
fn test_guard_hunts_intruder() -> anyhow::Result<()> {
    init_tracing();
    let mut tree = load_json(TEN_NODES, &Registry::default())?;
    let mut guard = Guard {
        pos: Vec2::new(0., 0.),
        hp: 100.,
    };
    let mut map = Map::default();
    map.intruders.insert(
        "intruder".to_owned(),
        Intruder {
            pos: Vec2::new(5., 0.),
            hp: 30.,
        },
    );
    let clock = ManualClock::new(0);

    let mut statuses = vec![];
    {
        let mut ctx = Context::default()
            .with_agent(&mut guard)
            .with_world(&mut map)
            .with_clock(&clock);
        for _ in 0..5 {
            statuses.push(tree.tick(&mut ctx));
            clock.advance(10);
        }
    }

    use NodeStatus::*;
    // Closing in until the approach finishes, then striking from up close
    assert_eq!(statuses, [Running, Running, Running, Success, Success]);
    assert_eq!(guard.pos, Vec2::new(4., 0.));
    assert_eq!(map.intruders["intruder"].hp, 15.);
    assert_eq!(
        tree.path_of("approach").as_deref(),
        Some("root.child[0].child[1].child[1]")
    );
    // Without abortOnFailure the slower child is left as it was
    assert_eq!(tree.find("wait").unwrap().status(), Running);
    Ok(())
}

#[test]
fn test_without_context_handles() -> anyhow::Result<()> {
    let mut tree = load_json(TEN_NODES, &Registry::default())?;
    // No agent: the distance check fails and the approach errors out
    assert_eq!(tree.tick(&mut Context::default()), NodeStatus::Error);
    assert_eq!(tree.find("close").unwrap().status(), NodeStatus::Failure);
    assert_eq!(tree.find("approach").unwrap().status(), NodeStatus::Error);
    Ok(())
}

#[test]
fn test_condition_with_child_is_reported() {
    let report = validate_tree(&json!({
        "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
        "children": [{
            "id": "c", "type": "Condition", "name": "Check", "x": 0, "y": 100,
            "children": [{"id": "a", "type": "Action", "name": "Act", "x": 0, "y": 200}]
        }]
    }));
    assert!(!report.is_valid);
    assert_eq!(report.errors.len(), 1);
    assert!(report.errors[0].starts_with("root.child[0] "));
    assert!(report.errors[0].contains("leaf nodes must not have children"));
}

#[test]
fn test_validation_collects_everything() {
    let report = validate_tree(&json!({
        "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
        "children": [
            {"id": "x", "type": "Warp", "name": "", "x": 0, "y": "up"},
            {"id": "x", "type": "Inverter", "name": "Not", "x": 0, "y": 0, "children": [
                {"type": "Condition", "name": "A", "x": 0, "y": 0},
                {"type": "Condition", "name": "B", "x": 0, "y": 0}
            ]}
        ]
    }));
    assert_eq!(
        report.errors,
        [
            r#"root (Root "Root"): may have at most one child, found 2"#,
            "root.child[0]: node has no name",
            "root.child[0]: position y must be a number",
            r#"root.child[0]: unknown node type "Warp""#,
            r#"root.child[1]: duplicate node id "x""#,
            r#"root.child[1] (Inverter "Not"): may have at most one child, found 2"#,
        ]
    );

    let report = validate_tree(&serde_json::from_str(TEN_NODES).unwrap());
    assert!(report.is_valid, "{:?}", report.errors);
}

#[test]
fn test_built_tree_validation() -> anyhow::Result<()> {
    let source = r#"{
        "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
        "children": [{
            "id": "p", "type": "Parallel", "name": "P", "x": 0, "y": 0,
            "properties": {"policy": "custom", "successThreshold": 4},
            "children": [{"id": "a", "type": "Action", "name": "A", "x": 0, "y": 0}]
        }]
    }"#;
    let tree = load_json(source, &Registry::default())?;
    let report = tree.validate();
    assert_eq!(
        report.errors,
        [
            r#"root.child[0] (Parallel "P"): successThreshold 4 exceeds the 1 children"#,
            r#"root.child[0].child[0] (Action "A"): Custom action needs script"#,
        ]
    );
    Ok(())
}

#[test]
fn test_time_budget() -> anyhow::Result<()> {
    let source = r#"{
        "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
        "properties": {"maxExecutionTime": 100},
        "children": [{"id": "w", "type": "Action", "name": "W", "x": 0, "y": 0,
                      "properties": {"actionType": "wait", "duration": 500}}]
    }"#;
    let mut tree = load_json(source, &Registry::default())?;
    let clock = ManualClock::new(0);
    let mut ctx = Context::default().with_clock(&clock);

    assert_eq!(tree.tick(&mut ctx), NodeStatus::Running);
    clock.advance(150);
    assert_eq!(tree.tick(&mut ctx), NodeStatus::Error);
    assert_eq!(tree.find("w").unwrap().status(), NodeStatus::Ready);
    Ok(())
}

fn scripted_registry() -> Registry {
    let mut registry = Registry::default();
    registry.register_action("ok", |_: &mut Context| Ok(NodeStatus::Success));
    registry.register_action("fail", |_: &mut Context| Ok(NodeStatus::Failure));
    registry.register_action("busy", |_: &mut Context| Ok(NodeStatus::Running));
    registry
}

fn parallel(properties: serde_json::Value, scripts: &[&str]) -> String {
    let children: Vec<_> = scripts
        .iter()
        .enumerate()
        .map(|(i, script)| {
            json!({
                "id": format!("c{}", i), "type": "Action", "name": script, "x": 0, "y": 0,
                "properties": {"script": script}
            })
        })
        .collect();
    json!({
        "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
        "children": [{
            "id": "p", "type": "Parallel", "name": "P", "x": 0, "y": 0,
            "properties": properties, "children": children
        }]
    })
    .to_string()
}

#[test]
fn test_parallel_policies() -> anyhow::Result<()> {
    let registry = scripted_registry();
    let mut ctx = Context::default();

    let source = parallel(json!({"policy": "require_all"}), &["fail", "busy", "busy"]);
    assert_eq!(load_json(&source, &registry)?.tick(&mut ctx), NodeStatus::Failure);

    let source = parallel(
        json!({"policy": "require_all", "earlyExit": false}),
        &["fail", "busy", "busy"],
    );
    assert_eq!(load_json(&source, &registry)?.tick(&mut ctx), NodeStatus::Running);

    let source = parallel(
        json!({"policy": "require_majority"}),
        &["ok", "busy", "ok", "busy", "ok"],
    );
    assert_eq!(load_json(&source, &registry)?.tick(&mut ctx), NodeStatus::Success);
    Ok(())
}

#[test]
fn test_debug_trace_goes_to_logger() -> anyhow::Result<()> {
    init_tracing();
    let source = r#"{
        "id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0,
        "properties": {"debug": true},
        "children": [{"id": "ok", "type": "Action", "name": "Ok", "x": 0, "y": 0,
                      "properties": {"script": "ok"}}]
    }"#;
    let mut tree = load_json(source, &scripted_registry())?;
    let mut journal = Journal::default();
    {
        let mut ctx = Context::default().with_logger(&mut journal);
        assert_eq!(tree.tick(&mut ctx), NodeStatus::Success);
    }
    let ids: Vec<_> = journal
        .entries
        .iter()
        .filter(|(category, ..)| category == "debug")
        .map(|(_, _, id)| id.as_str())
        .collect();
    assert_eq!(ids, ["ok", "root"]);
    Ok(())
}

#[test]
fn test_snapshot_for_display() -> anyhow::Result<()> {
    let mut tree = load_json(&parallel(json!({}), &["ok", "busy"]), &scripted_registry())?;
    tree.tick(&mut Context::default());
    let snapshot = serde_json::to_value(tree.snapshot())?;
    assert_eq!(snapshot["status"], "running");
    assert_eq!(snapshot["children"][0]["children"][0]["status"], "success");
    assert_eq!(snapshot["children"][0]["children"][1]["tickCount"], 1);
    Ok(())
}
