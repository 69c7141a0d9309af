use super::*;
use crate::{error::AddChildError, Context};

const GUARD: &str = r#"{
    "id": "root", "type": "Root", "name": "Guard", "x": 0, "y": 0,
    "children": [{
        "id": "main", "type": "Selector", "name": "Main", "x": 0, "y": 100,
        "children": [
            {
                "id": "flee", "type": "Sequence", "name": "Flee", "x": -100, "y": 200,
                "children": [
                    {
                        "id": "hurt", "type": "Condition", "name": "Hurt?", "x": -100, "y": 300,
                        "properties": {"conditionType": "variable", "variable": "hp",
                                       "operator": "less", "value": 20}
                    },
                    {
                        "id": "run", "type": "Action", "name": "Run", "x": -100, "y": 400,
                        "properties": {"actionType": "custom", "script": "run"}
                    }
                ]
            },
            {
                "id": "idle", "type": "Action", "name": "Idle", "x": 100, "y": 200,
                "properties": {"actionType": "custom", "script": "idle"}
            }
        ]
    }]
}"#;

fn registry() -> Registry {
    let mut registry = Registry::default();
    registry.register_action("run", |ctx: &mut Context| {
        ctx.set("last", "run");
        Ok(NodeStatus::Success)
    });
    registry.register_action("idle", |ctx: &mut Context| {
        ctx.set("last", "idle");
        Ok(NodeStatus::Success)
    });
    registry
}

fn record(source: &str) -> NodeRecord {
    NodeRecord::from_json(source).unwrap()
}

fn single_child(child: &str) -> NodeRecord {
    record(&format!(
        r#"{{"id": "root", "type": "Root", "name": "Root", "x": 0, "y": 0, "children": [{}]}}"#,
        child
    ))
}

#[test]
fn test_load() {
    let mut tree = load_json(GUARD, &registry()).unwrap();
    assert_eq!(tree.stats().total_nodes, 6);
    assert_eq!(tree.path_of("idle").as_deref(), Some("root.child[0].child[1]"));
    assert_eq!(tree.find("flee").unwrap().name(), "Flee");
    assert_eq!(tree.find("hurt").unwrap().layout().y, 300.);

    let mut ctx = Context::default();
    ctx.set("hp", 10);
    assert_eq!(tree.tick(&mut ctx), NodeStatus::Success);
    assert_eq!(ctx.get_as::<String>("last").as_deref(), Some("run"));

    ctx.set("hp", 90);
    assert_eq!(tree.tick(&mut ctx), NodeStatus::Success);
    assert_eq!(ctx.get_as::<String>("last").as_deref(), Some("idle"));
}

#[test]
fn test_round_trip() {
    let source = record(GUARD);
    let tree = load(&source, &registry()).unwrap();
    assert_eq!(tree.to_record(), source);
}

#[test]
fn test_missing_root() {
    let source = record(r#"{"id": "s", "type": "Sequence", "name": "Seq", "x": 0, "y": 0}"#);
    assert!(matches!(
        load(&source, &registry()),
        Err(LoadError::MissingRoot(ty)) if ty == "Sequence"
    ));
    // Subtrees can still be loaded on their own
    assert!(load_node(&source, &registry()).is_ok());
}

#[test]
fn test_unknown_type() {
    let source = single_child(r#"{"type": "Teleport", "name": "T", "x": 0, "y": 0}"#);
    match load(&source, &registry()) {
        Err(LoadError::UnknownType { ty, path }) => {
            assert_eq!(ty, "Teleport");
            assert_eq!(path, "root.child[0]");
        }
        _ => panic!("expected an unknown type"),
    }
}

#[test]
fn test_reserved_type() {
    let source = single_child(r#"{"type": "Timeout", "name": "T", "x": 0, "y": 0}"#);
    match load(&source, &registry()) {
        Err(LoadError::Unimplemented { ty, path }) => {
            assert_eq!(ty, "Timeout");
            assert_eq!(path, "root.child[0]");
        }
        _ => panic!("expected an unimplemented type"),
    }
}

#[test]
fn test_duplicate_id() {
    let source = single_child(
        r#"{"id": "s", "type": "Sequence", "name": "S", "x": 0, "y": 0, "children": [
            {"id": "a", "type": "Action", "name": "A", "x": 0, "y": 0,
             "properties": {"script": "run"}},
            {"id": "a", "type": "Action", "name": "B", "x": 0, "y": 0,
             "properties": {"script": "idle"}}
        ]}"#,
    );
    match load(&source, &registry()) {
        Err(LoadError::DuplicateId { id, path }) => {
            assert_eq!(id, "a");
            assert_eq!(path, "root.child[0].child[1]");
        }
        _ => panic!("expected a duplicate id"),
    }
}

#[test]
fn test_leaf_with_children() {
    let source = single_child(
        r#"{"id": "a", "type": "Action", "name": "A", "x": 0, "y": 0,
            "properties": {"script": "run"},
            "children": [{"type": "Action", "name": "B", "x": 0, "y": 0,
                          "properties": {"script": "run"}}]}"#,
    );
    match load(&source, &registry()) {
        Err(LoadError::AddChild { path, source }) => {
            assert_eq!(path, r#"root.child[0] (Action "A")"#);
            assert_eq!(source, AddChildError::TooManyNodes);
        }
        _ => panic!("expected a rejected child"),
    }
}

#[test]
fn test_unknown_script() {
    let source = single_child(
        r#"{"type": "Action", "name": "A", "x": 0, "y": 0,
            "properties": {"actionType": "custom", "script": "fly"}}"#,
    );
    match load(&source, &registry()) {
        Err(LoadError::UnknownScript { script, path }) => {
            assert_eq!(script, "fly");
            assert_eq!(path, "root.child[0]");
        }
        _ => panic!("expected an unknown script"),
    }
}

#[test]
fn test_missing_ids_are_generated() {
    let source = single_child(
        r#"{"type": "Action", "name": "A", "x": 0, "y": 0, "properties": {"script": "run"}}"#,
    );
    let tree = load(&source, &registry()).unwrap();
    let child = &tree.root().children()[0];
    assert!(!child.id().is_empty());
    assert_ne!(child.id(), "root");
}

#[test]
fn test_clone_subtree() {
    let registry = registry();
    let mut tree = load_json(GUARD, &registry).unwrap();
    let mut ctx = Context::default();
    ctx.set("hp", 10);
    tree.tick(&mut ctx);

    let flee = tree.find("flee").unwrap();
    let copy = clone_subtree(flee, &registry).unwrap();
    assert_ne!(copy.id(), "flee");
    assert_eq!(copy.name(), "Flee");
    assert_eq!(copy.status(), NodeStatus::Ready);
    assert_eq!(copy.tick_count(), 0);
    assert_eq!(copy.children().len(), 2);
    assert_ne!(copy.children()[1].id(), "run");
    assert_eq!(copy.children()[1].properties()["script"], "run");

    // The copy can live next to the subtree it came from
    tree.find_mut("main").unwrap().add_child(copy).unwrap();
    assert_eq!(tree.stats().total_nodes, 9);
}

#[test]
fn test_yaml() {
    let source = r#"
id: root
type: Root
name: Root
x: 0
y: 0
properties:
  debug: true
children:
- id: wait
  type: Action
  name: Wait
  x: 0
  y: 100
  properties:
    actionType: wait
    duration: 0
"#;
    let mut tree = load_yaml(source, &registry()).unwrap();
    assert_eq!(tree.find("wait").unwrap().layout().width, 150.);
    assert_eq!(tree.tick(&mut Context::default()), NodeStatus::Success);
}

#[test]
fn test_malformed_source() {
    assert!(matches!(
        load_json("{\"type\": ", &registry()),
        Err(LoadError::Json(_))
    ));
    assert!(matches!(
        load_yaml("type: [", &registry()),
        Err(LoadError::Yaml(_))
    ));
}
