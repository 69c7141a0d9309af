use super::*;
use serde_json::json;

struct Constant(NodeStatus);

impl BehaviorNode for Constant {
    fn tick(&mut self, _: &mut [NodeContainer], _: &mut Context) -> NodeStatus {
        self.0
    }
}

#[test]
fn test_builtins() {
    let registry = Registry::default();
    for ty in NodeType::ALL {
        let result = registry.build(ty, &Properties::new());
        if ty.is_reserved() {
            assert!(matches!(result, Err(LoadError::Unimplemented { .. })), "{}", ty);
        } else {
            assert!(result.is_ok(), "{}", ty);
        }
    }
}

#[test]
fn test_invalid_properties() {
    let registry = Registry::default();
    let props = json!({"policy": "whatever"}).as_object().cloned().unwrap();
    match registry.build(NodeType::Parallel, &props) {
        Err(LoadError::InvalidProperties { ty, .. }) => assert_eq!(ty, "Parallel"),
        _ => panic!("expected invalid properties"),
    }
}

#[test]
fn test_register_replaces_constructor() {
    let mut registry = Registry::default();
    registry.register(
        NodeType::Cooldown,
        Box::new(|_: &Properties, _: &Registry| {
            Ok(Box::new(Constant(NodeStatus::Failure)) as Box<dyn BehaviorNode>)
        }),
    );
    let mut node = registry
        .create(NodeType::Cooldown, "cooldown", Properties::new())
        .unwrap();
    assert_eq!(node.ty(), NodeType::Cooldown);
    assert_eq!(node.tick(&mut Context::default()), NodeStatus::Failure);
}

#[test]
fn test_boxify() {
    let mut registry = Registry::default();
    registry.register(
        NodeType::Timeout,
        boxify(NodeType::Timeout, |props: &Properties| {
            let succeed: bool = props
                .get("succeed")
                .map(|v| serde_json::from_value(v.clone()))
                .transpose()?
                .unwrap_or(true);
            Ok(Constant(if succeed {
                NodeStatus::Success
            } else {
                NodeStatus::Failure
            }))
        }),
    );
    let props = json!({"succeed": false}).as_object().cloned().unwrap();
    let mut node = registry.create(NodeType::Timeout, "t", props).unwrap();
    assert_eq!(node.tick(&mut Context::default()), NodeStatus::Failure);

    let props = json!({"succeed": 1}).as_object().cloned().unwrap();
    assert!(matches!(
        registry.build(NodeType::Timeout, &props),
        Err(LoadError::InvalidProperties { .. })
    ));
}

#[test]
fn test_scripts() {
    let mut registry = Registry::default();
    assert!(registry.action_script("jump").is_none());
    registry.register_action("jump", |_: &mut Context| Ok(NodeStatus::Success));
    registry.register_condition("grounded", |_: &mut Context| Ok(true));

    let jump = registry.action_script("jump").unwrap();
    assert_eq!(jump(&mut Context::default()), Ok(NodeStatus::Success));
    let grounded = registry.condition_script("grounded").unwrap();
    assert_eq!(grounded(&mut Context::default()), Ok(true));
}

#[test]
fn test_create_keeps_properties() {
    let registry = Registry::default();
    let props = json!({"repeatCount": 4}).as_object().cloned().unwrap();
    let node = registry
        .create(NodeType::Repeater, "four times", props.clone())
        .unwrap();
    assert_eq!(node.properties(), &props);
    assert_eq!(node.name(), "four times");
    assert_eq!(node.status(), NodeStatus::Ready);
}
