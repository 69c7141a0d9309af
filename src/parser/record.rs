use serde::{Deserialize, Serialize};

use crate::{
    container::{DEFAULT_HEIGHT, DEFAULT_WIDTH},
    error::LoadError,
    NodeContainer, Properties,
};

/// The serialized form of a node and its subtree.
///
/// ```json
/// {"id": "...", "type": "Sequence", "name": "Patrol", "x": 0.0, "y": 0.0,
///  "width": 150.0, "height": 60.0, "properties": {}, "children": []}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// An empty id is replaced with a fresh one when loaded.
    #[serde(default)]
    pub id: String,
    #[serde(rename = "type")]
    pub ty: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(default = "default_width")]
    pub width: f64,
    #[serde(default = "default_height")]
    pub height: f64,
    #[serde(default)]
    pub properties: Properties,
    #[serde(default)]
    pub children: Vec<NodeRecord>,
}

fn default_width() -> f64 {
    DEFAULT_WIDTH
}

fn default_height() -> f64 {
    DEFAULT_HEIGHT
}

impl NodeRecord {
    pub fn from_json(source: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn from_yaml(source: &str) -> Result<Self, LoadError> {
        Ok(serde_yaml::from_str(source)?)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn to_yaml(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Number of records in this subtree.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(Self::count).sum::<usize>()
    }
}

impl From<&NodeContainer> for NodeRecord {
    fn from(node: &NodeContainer) -> Self {
        Self {
            id: node.id.clone(),
            ty: node.ty.as_str().to_owned(),
            name: node.name.clone(),
            x: node.layout.x,
            y: node.layout.y,
            width: node.layout.width,
            height: node.layout.height,
            properties: node.properties.clone(),
            children: node.child_nodes.iter().map(Self::from).collect(),
        }
    }
}
