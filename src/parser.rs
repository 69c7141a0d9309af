mod loader;
pub mod path;
mod record;
mod validate;

pub use self::{
    loader::{clone_subtree, load, load_json, load_node, load_yaml},
    path::{parse_path, PathSegment},
    record::NodeRecord,
    validate::{validate_node, validate_tree, ValidationReport},
};
