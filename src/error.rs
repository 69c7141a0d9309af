use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum AddChildError {
    #[error("Attempted to add too many nodes")]
    TooManyNodes,
    #[error("Node id {0:?} already exists in the tree")]
    DuplicateId(String),
    #[error("No node with id {0:?} to add a child to")]
    UnknownParent(String),
}

pub type AddChildResult = Result<(), AddChildError>;

/// Raised synchronously while building a tree from data or from code.
///
/// Every variant that concerns a particular node carries its path from the
/// top of the data being loaded, e.g. `root.child[2].child[0]`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoadError {
    #[error("The top node must be a Root, found {0}")]
    MissingRoot(String),
    #[error("Unknown node type {ty:?} at {path}")]
    UnknownType { ty: String, path: String },
    #[error("Node type {ty} is reserved and has no implementation (at {path})")]
    Unimplemented { ty: String, path: String },
    #[error("Duplicate node id {id:?} at {path}")]
    DuplicateId { id: String, path: String },
    #[error("Invalid properties for {ty} at {path}: {source}")]
    InvalidProperties {
        ty: String,
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Script {script:?} is not registered (at {path})")]
    UnknownScript { script: String, path: String },
    #[error("Invalid property path at {path}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: PathError,
    },
    #[error("{source} to {path}")]
    AddChild {
        path: String,
        #[source]
        source: AddChildError,
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl LoadError {
    /// Replaces the path of a node-scoped error. Constructors do not know
    /// where in the tree they are called from, so the loader fills it in.
    pub(crate) fn at(self, at: &str) -> Self {
        match self {
            Self::UnknownType { ty, .. } => Self::UnknownType {
                ty,
                path: at.to_owned(),
            },
            Self::Unimplemented { ty, .. } => Self::Unimplemented {
                ty,
                path: at.to_owned(),
            },
            Self::InvalidProperties { ty, source, .. } => Self::InvalidProperties {
                ty,
                path: at.to_owned(),
                source,
            },
            Self::UnknownScript { script, .. } => Self::UnknownScript {
                script,
                path: at.to_owned(),
            },
            Self::InvalidPath { source, .. } => Self::InvalidPath {
                path: at.to_owned(),
                source,
            },
            other => other,
        }
    }
}

/// Failure raised by host-registered action or condition code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ScriptError {
    #[error("{0}")]
    Message(String),
    #[error("missing context field {0:?}")]
    MissingContext(&'static str),
}

impl ScriptError {
    pub fn new(msg: impl ToString) -> Self {
        Self::Message(msg.to_string())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum PathError {
    #[error("empty property path")]
    Empty,
    #[error("unexpected input {rest:?} in property path {input:?}")]
    Syntax { input: String, rest: String },
    #[error("property path {0:?} must start with a name")]
    LeadingIndex(String),
}
