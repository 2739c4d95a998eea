//! Typed node paths.
//!
//! A path is a sequence of `(node-id, instance-id)` steps starting at the tree
//! root. It is built once (usually by parsing the textual form
//! `GLOBAL/0/CHANNEL_1/0/`) and then resolved structurally against a tree.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{InstanceId, NodeId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodePath(Vec<(NodeId, InstanceId)>);

/// A path segment did not resolve against the tree it was applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathNotFound(pub NodePath);

/// The textual form of a path is malformed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathParseError(pub String);

impl NodePath {
    pub fn new(segments: Vec<(NodeId, InstanceId)>) -> Self {
        Self(segments)
    }

    /// Path to instance 0 of the root node.
    pub fn root(id: &NodeId) -> Self {
        Self(vec![(id.clone(), InstanceId::default())])
    }

    pub fn segments(&self) -> &[(NodeId, InstanceId)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A new path one step deeper.
    pub fn child(&self, node: &NodeId, instance: InstanceId) -> Self {
        let mut segments = self.0.clone();
        segments.push((node.clone(), instance));
        Self(segments)
    }

    /// The path without its last step, or `None` for an empty path.
    pub fn parent(&self) -> Option<Self> {
        let (_, init) = self.0.split_last()?;
        Some(Self(init.to_vec()))
    }

    pub fn last(&self) -> Option<&(NodeId, InstanceId)> {
        self.0.last()
    }
}

impl FromStr for NodePath {
    type Err = PathParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').filter(|p| !p.is_empty()).collect();
        if parts.len() % 2 != 0 {
            return Err(PathParseError(format!(
                "path '{}' must alternate node ids and instance ids",
                s
            )));
        }
        let segments = parts
            .chunks(2)
            .map(|pair| {
                let id = pair[1]
                    .parse::<u32>()
                    .map_err(|_| PathParseError(format!("bad instance id '{}' in '{}'", pair[1], s)))?;
                Ok((NodeId::new(pair[0]), InstanceId::new(id)))
            })
            .collect::<Result<Vec<_>, PathParseError>>()?;
        Ok(Self(segments))
    }
}

impl std::fmt::Display for NodePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (node, instance) in &self.0 {
            write!(f, "{}/{}/", node, instance)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for PathNotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "path not found: {}", self.0)
    }
}

impl std::error::Error for PathNotFound {}

impl std::fmt::Display for PathParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for PathParseError {}
