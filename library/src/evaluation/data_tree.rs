//! Nested data container carried between nodes.

use std::fmt;

use serde::Serialize;

use super::value::{Data, Value};
use crate::error::NodeError;

/// Runtime value holder.
///
/// A level-0 tree holds one payload; a level-n tree holds an ordered sequence
/// of child trees. Levels of written trees are derived bottom-up by
/// [`DataTree::set_level`]; a tree that was never written is empty.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DataTree {
    level: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<DataTree>,
}

impl DataTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn leaf(value: Value) -> Self {
        Self {
            level: 0,
            payload: Some(value),
            children: Vec::new(),
        }
    }

    pub fn sequence(values: Vec<Value>) -> Self {
        Self {
            level: 1,
            payload: None,
            children: values.into_iter().map(DataTree::leaf).collect(),
        }
    }

    pub fn from_children(children: Vec<DataTree>) -> Self {
        let mut tree = Self {
            level: 1,
            payload: None,
            children,
        };
        tree.set_level();
        tree
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn payload(&self) -> Option<&Value> {
        self.payload.as_ref()
    }

    pub fn children(&self) -> &[DataTree] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_none() && self.children.is_empty()
    }

    /// Appends an empty child and returns it for writing.
    pub fn push_child(&mut self) -> &mut DataTree {
        self.children.push(DataTree::new());
        let last = self.children.len() - 1;
        &mut self.children[last]
    }

    /// Writes one call's result at the declared level.
    pub fn assign(&mut self, data: Data, level: usize) -> Result<(), NodeError> {
        match (level, data) {
            (0, Data::One(value)) => {
                self.payload = Some(value);
                self.level = 0;
            }
            (0, Data::Many(values)) => {
                return Err(NodeError::return_shape(format!(
                    "level-0 output received a sequence of {} values",
                    values.len()
                )));
            }
            (1, Data::One(value)) => {
                self.children.push(DataTree::leaf(value));
                self.level = 1;
            }
            (1, Data::Many(values)) => {
                self.children.extend(values.into_iter().map(DataTree::leaf));
                self.level = 1;
            }
            (other, _) => {
                return Err(NodeError::return_shape(format!(
                    "declared output level {} is not supported",
                    other
                )));
            }
        }
        Ok(())
    }

    /// Recomputes levels bottom-up from what was actually written and
    /// returns this tree's level.
    pub fn set_level(&mut self) -> usize {
        if !self.children.is_empty() {
            let deepest = self
                .children
                .iter_mut()
                .map(DataTree::set_level)
                .max()
                .unwrap_or(0);
            self.level = deepest + 1;
        }
        self.level
    }

    /// Payloads of all leaves, depth-first.
    pub fn leaves(&self) -> Vec<&Value> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Value>) {
        if let Some(payload) = &self.payload {
            out.push(payload);
        }
        for child in &self.children {
            child.collect_leaves(out);
        }
    }

    /// Payloads of the direct children (level-1 view).
    pub fn child_payloads(&self) -> Vec<Value> {
        self.children
            .iter()
            .filter_map(|c| c.payload.clone())
            .collect()
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match &self.payload {
            Some(payload) => writeln!(f, "{}[{}] {}", pad, self.level, payload)?,
            None if self.children.is_empty() => writeln!(f, "{}[{}] <empty>", pad, self.level)?,
            None => writeln!(f, "{}[{}] ({} items)", pad, self.level, self.children.len())?,
        }
        for child in &self.children {
            child.fmt_indented(f, depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for DataTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}
