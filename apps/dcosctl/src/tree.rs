use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::{APP_REJECTED_FIELDS, GROUP_REJECTED_FIELDS};

/// A Marathon service group: an identifier, its ordered child groups, and every other field the
/// API returned (apps, pods, version, ...) kept as the node payload.
///
/// `groups` stays an `Option` so a node serializes back exactly as it was read, whether the
/// API sent an empty list or no list at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupNode {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupNode>>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl GroupNode {
    pub fn children(&self) -> &[GroupNode] {
        self.groups.as_deref().unwrap_or(&[])
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// Call `visit` on every leaf, depth first, in document order. The second argument is the
    /// leaf's depth below `self`.
    pub fn visit_leaves<F>(&self, visit: &mut F)
    where
        F: FnMut(&GroupNode, usize),
    {
        self.visit_leaves_at(0, visit);
    }

    fn visit_leaves_at<F>(&self, depth: usize, visit: &mut F)
    where
        F: FnMut(&GroupNode, usize),
    {
        if self.is_leaf() {
            visit(self, depth);
            return;
        }
        for child in self.children() {
            child.visit_leaves_at(depth + 1, visit);
        }
    }

    /// Call `visit` on this node and every descendant, parents before children.
    pub fn visit_mut<F>(&mut self, visit: &mut F)
    where
        F: FnMut(&mut GroupNode),
    {
        visit(self);
        if let Some(children) = self.groups.as_mut() {
            for child in children {
                child.visit_mut(visit);
            }
        }
    }

    /// Remove `fields` from the payload of every node. Identifiers and child lists are not
    /// part of the payload and are never touched.
    pub fn strip_fields(&mut self, fields: &[&str]) {
        self.visit_mut(&mut |node| {
            for field in fields {
                node.payload.remove(*field);
            }
        });
    }
}

/// Prepare a group for POSTing back to Marathon.
pub fn strip_group(group: &mut GroupNode) {
    group.strip_fields(GROUP_REJECTED_FIELDS);
}

/// Prepare an app definition for POSTing back to Marathon.
pub fn strip_app(app: &mut Value) {
    let Some(fields) = app.as_object_mut() else {
        return;
    };
    for field in APP_REJECTED_FIELDS {
        fields.remove(*field);
    }
    // Marathon refuses definitions carrying both the legacy `uris` and `fetch`.
    if fields.contains_key("fetch") {
        fields.remove("uris");
    }
}

/// One report line per leaf group.
pub fn leaf_lines(root: &GroupNode, label: &str) -> Vec<String> {
    let mut lines = Vec::new();
    root.visit_leaves(&mut |leaf, depth| {
        lines.push(format!("** INFO: {label}: {} (depth {depth})", leaf.id));
    });
    lines
}

pub fn print_leaves(root: &GroupNode, label: &str) -> usize {
    let lines = leaf_lines(root, label);
    for line in &lines {
        println!("{line}");
    }
    lines.len()
}
