//! The outline tree of one mailbox root.
//!
//! Nodes live in an arena and are addressed by stable [`NodeId`] indices.
//! Besides the parent / child structure the tree carries a flat chain of
//! the message-bearing nodes in pre-order. That chain is the iteration
//! order for uploading: deterministic, and matching the on-screen order
//! of the outline.

use std::path::PathBuf;

/// Index of a node in its [`OutlineTree`] arena.
pub type NodeId = usize;

/// Tri-state selection of an outline item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckState {
    Unchecked,
    Checked,
    /// Some, but not all, descendants are checked. Never set directly.
    Mixed,
}

/// One node of the outline: either a folder of children, or an item that
/// directly represents messages (a mailbox file or maildir).
#[derive(Debug)]
pub struct OutlineItem {
    pub name: String,
    /// Nesting depth, for drawing folder indentation.
    pub level: usize,
    /// Filesystem path of the folder or mailbox file, if there is one.
    pub path: Option<PathBuf>,
    /// Number of messages directly represented by this node.
    pub message_count: usize,
    state: CheckState,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl OutlineItem {
    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn children(&self) -> &[NodeId] {
        &self.children
    }
}

/// The tree itself. Built once when a root is imported and never rebuilt
/// mid-upload; only the selection state is mutated afterwards.
#[derive(Debug)]
pub struct OutlineTree {
    items: Vec<OutlineItem>,
    /// Pre-order chain of nodes with `message_count > 0`.
    chain: Vec<NodeId>,
}

impl OutlineTree {
    /// Create a tree containing just the root item. Everything starts out
    /// checked; an empty folder therefore reports `Checked`.
    pub fn new(root_name: impl Into<String>, path: Option<PathBuf>) -> Self {
        let root = OutlineItem {
            name: root_name.into(),
            level: 0,
            path,
            message_count: 0,
            state: CheckState::Checked,
            parent: None,
            children: Vec::new(),
        };
        OutlineTree {
            items: vec![root],
            chain: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        0
    }

    pub fn item(&self, id: NodeId) -> &OutlineItem {
        &self.items[id]
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Append a child under `parent` and return its id. Children keep the
    /// insertion order; the message-bearing chain is derived from it.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        path: Option<PathBuf>,
        message_count: usize,
    ) -> NodeId {
        let id = self.items.len();
        let level = self.items[parent].level + 1;
        self.items.push(OutlineItem {
            name: name.into(),
            level,
            path,
            message_count,
            state: CheckState::Checked,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.items[parent].children.push(id);
        id
    }

    /// Used when the root folder itself turns out to be a mailbox.
    pub fn set_message_count(&mut self, id: NodeId, count: usize) {
        self.items[id].message_count = count;
    }

    /// Rebuild the message-bearing chain. Called once after construction,
    /// when all children have been added.
    pub fn rebuild_chain(&mut self) {
        let mut chain = Vec::new();
        let mut stack = vec![self.root()];
        while let Some(id) = stack.pop() {
            if self.items[id].message_count > 0 {
                chain.push(id);
            }
            // Push in reverse so that the pre-order matches child order.
            for child in self.items[id].children.iter().rev() {
                stack.push(*child);
            }
        }
        self.chain = chain;
    }

    /// The upload iteration order: all message-bearing nodes in pre-order.
    pub fn chain(&self) -> &[NodeId] {
        &self.chain
    }

    /// Set the selection of `id`. Setting a parent force-propagates the
    /// value to all descendants (never producing `Mixed` below the call
    /// site), then the aggregated state of every ancestor is recomputed.
    pub fn set_state(&mut self, id: NodeId, checked: bool) {
        let value = if checked {
            CheckState::Checked
        } else {
            CheckState::Unchecked
        };
        self.propagate_down(id, value);
        let mut current = self.items[id].parent;
        while let Some(parent) = current {
            self.items[parent].state = self.fold_children(parent);
            current = self.items[parent].parent;
        }
    }

    fn propagate_down(&mut self, id: NodeId, value: CheckState) {
        self.items[id].state = value;
        let children = self.items[id].children.clone();
        for child in children {
            self.propagate_down(child, value);
        }
    }

    /// A parent is `Checked` iff all children are checked, `Unchecked` iff
    /// all are unchecked, else `Mixed`. A node without children keeps its
    /// own state.
    fn fold_children(&self, id: NodeId) -> CheckState {
        let children = &self.items[id].children;
        if children.is_empty() {
            return self.items[id].state;
        }
        let mut all_checked = true;
        let mut all_unchecked = true;
        for child in children {
            match self.items[*child].state {
                CheckState::Checked => all_unchecked = false,
                CheckState::Unchecked => all_checked = false,
                CheckState::Mixed => {
                    all_checked = false;
                    all_unchecked = false;
                }
            }
        }
        if all_checked {
            CheckState::Checked
        } else if all_unchecked {
            CheckState::Unchecked
        } else {
            CheckState::Mixed
        }
    }

    /// Fold over the subtree rooted at `id`. Recomputed on demand, used to
    /// size progress bars and time estimates.
    pub fn recursive_message_count(&self, id: NodeId) -> usize {
        let mut total = self.items[id].message_count;
        for child in &self.items[id].children {
            total += self.recursive_message_count(*child);
        }
        total
    }

    /// Like [`recursive_message_count`], but only counting nodes whose
    /// selection is checked. Message-bearing nodes are leaves, so a node
    /// either contributes all of its messages or none.
    pub fn recursive_checked_count(&self, id: NodeId) -> usize {
        let item = &self.items[id];
        let mut total = if item.state == CheckState::Checked {
            item.message_count
        } else {
            0
        };
        for child in &item.children {
            total += self.recursive_checked_count(*child);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A small tree:
    /// root
    /// ├── Folder A
    /// │   ├── Inbox (3 messages)
    /// │   └── Sent (2 messages)
    /// └── Archive (4 messages)
    fn fixture() -> (OutlineTree, NodeId, NodeId, NodeId, NodeId) {
        let mut tree = OutlineTree::new("Test", None);
        let folder_a = tree.add_child(tree.root(), "Folder A", None, 0);
        let inbox = tree.add_child(folder_a, "Inbox", None, 3);
        let sent = tree.add_child(folder_a, "Sent", None, 2);
        let archive = tree.add_child(tree.root(), "Archive", None, 4);
        tree.rebuild_chain();
        (tree, folder_a, inbox, sent, archive)
    }

    #[test]
    fn test_chain_is_preorder() {
        let (tree, _, inbox, sent, archive) = fixture();
        assert_eq!(tree.chain(), &[inbox, sent, archive]);
    }

    #[test]
    fn test_counts() {
        let (tree, folder_a, ..) = fixture();
        assert_eq!(tree.recursive_message_count(tree.root()), 9);
        assert_eq!(tree.recursive_message_count(folder_a), 5);
    }

    #[test]
    fn test_set_state_propagates_down() {
        let (mut tree, folder_a, inbox, sent, _) = fixture();
        tree.set_state(tree.root(), false);
        for id in [folder_a, inbox, sent] {
            assert_eq!(tree.item(id).state(), CheckState::Unchecked);
        }
        assert_eq!(tree.recursive_checked_count(tree.root()), 0);

        tree.set_state(tree.root(), true);
        assert_eq!(tree.item(tree.root()).state(), CheckState::Checked);
        assert_eq!(tree.recursive_checked_count(tree.root()), 9);
    }

    #[test]
    fn test_leaf_change_recomputes_ancestors() {
        let (mut tree, folder_a, inbox, sent, archive) = fixture();
        tree.set_state(inbox, false);
        assert_eq!(tree.item(folder_a).state(), CheckState::Mixed);
        assert_eq!(tree.item(tree.root()).state(), CheckState::Mixed);
        assert_eq!(tree.recursive_checked_count(tree.root()), 6);

        tree.set_state(sent, false);
        assert_eq!(tree.item(folder_a).state(), CheckState::Unchecked);
        assert_eq!(tree.item(tree.root()).state(), CheckState::Mixed);

        tree.set_state(archive, false);
        assert_eq!(tree.item(tree.root()).state(), CheckState::Unchecked);
    }

    #[test]
    fn test_checked_count_never_exceeds_total() {
        let (mut tree, _, inbox, _, archive) = fixture();
        tree.set_state(inbox, false);
        tree.set_state(archive, false);
        for id in 0..tree.len() {
            assert!(tree.recursive_checked_count(id) <= tree.recursive_message_count(id));
        }
    }

    #[test]
    fn test_empty_folder_defaults_to_checked() {
        let mut tree = OutlineTree::new("Test", None);
        let empty = tree.add_child(tree.root(), "Empty", None, 0);
        tree.rebuild_chain();
        assert!(tree.chain().is_empty());
        assert_eq!(tree.item(empty).state(), CheckState::Checked);
        assert_eq!(tree.item(tree.root()).state(), CheckState::Checked);
    }
}
