use mu_core::model::{NodeId, OutlineTree};
use mu_core::Config;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::locator::MessageStore;

mod apple_mail;
#[cfg(unix)]
mod maildir;
mod mbox;

pub(crate) use apple_mail::scan as scan_apple_mail;
#[cfg(unix)]
pub(crate) use maildir::scan as scan_maildir;
pub(crate) use mbox::scan as scan_mbox_root;

/// One scanned mailbox: where it is, its place below the root, and the
/// locators of its messages.
pub(crate) struct Leaf {
    /// Path components relative to the root folder. Empty if the root
    /// folder itself is the mailbox.
    pub components: Vec<String>,
    pub path: PathBuf,
    pub store: MessageStore,
}

/// The result of one scanning pass: the outline tree plus the message
/// stores, indexed by node id.
pub(crate) struct Scanned {
    pub tree: OutlineTree,
    pub stores: Vec<MessageStore>,
}

/// Turn a flat list of scanned mailboxes into the outline tree. Leaves are
/// sorted by their relative path first, so the tree (and with it the
/// message-bearing chain) is deterministic regardless of filesystem
/// enumeration order.
pub(crate) fn assemble(config: &Config, mut leaves: Vec<Leaf>) -> Scanned {
    leaves.sort_by(|a, b| a.components.cmp(&b.components));

    let mut tree = OutlineTree::new(
        config.root_name.clone(),
        Some(config.mail_folder_path.clone()),
    );
    let mut stores: Vec<MessageStore> = vec![MessageStore::None];
    let mut index: HashMap<Vec<String>, NodeId> = HashMap::new();

    for leaf in leaves {
        if leaf.components.is_empty() {
            // The root folder is itself a mailbox (e.g. a plain maildir).
            tree.set_message_count(tree.root(), leaf.store.len());
            stores[tree.root()] = leaf.store;
            continue;
        }
        let mut parent = tree.root();
        let mut prefix: Vec<String> = Vec::new();
        for component in &leaf.components[..leaf.components.len() - 1] {
            prefix.push(component.clone());
            parent = match index.get(&prefix) {
                Some(id) => *id,
                None => {
                    let id = tree.add_child(parent, display_name(component), None, 0);
                    stores.push(MessageStore::None);
                    index.insert(prefix.clone(), id);
                    id
                }
            };
        }
        let name = display_name(leaf.components.last().unwrap());
        let id = tree.add_child(parent, name, Some(leaf.path.clone()), leaf.store.len());
        stores.push(leaf.store);
        index.insert(leaf.components, id);
    }

    tree.rebuild_chain();
    Scanned { tree, stores }
}

/// The name an item is shown under: the `.mbox` suffix Apple Mail and
/// Eudora put on mailboxes is dropped.
fn display_name(component: &str) -> String {
    component
        .strip_suffix(".mbox")
        .unwrap_or(component)
        .to_owned()
}

/// `path` relative to `root`, as a list of component names.
pub(crate) fn relative_components(root: &Path, path: &Path) -> Vec<String> {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect(),
        // Not below the root; keep the last component so the leaf still
        // shows up somewhere sensible.
        Err(_) => path
            .file_name()
            .map(|n| vec![n.to_string_lossy().into_owned()])
            .unwrap_or_default(),
    }
}
