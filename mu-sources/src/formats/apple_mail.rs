use mu_core::eyre::{bail, Result};
use mu_core::tracing::trace;
use mu_core::{Config, Message, StatusSender};
use rayon::prelude::*;
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

use super::{assemble, relative_components, Leaf, Scanned};
use crate::locator::{FileEntry, FileFlavor, MessageStore};

/// Scan an Apple Mail tree: every `.mbox` directory is a mailbox, the
/// `.emlx` files somewhere beneath it (usually in a `Messages` folder) are
/// its messages. Nested `.mbox` directories are mailboxes of their own.
pub(crate) fn scan(config: &Config, sender: &StatusSender) -> Result<Scanned> {
    let root = config.mail_folder_path.as_path();
    if !root.exists() {
        bail!("Folder {} does not exist", root.display());
    }

    let mut mailboxes: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.path().is_dir() && is_mbox_dir(entry.path()) {
            trace!("Found mailbox {}", entry.path().display());
            mailboxes.push(entry.path().to_path_buf());
        }
    }
    sender.send(Message::ScanTotal(mailboxes.len())).ok();

    let leaves: Vec<Leaf> = mailboxes
        .into_par_iter()
        .map(|mailbox| {
            let entries = emlx_entries(&mailbox)?;
            sender.send(Message::ScanOne).ok();
            Ok(Leaf {
                components: relative_components(root, &mailbox),
                path: mailbox,
                store: MessageStore::Files {
                    flavor: FileFlavor::Emlx,
                    entries,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(config, leaves))
}

fn is_mbox_dir(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(".mbox"))
        .unwrap_or(false)
}

/// All `.emlx` files below `mailbox`, without descending into nested
/// mailboxes. Sorted by path so enumeration is stable across a session.
fn emlx_entries(mailbox: &Path) -> Result<Vec<FileEntry>> {
    let walker = WalkDir::new(mailbox)
        .into_iter()
        .filter_entry(|e| e.path() == mailbox || !is_mbox_dir(e.path()));
    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;
        let path = entry.path();
        let is_emlx = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.ends_with(".emlx"))
            .unwrap_or(false);
        if path.is_file() && is_emlx {
            entries.push(FileEntry {
                path: path.to_path_buf(),
                // Read out of the emlx envelope at extraction time.
                seen: None,
            });
        }
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
