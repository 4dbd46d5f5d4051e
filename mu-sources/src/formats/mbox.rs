use mu_core::eyre::{bail, Result};
use mu_core::tracing::trace;
use mu_core::{Config, Message, StatusSender};
use rayon::prelude::*;
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

use super::{assemble, relative_components, Leaf, Scanned};
use crate::locator::{scan_mbox, MessageStore};

/// Scan a folder of mbox files, as left behind by Eudora, Thunderbird, or
/// an Entourage RGE archive. Each mbox file becomes one mailbox; its
/// message offsets are computed here, once, and reused for random access
/// during the upload.
pub(crate) fn scan(config: &Config, sender: &StatusSender) -> Result<Scanned> {
    let root = config.mail_folder_path.as_path();
    if !root.exists() {
        bail!("Folder {} does not exist", root.display());
    }

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.path().is_file() && is_mbox_file(entry.path()) {
            trace!("Found mbox file {}", entry.path().display());
            files.push(entry.path().to_path_buf());
        }
    }
    sender.send(Message::ScanTotal(files.len())).ok();

    let mut leaves: Vec<Leaf> = files
        .into_par_iter()
        .map(|file| {
            let index = scan_mbox(&file)?;
            sender.send(Message::ScanOne).ok();
            Ok(Leaf {
                components: relative_components(root, &file),
                path: file,
                store: MessageStore::Mbox(index),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    // Extensionless files without a single delimiter line (table-of-
    // contents files, random strays) are not mailboxes.
    leaves.retain(|leaf| !leaf.store.is_empty());

    Ok(assemble(config, leaves))
}

/// Mail folders mix mailbox files with index files (`.msf`, `.toc`) and
/// other junk. A candidate mailbox either carries the `.mbox` extension
/// or none at all.
fn is_mbox_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return false,
    };
    if name.starts_with('.') {
        return false;
    }
    match path.extension().and_then(|e| e.to_str()) {
        Some("mbox") => true,
        Some(_) => false,
        None => true,
    }
}
