use mu_core::eyre::{bail, eyre, Result};
use mu_core::tracing::trace;
use mu_core::{Config, Message, StatusSender};
use rayon::prelude::*;
use walkdir::WalkDir;

use std::path::{Path, PathBuf};

use super::{assemble, relative_components, Leaf, Scanned};
use crate::locator::{FileEntry, FileFlavor, MessageStore};

/// Scan a maildir tree: every folder that contains a `cur` or `new`
/// directory is a mailbox, including the root folder itself.
pub(crate) fn scan(config: &Config, sender: &StatusSender) -> Result<Scanned> {
    let root = config.mail_folder_path.as_path();
    if !root.exists() {
        bail!("Folder {} does not exist", root.display());
    }

    let mut mailboxes: Vec<PathBuf> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.path().is_dir() && is_maildir(entry.path()) {
            trace!("Found maildir {}", entry.path().display());
            mailboxes.push(entry.path().to_path_buf());
        }
    }
    sender.send(Message::ScanTotal(mailboxes.len())).ok();

    let leaves: Vec<Leaf> = mailboxes
        .into_par_iter()
        .map(|mailbox| {
            let entries = maildir_entries(&mailbox)?;
            sender.send(Message::ScanOne).ok();
            Ok(Leaf {
                components: relative_components(root, &mailbox),
                path: mailbox,
                store: MessageStore::Files {
                    flavor: FileFlavor::Raw,
                    entries,
                },
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(assemble(config, leaves))
}

fn is_maildir(path: &Path) -> bool {
    path.join("cur").is_dir() || path.join("new").is_dir()
}

/// The messages of one maildir (`new` and `cur`), sorted by path so
/// enumeration is stable. The seen flag comes out of the maildir filename
/// right here.
fn maildir_entries(path: &Path) -> Result<Vec<FileEntry>> {
    let maildir = maildir::Maildir::from(path.to_path_buf());
    let mut entries = Vec::new();
    for mail in maildir.list_new().chain(maildir.list_cur()) {
        let mail = mail.map_err(|e| eyre!("Could not list {}: {:?}", path.display(), e))?;
        entries.push(FileEntry {
            path: mail.path().to_path_buf(),
            seen: Some(mail.is_seen()),
        });
    }
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}
