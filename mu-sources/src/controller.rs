use mu_core::eyre::Result;
use mu_core::model::{CheckState, OutlineTree};
use mu_core::{
    Config, Fetched, MailProperty, MailSource, Provenance, SkipReason, SkippedMessage,
    UploadCandidate, MAX_MESSAGE_SIZE,
};

use std::path::Path;

use crate::formats::Scanned;
use crate::headers;
use crate::locator::{Extracted, MessageStore};

/// One imported mailbox root: the outline tree, the per-item message
/// stores, and the upload cursor.
///
/// The cursor walks the tree's message-bearing chain; it only moves
/// forward, and it remembers exactly how far it got so an upload can be
/// paused and resumed. `reset_upload` rewinds it without touching the
/// selection.
pub struct Controller {
    config: Config,
    tree: OutlineTree,
    stores: Vec<MessageStore>,
    /// Position in the message-bearing chain of the item the cursor is on.
    chain_pos: usize,
    /// Index of the next message to attempt within that item.
    message_index: usize,
}

impl Controller {
    pub(crate) fn new(config: Config, scanned: Scanned) -> Self {
        let Scanned { tree, stores } = scanned;
        Controller {
            config,
            tree,
            stores,
            chain_pos: 0,
            message_index: 0,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn advance_item(&mut self) {
        self.chain_pos += 1;
        self.message_index = 0;
    }
}

impl MailSource for Controller {
    fn tree(&self) -> &OutlineTree {
        &self.tree
    }

    fn tree_mut(&mut self) -> &mut OutlineTree {
        &mut self.tree
    }

    fn folder_path(&self) -> &Path {
        self.config.mail_folder_path.as_path()
    }

    fn root_name(&self) -> &str {
        &self.config.root_name
    }

    fn count_selected_messages(&self) -> usize {
        self.tree.recursive_checked_count(self.tree.root())
    }

    fn reset_upload(&mut self) {
        self.chain_pos = 0;
        self.message_index = 0;
    }

    fn next_upload_candidate(&mut self) -> Result<Fetched> {
        loop {
            let node = match self.tree.chain().get(self.chain_pos) {
                Some(node) => *node,
                None => return Ok(Fetched::Exhausted),
            };
            if self.tree.item(node).state() != CheckState::Checked {
                self.advance_item();
                continue;
            }
            if self.message_index >= self.stores[node].len() {
                self.advance_item();
                continue;
            }
            let index = self.message_index;
            self.message_index += 1;

            let store = &self.stores[node];
            let mailbox_name = self.tree.item(node).name.clone();
            return Ok(match store.extract(index, MAX_MESSAGE_SIZE) {
                Ok(extracted) => Fetched::Candidate(Box::new(make_candidate(
                    &self.config,
                    mailbox_name,
                    index,
                    extracted,
                ))),
                Err(error) => Fetched::Failed(SkippedMessage {
                    path: store
                        .path_of(index)
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| self.config.mail_folder_path.clone()),
                    byte_range: store.range_of(index),
                    index,
                    message_id: None,
                    reason: SkipReason::Parsing,
                    error: error.to_string(),
                }),
            });
        }
    }
}

/// Assemble the upload record for one extracted message, applying the
/// run's upload options.
fn make_candidate(
    config: &Config,
    mailbox_name: String,
    index: usize,
    extracted: Extracted,
) -> UploadCandidate {
    let Extracted {
        data,
        path,
        byte_range,
        eol,
        seen,
    } = extracted;
    let data = headers::altered_message(data, eol);
    let message_id = headers::message_id(&data, eol);

    let mut labels = Vec::new();
    if config.options.mailbox_names_as_labels {
        labels.push(mailbox_name.clone());
    }
    if let Some(label) = &config.options.additional_label {
        labels.push(label.clone());
    }

    let mut properties = Vec::new();
    if config.options.put_all_mail_in_inbox {
        properties.push(MailProperty::IsInbox);
    }
    if config.options.preserve_mail_properties && seen == Some(false) {
        properties.push(MailProperty::IsUnread);
    }

    UploadCandidate {
        mailbox_name,
        labels,
        properties,
        rfc822: data,
        message_id,
        provenance: Provenance {
            path,
            byte_range,
            index,
        },
    }
}
