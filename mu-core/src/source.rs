use eyre::Result;

use std::path::Path;

use crate::model::OutlineTree;
use crate::{SkippedMessage, UploadCandidate};

/// One pull on a source's upload cursor.
#[derive(Debug)]
pub enum Fetched {
    /// The next selected, not-yet-attempted message, prepared for upload.
    Candidate(Box<UploadCandidate>),
    /// A message that could not be prepared (unreadable, oversize). The
    /// cursor has advanced past it; the record goes into the report.
    Failed(SkippedMessage),
    /// The chain and all per-item message indices are consumed.
    Exhausted,
}

/// The capability set of one imported mailbox root. The coordinator only
/// ever talks to this trait, never to a concrete source format.
pub trait MailSource: Send {
    /// The outline tree of this root.
    fn tree(&self) -> &OutlineTree;

    /// Mutable access to the tree, for selection changes.
    fn tree_mut(&mut self) -> &mut OutlineTree;

    /// The folder this root was imported from.
    fn folder_path(&self) -> &Path;

    /// The display name of this root.
    fn root_name(&self) -> &str;

    /// Sum of checked messages under this root; the contribution of this
    /// source to the progress denominator.
    fn count_selected_messages(&self) -> usize;

    /// Rewind the upload cursor to the beginning of the chain. Does not
    /// alter the selection.
    fn reset_upload(&mut self);

    /// Advance the cursor along the message-bearing chain, skipping
    /// unselected items, and extract the next candidate. Resumable: the
    /// next call continues right after the returned candidate.
    fn next_upload_candidate(&mut self) -> Result<Fetched>;
}
