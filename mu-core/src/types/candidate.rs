use strum_macros::IntoStaticStr;

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

/// Extension properties the remote service understands. These mirror the
/// mail-item property vocabulary of the hosted mailbox API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
pub enum MailProperty {
    #[strum(serialize = "IS_DRAFT")]
    IsDraft,
    #[strum(serialize = "IS_INBOX")]
    IsInbox,
    #[strum(serialize = "IS_STARRED")]
    IsStarred,
    #[strum(serialize = "IS_SENT")]
    IsSent,
    #[strum(serialize = "IS_TRASH")]
    IsTrash,
    #[strum(serialize = "IS_UNREAD")]
    IsUnread,
}

/// Where a candidate came from, for diagnostics. For mbox sources the byte
/// range within the file is known, for one-file-per-message sources only
/// the path and index are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    /// Full path of the file the message was read from.
    pub path: PathBuf,
    /// Byte range of the message within `path`, if it shares the file with
    /// other messages.
    pub byte_range: Option<Range<u64>>,
    /// 0-based index of the message within its outline item.
    pub index: usize,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.byte_range {
            Some(range) => write!(
                f,
                "{} [{}..{}]",
                self.path.display(),
                range.start,
                range.end
            ),
            None => write!(f, "{} [#{}]", self.path.display(), self.index),
        }
    }
}

/// A fully prepared, not-yet-submitted message, ready for the upload
/// transport. Produced by a `MailSource`, consumed by the coordinator.
#[derive(Debug, Clone)]
pub struct UploadCandidate {
    /// Name of the mailbox the message came out of.
    pub mailbox_name: String,
    /// Labels to attach to the uploaded record.
    pub labels: Vec<String>,
    /// Extension properties to attach to the uploaded record.
    pub properties: Vec<MailProperty>,
    /// The raw RFC822 bytes of the message.
    pub rfc822: Vec<u8>,
    /// The Message-ID header value, if the message has one. Used for
    /// duplicate detection.
    pub message_id: Option<String>,
    /// Where the message came from.
    pub provenance: Provenance,
}
