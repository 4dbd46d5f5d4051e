use serde::Serialize;
use strum_macros::IntoStaticStr;

use std::fmt;
use std::ops::Range;
use std::path::PathBuf;

use super::{Provenance, UploadCandidate};

/// Why a message was skipped. This is the error-type vocabulary of the
/// skipped-messages report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SkipReason {
    /// A message with the same Message-ID was already uploaded, or the
    /// server reported a conflict.
    #[strum(serialize = "duplicate")]
    Duplicate,
    /// The server rejected the message definitively.
    #[strum(serialize = "server")]
    Server,
    /// The message could not be read or prepared locally: unreadable file,
    /// unresolvable locator, or over the size limit.
    #[strum(serialize = "parsing")]
    Parsing,
}

/// One record of the diagnostics report: a message that was skipped,
/// together with enough provenance to find it again.
#[derive(Debug, Clone, Serialize)]
pub struct SkippedMessage {
    pub path: PathBuf,
    pub byte_range: Option<Range<u64>>,
    /// 0-based index of the message within its file or mailbox.
    pub index: usize,
    pub message_id: Option<String>,
    pub reason: SkipReason,
    pub error: String,
}

impl SkippedMessage {
    /// A skip record for a candidate that was already extracted.
    pub fn for_candidate(
        candidate: &UploadCandidate,
        reason: SkipReason,
        error: impl Into<String>,
    ) -> Self {
        let Provenance {
            path,
            byte_range,
            index,
        } = candidate.provenance.clone();
        SkippedMessage {
            path,
            byte_range,
            index,
            message_id: candidate.message_id.clone(),
            reason,
            error: error.into(),
        }
    }
}

impl fmt::Display for SkippedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason: &'static str = (&self.reason).into();
        write!(f, "{} #{}: [{}] {}", self.path.display(), self.index, reason, self.error)
    }
}
