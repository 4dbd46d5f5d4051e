use std::time::Duration;

use crate::{Mode, SkippedMessage};

/// The message that informs of the scanning and uploading progress.
#[derive(Debug)]
pub enum Message {
    /// How many mailboxes a source expects to scan - if it is known.
    ScanTotal(usize),
    /// Whenever a mailbox out of the total has been scanned,
    /// this message will be emitted.
    ScanOne,
    /// The number of selected messages at the start of an upload run.
    /// This is the denominator for progress reporting.
    SelectedTotal(usize),
    /// One message was uploaded.
    UploadedOne,
    /// One message was skipped. The record carries the reason and
    /// provenance and also ends up in the final report.
    SkippedOne(SkippedMessage),
    /// The rate limiter switched modes. Only ever fast to slow.
    ModeChanged(Mode),
    /// The server told us to back off; the next retry of the affected
    /// candidate is this far away.
    BackingOff(Duration),
    /// The user paused or resumed the run.
    Paused(bool),
    /// All sources are exhausted, waiting for in-flight tickets.
    FinishingUp,
    /// Finally, this indicates that we're done.
    Done,
    /// An error happened during processing.
    Error(eyre::Report),
}

pub type StatusSender = crossbeam_channel::Sender<Message>;
pub type StatusReceiver = crossbeam_channel::Receiver<Message>;
