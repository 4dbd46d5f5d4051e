use crate::UploadCandidate;

/// Everything the remote upload operation can come back with. The
/// coordinator treats the transport purely as this vocabulary; transport
/// detail stays behind the trait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The message was accepted.
    Success,
    /// The server reported a conflict with an already-uploaded message.
    Duplicate,
    /// The server asked us to slow down (e.g. a 503 / too-many-requests
    /// status). Not a failure; the candidate is retried after a backoff
    /// delay and the session switches to slow mode.
    Backpressure(u16),
    /// The server rejected the message definitively.
    PermanentFailure(String),
    /// The request did not reach a definitive answer (connection reset,
    /// timeout). Retried a bounded number of times.
    TransientFailure(String),
}

/// The upload transport. One call per ticket; implementations are free to
/// block, the coordinator runs each call on its own worker thread.
pub trait Uploaderlike: Send + Sync {
    fn upload(&self, candidate: &UploadCandidate) -> UploadOutcome;
}
