//! The per-run session state of the coordinator: mode, backoff, retry
//! queue, duplicate index and counters.
//!
//! Everything here is synchronous and driven by explicit `Instant`s so
//! the whole rate/backoff machine can be unit-tested without sleeping.
//! The event loop in [`crate::coordinator`] is a thin shell around it;
//! all mutation happens from that single thread.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use mu_core::{Limits, Mode, SkipReason, SkippedMessage, UploadCandidate, UploadOutcome};

/// A candidate waiting for resubmission after a backoff delay.
#[derive(Debug)]
pub(crate) struct RetryEntry {
    pub candidate: UploadCandidate,
    pub not_before: Instant,
    /// How often this candidate has been attempted so far.
    pub attempts: u32,
}

/// Whether a new ticket may be issued right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Gate {
    Ready,
    /// The mode's concurrency ceiling is reached; wait for an outcome.
    AtCeiling,
    /// The minimum inter-issue interval has not elapsed yet.
    NotBefore(Instant),
}

/// What processing one outcome amounted to, for status reporting.
#[derive(Debug)]
pub(crate) enum OutcomeEvent {
    Uploaded { mode_changed: bool },
    Skipped(SkippedMessage),
    Retry { delay: Duration, mode_changed: bool },
}

pub(crate) struct Session {
    limits: Limits,
    mode: Mode,
    /// Count of consecutive back-pressure signals; 0 means no active
    /// backoff.
    backoff_level: u32,
    retry: VecDeque<RetryEntry>,
    /// Message-ID of every message uploaded in this session, mapped to
    /// the file it came from.
    uploaded_ids: HashMap<String, PathBuf>,
    uploaded: usize,
    skipped: Vec<SkippedMessage>,
    outstanding: usize,
    last_issue: Option<Instant>,
}

impl Session {
    pub fn new(limits: Limits) -> Self {
        Session {
            limits,
            mode: Mode::Fast,
            backoff_level: 0,
            retry: VecDeque::new(),
            uploaded_ids: HashMap::new(),
            uploaded: 0,
            skipped: Vec::new(),
            outstanding: 0,
            last_issue: None,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn uploaded_count(&self) -> usize {
        self.uploaded
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn retry_is_empty(&self) -> bool {
        self.retry.is_empty()
    }

    /// The release time of the retry-queue head, if any.
    pub fn retry_deadline(&self) -> Option<Instant> {
        self.retry.front().map(|entry| entry.not_before)
    }

    pub fn issue_gate(&self, now: Instant) -> Gate {
        if self.outstanding >= self.mode.max_tickets(&self.limits) {
            return Gate::AtCeiling;
        }
        match self.last_issue {
            Some(last) => {
                let earliest = last + self.mode.interval(&self.limits);
                if now < earliest {
                    Gate::NotBefore(earliest)
                } else {
                    Gate::Ready
                }
            }
            None => Gate::Ready,
        }
    }

    /// Pop the retry-queue head if its backoff deadline has passed. Later
    /// entries are never taken out of order.
    pub fn pop_due_retry(&mut self, now: Instant) -> Option<RetryEntry> {
        match self.retry.front() {
            Some(head) if head.not_before <= now => self.retry.pop_front(),
            _ => None,
        }
    }

    /// A ticket was issued for one candidate.
    pub fn note_issued(&mut self, now: Instant) {
        self.outstanding += 1;
        self.last_issue = Some(now);
    }

    /// Local-first duplicate detection: if the candidate's Message-ID was
    /// already uploaded in this session, record the skip and return it
    /// without ever contacting the remote.
    pub fn local_duplicate(&mut self, candidate: &UploadCandidate) -> Option<SkippedMessage> {
        let id = candidate.message_id.as_ref()?;
        let prior = self.uploaded_ids.get(id)?;
        let record = SkippedMessage::for_candidate(
            candidate,
            SkipReason::Duplicate,
            format!("Already uploaded from {}", prior.display()),
        );
        Some(self.skip(record))
    }

    /// Record one skipped message and hand back the record for reporting.
    pub fn skip(&mut self, record: SkippedMessage) -> SkippedMessage {
        self.skipped.push(record.clone());
        record
    }

    /// Classify the outcome of one finished ticket. The cursor consumed
    /// the candidate at issuance, so only retryable outcomes see it again
    /// (through the retry queue).
    pub fn handle_outcome(
        &mut self,
        candidate: UploadCandidate,
        attempts: u32,
        outcome: UploadOutcome,
        now: Instant,
    ) -> OutcomeEvent {
        self.outstanding -= 1;
        match outcome {
            UploadOutcome::Success => {
                self.uploaded += 1;
                self.backoff_level = 0;
                if let Some(id) = &candidate.message_id {
                    self.uploaded_ids
                        .insert(id.clone(), candidate.provenance.path.clone());
                }
                let mode_changed = self.mode == Mode::Fast
                    && self.uploaded >= self.limits.fast_mode_max_messages;
                if mode_changed {
                    self.mode = Mode::Slow;
                }
                OutcomeEvent::Uploaded { mode_changed }
            }
            UploadOutcome::Duplicate => {
                let record = SkippedMessage::for_candidate(
                    &candidate,
                    SkipReason::Duplicate,
                    "Server reported a duplicate",
                );
                OutcomeEvent::Skipped(self.skip(record))
            }
            UploadOutcome::Backpressure(status) => {
                // Not a failure. Escalate the mode, schedule the retry.
                let mode_changed = self.mode == Mode::Fast;
                self.mode = Mode::Slow;
                self.backoff_level += 1;
                let delay = self.limits.backoff_delay(self.backoff_level);
                mu_core::tracing::info!(
                    "Server status {}: backing off for {:?} (level {})",
                    status,
                    delay,
                    self.backoff_level
                );
                self.retry.push_back(RetryEntry {
                    candidate,
                    not_before: now + delay,
                    attempts,
                });
                OutcomeEvent::Retry {
                    delay,
                    mode_changed,
                }
            }
            UploadOutcome::TransientFailure(error) => {
                // Retried like back-pressure, but without escalating the
                // mode, and only a bounded number of times.
                if attempts >= self.limits.max_attempts {
                    let record = SkippedMessage::for_candidate(
                        &candidate,
                        SkipReason::Server,
                        format!("Giving up after {} attempts: {}", attempts, error),
                    );
                    OutcomeEvent::Skipped(self.skip(record))
                } else {
                    let delay = self.limits.backoff_delay(attempts);
                    self.retry.push_back(RetryEntry {
                        candidate,
                        not_before: now + delay,
                        attempts: attempts + 1,
                    });
                    OutcomeEvent::Retry {
                        delay,
                        mode_changed: false,
                    }
                }
            }
            UploadOutcome::PermanentFailure(reason) => {
                let record =
                    SkippedMessage::for_candidate(&candidate, SkipReason::Server, reason);
                OutcomeEvent::Skipped(self.skip(record))
            }
        }
    }

    pub fn into_skipped(self) -> Vec<SkippedMessage> {
        self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mu_core::Provenance;
    use std::path::PathBuf;

    fn candidate(id: &str) -> UploadCandidate {
        UploadCandidate {
            mailbox_name: "Inbox".into(),
            labels: vec!["Inbox".into()],
            properties: Vec::new(),
            rfc822: b"From: a@b\r\n\r\nHello\r\n".to_vec(),
            message_id: Some(format!("<{}@example.com>", id)),
            provenance: Provenance {
                path: PathBuf::from("/mail/Inbox.mbox"),
                byte_range: None,
                index: 0,
            },
        }
    }

    fn issue(session: &mut Session, now: Instant) {
        session.note_issued(now);
    }

    #[test]
    fn test_mode_switches_after_fast_quota() {
        let mut session = Session::new(Limits::default());
        let now = Instant::now();
        for index in 0..500 {
            issue(&mut session, now);
            let event = session.handle_outcome(
                candidate(&format!("m{}", index)),
                1,
                UploadOutcome::Success,
                now,
            );
            let mode_changed = matches!(event, OutcomeEvent::Uploaded { mode_changed: true });
            assert_eq!(mode_changed, index == 499, "switch exactly at 500");
        }
        assert_eq!(session.mode(), Mode::Slow);
        // The mode never reverts, even after further successes.
        issue(&mut session, now);
        session.handle_outcome(candidate("x"), 1, UploadOutcome::Success, now);
        assert_eq!(session.mode(), Mode::Slow);
    }

    #[test]
    fn test_backpressure_ladder_and_mode() {
        let limits = Limits::default();
        let mut session = Session::new(limits.clone());
        let now = Instant::now();
        let expected = [15u64, 30, 60, 120, 120, 120];
        for (index, seconds) in expected.iter().enumerate() {
            issue(&mut session, now);
            let event = session.handle_outcome(
                candidate(&format!("bp{}", index)),
                1,
                UploadOutcome::Backpressure(503),
                now,
            );
            match event {
                OutcomeEvent::Retry {
                    delay,
                    mode_changed,
                } => {
                    assert_eq!(delay, Duration::from_secs(*seconds));
                    assert_eq!(mode_changed, index == 0, "only the first switches");
                }
                other => panic!("expected retry, got {:?}", other),
            }
        }
        assert_eq!(session.mode(), Mode::Slow);
        // Each entry's release time honors its delay.
        assert_eq!(session.retry_deadline(), Some(now + Duration::from_secs(15)));
        assert!(session.pop_due_retry(now).is_none());
        assert!(session
            .pop_due_retry(now + Duration::from_secs(15))
            .is_some());
    }

    #[test]
    fn test_success_resets_backoff_level() {
        let mut session = Session::new(Limits::default());
        let now = Instant::now();
        issue(&mut session, now);
        session.handle_outcome(candidate("a"), 1, UploadOutcome::Backpressure(503), now);
        issue(&mut session, now);
        session.handle_outcome(candidate("b"), 1, UploadOutcome::Success, now);
        // The next back-pressure starts over at the bottom of the ladder.
        issue(&mut session, now);
        match session.handle_outcome(candidate("c"), 1, UploadOutcome::Backpressure(503), now) {
            OutcomeEvent::Retry { delay, .. } => assert_eq!(delay, Duration::from_secs(15)),
            other => panic!("expected retry, got {:?}", other),
        }
    }

    #[test]
    fn test_local_duplicate_detection() {
        let mut session = Session::new(Limits::default());
        let now = Instant::now();
        issue(&mut session, now);
        session.handle_outcome(candidate("same"), 1, UploadOutcome::Success, now);

        let skip = session.local_duplicate(&candidate("same")).expect("duplicate");
        assert_eq!(skip.reason, SkipReason::Duplicate);
        assert_eq!(session.skipped_count(), 1);
        // A fresh id passes.
        assert!(session.local_duplicate(&candidate("other")).is_none());
    }

    #[test]
    fn test_transient_failures_are_bounded() {
        let limits = Limits::default();
        let mut session = Session::new(limits);
        let now = Instant::now();

        issue(&mut session, now);
        let first = session.handle_outcome(
            candidate("t"),
            1,
            UploadOutcome::TransientFailure("reset".into()),
            now,
        );
        assert!(matches!(first, OutcomeEvent::Retry { mode_changed: false, .. }));
        assert_eq!(session.mode(), Mode::Fast, "no mode escalation");

        let entry = session
            .pop_due_retry(now + Duration::from_secs(15))
            .expect("due");
        assert_eq!(entry.attempts, 2);

        issue(&mut session, now);
        session.handle_outcome(
            entry.candidate,
            entry.attempts,
            UploadOutcome::TransientFailure("reset".into()),
            now,
        );
        let entry = session
            .pop_due_retry(now + Duration::from_secs(60))
            .expect("due");
        assert_eq!(entry.attempts, 3);

        issue(&mut session, now);
        let last = session.handle_outcome(
            entry.candidate,
            entry.attempts,
            UploadOutcome::TransientFailure("reset".into()),
            now,
        );
        match last {
            OutcomeEvent::Skipped(record) => assert_eq!(record.reason, SkipReason::Server),
            other => panic!("expected skip, got {:?}", other),
        }
        assert!(session.retry_is_empty());
    }

    #[test]
    fn test_issue_gate_paces_and_limits() {
        let limits = Limits::default();
        let mut session = Session::new(limits.clone());
        let start = Instant::now();

        assert_eq!(session.issue_gate(start), Gate::Ready);
        session.note_issued(start);
        // Too soon for the next ticket.
        assert_eq!(
            session.issue_gate(start),
            Gate::NotBefore(start + limits.fast_interval)
        );
        assert_eq!(
            session.issue_gate(start + limits.fast_interval),
            Gate::Ready
        );

        // Fill up to the fast-mode ceiling.
        let mut now = start;
        for _ in 1..limits.fast_max_tickets {
            now += limits.fast_interval;
            session.note_issued(now);
        }
        assert_eq!(
            session.issue_gate(now + limits.fast_interval),
            Gate::AtCeiling
        );
    }
}
