//! The upload coordinator: a single event-loop thread that owns all
//! session state and feeds candidate messages to worker threads, one
//! ticket each.
//!
//! Issuance pulls candidates strictly through the sources' traversal
//! contract, preferring the retry-queue head once its backoff deadline
//! has passed. Outcomes come back over one channel, so counters, the
//! duplicate index and the retry queue are only ever touched from this
//! thread. Pause and stop are cooperative signals, checked at the next
//! issuance opportunity; in-flight tickets always run to completion and
//! their outcomes are still processed.

use mu_core::crossbeam_channel::{unbounded, Receiver, Sender};
use mu_core::eyre::{eyre, Result};
use mu_core::tracing::{debug, trace};
use mu_core::{
    crossbeam_channel, Fetched, Limits, MailSource, Message, Mode, SkippedMessage, StatusReceiver,
    StatusSender, UploadCandidate, UploadOutcome, Uploaderlike,
};

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::session::{Gate, OutcomeEvent, Session};

/// Upper bound for idle waits; channel traffic wakes the loop earlier.
const IDLE_WAIT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy)]
pub enum Control {
    Pause,
    Resume,
    Stop,
}

/// What one finished run amounted to.
#[derive(Debug)]
pub struct UploadReport {
    /// Messages selected at the start of the run.
    pub selected: usize,
    pub uploaded: usize,
    pub skipped: Vec<SkippedMessage>,
    /// True if the run ended through `stop` rather than exhaustion.
    pub stopped: bool,
}

/// One finished ticket, reported back by a worker thread.
struct TicketDone {
    candidate: UploadCandidate,
    attempts: u32,
    outcome: UploadOutcome,
}

/// Handle to a running upload, for the pause / stop buttons and the
/// status display.
pub struct UploadHandle {
    control: Sender<Control>,
    status: StatusReceiver,
}

impl UploadHandle {
    pub fn pause(&self) {
        self.control.send(Control::Pause).ok();
    }

    pub fn resume(&self) {
        self.control.send(Control::Resume).ok();
    }

    pub fn stop(&self) {
        self.control.send(Control::Stop).ok();
    }

    pub fn status(&self) -> &StatusReceiver {
        &self.status
    }
}

pub struct Coordinator {
    sources: Vec<Box<dyn MailSource>>,
    transport: Arc<dyn Uploaderlike>,
    limits: Limits,
}

impl Coordinator {
    pub fn new(sources: Vec<Box<dyn MailSource>>, transport: Arc<dyn Uploaderlike>) -> Self {
        Self::with_limits(sources, transport, Limits::default())
    }

    pub fn with_limits(
        sources: Vec<Box<dyn MailSource>>,
        transport: Arc<dyn Uploaderlike>,
        limits: Limits,
    ) -> Self {
        Coordinator {
            sources,
            transport,
            limits,
        }
    }

    /// Spawn the coordinating thread. Returns the control/status handle
    /// and the join handle carrying the final report.
    pub fn start(self) -> (UploadHandle, JoinHandle<Result<UploadReport>>) {
        let (control_sender, control_receiver) = unbounded();
        let (status_sender, status_receiver) = unbounded();
        let handle = std::thread::spawn(move || run(self, control_receiver, status_sender));
        (
            UploadHandle {
                control: control_sender,
                status: status_receiver,
            },
            handle,
        )
    }
}

/// What the issuance pass decided to do next.
enum Step {
    /// Nothing issuable right now; wait this long (or until a channel
    /// message arrives).
    Wait(Duration),
    /// Every source is exhausted, the retry queue is empty and no ticket
    /// is outstanding.
    Done,
}

struct Run {
    sources: Vec<Box<dyn MailSource>>,
    transport: Arc<dyn Uploaderlike>,
    session: Session,
    status: StatusSender,
    outcome_sender: Sender<TicketDone>,
    /// Index of the source currently being drained; monotonic.
    current_source: usize,
    paused: bool,
    stopped: bool,
    finishing_sent: bool,
}

fn run(
    coordinator: Coordinator,
    control: Receiver<Control>,
    status: StatusSender,
) -> Result<UploadReport> {
    let Coordinator {
        mut sources,
        transport,
        limits,
    } = coordinator;

    for source in sources.iter_mut() {
        source.reset_upload();
    }
    let selected: usize = sources
        .iter()
        .map(|source| source.count_selected_messages())
        .sum();
    status.send(Message::SelectedTotal(selected)).ok();

    let (outcome_sender, outcome_receiver) = unbounded();
    let mut run = Run {
        sources,
        transport,
        session: Session::new(limits),
        status,
        outcome_sender,
        current_source: 0,
        paused: false,
        stopped: false,
        finishing_sent: false,
    };

    loop {
        // Batch up whatever already arrived before deciding anything.
        while let Ok(message) = control.try_recv() {
            run.apply_control(message);
        }
        while let Ok(done) = outcome_receiver.try_recv() {
            run.process_outcome(done);
        }

        match run.step()? {
            Step::Done => break,
            Step::Wait(wait) => {
                crossbeam_channel::select! {
                    recv(control) -> message => {
                        match message {
                            Ok(message) => run.apply_control(message),
                            // All handles dropped; nobody can stop us
                            // anymore, keep going until exhaustion.
                            Err(_) => {}
                        }
                    }
                    recv(outcome_receiver) -> done => {
                        if let Ok(done) = done {
                            run.process_outcome(done);
                        }
                    }
                    default(wait) => {}
                }
            }
        }
    }

    run.status.send(Message::Done).ok();
    let Run {
        session, stopped, ..
    } = run;
    Ok(UploadReport {
        selected,
        uploaded: session.uploaded_count(),
        skipped: session.into_skipped(),
        stopped,
    })
}

impl Run {
    fn apply_control(&mut self, message: Control) {
        match message {
            Control::Pause => {
                if !self.paused && !self.stopped {
                    self.paused = true;
                    self.status.send(Message::Paused(true)).ok();
                }
            }
            Control::Resume => {
                if self.paused {
                    self.paused = false;
                    self.status.send(Message::Paused(false)).ok();
                }
            }
            Control::Stop => {
                self.stopped = true;
            }
        }
    }

    /// Issue as many tickets as mode, pacing and candidate supply allow,
    /// then report how long to wait for the next opportunity.
    fn step(&mut self) -> Result<Step> {
        if self.stopped {
            // Let in-flight tickets finish, no new issuance. Terminal.
            return Ok(if self.session.outstanding() == 0 {
                Step::Done
            } else {
                Step::Wait(IDLE_WAIT)
            });
        }
        if self.paused {
            return Ok(Step::Wait(IDLE_WAIT));
        }

        loop {
            let now = Instant::now();
            match self.session.issue_gate(now) {
                Gate::AtCeiling => return Ok(Step::Wait(IDLE_WAIT)),
                Gate::NotBefore(earliest) => {
                    return Ok(Step::Wait(earliest.saturating_duration_since(now)))
                }
                Gate::Ready => {}
            }

            if let Some(entry) = self.session.pop_due_retry(now) {
                trace!("Reissuing {} (attempt {})", entry.candidate.provenance, entry.attempts);
                self.issue(entry.candidate, entry.attempts, now);
                continue;
            }

            if self.current_source < self.sources.len() {
                if let Some(candidate) = self.pull_fresh()? {
                    self.issue(candidate, 1, now);
                }
                // A fresh candidate was issued, or the sources just ran
                // dry; either way, decide again.
                continue;
            }

            // All sources exhausted; only retries and in-flight tickets
            // remain.
            if self.session.retry_is_empty() && self.session.outstanding() == 0 {
                return Ok(Step::Done);
            }
            if !self.finishing_sent && self.session.retry_is_empty() {
                self.status.send(Message::FinishingUp).ok();
                self.finishing_sent = true;
            }
            let wait = match self.session.retry_deadline() {
                Some(deadline) => deadline.saturating_duration_since(now).min(IDLE_WAIT),
                None => IDLE_WAIT,
            };
            return Ok(Step::Wait(wait));
        }
    }

    /// Pull the next fresh candidate from the current source, advancing
    /// to the next source on exhaustion. Locally classified skips
    /// (extraction failures, known duplicates) are recorded on the way
    /// and never issued.
    fn pull_fresh(&mut self) -> Result<Option<UploadCandidate>> {
        while self.current_source < self.sources.len() {
            let source = &mut self.sources[self.current_source];
            match source.next_upload_candidate() {
                Ok(Fetched::Candidate(candidate)) => {
                    if let Some(record) = self.session.local_duplicate(&candidate) {
                        self.status.send(Message::SkippedOne(record)).ok();
                        continue;
                    }
                    return Ok(Some(*candidate));
                }
                Ok(Fetched::Failed(record)) => {
                    let record = self.session.skip(record);
                    self.status.send(Message::SkippedOne(record)).ok();
                }
                Ok(Fetched::Exhausted) => {
                    debug!("Source {} exhausted", source.root_name());
                    self.current_source += 1;
                }
                Err(error) => {
                    // The whole root is in trouble; report and move on to
                    // the next one.
                    self.status
                        .send(Message::Error(eyre!(
                            "Source {} failed: {:?}",
                            source.root_name(),
                            error
                        )))
                        .ok();
                    self.current_source += 1;
                }
            }
        }
        Ok(None)
    }

    fn issue(&mut self, candidate: UploadCandidate, attempts: u32, now: Instant) {
        self.session.note_issued(now);
        let transport = Arc::clone(&self.transport);
        let sender = self.outcome_sender.clone();
        std::thread::spawn(move || {
            let outcome = transport.upload(&candidate);
            sender
                .send(TicketDone {
                    candidate,
                    attempts,
                    outcome,
                })
                .ok();
        });
    }

    fn process_outcome(&mut self, done: TicketDone) {
        let TicketDone {
            candidate,
            attempts,
            outcome,
        } = done;
        let event = self
            .session
            .handle_outcome(candidate, attempts, outcome, Instant::now());
        match event {
            OutcomeEvent::Uploaded { mode_changed } => {
                self.status.send(Message::UploadedOne).ok();
                if mode_changed {
                    self.status.send(Message::ModeChanged(Mode::Slow)).ok();
                }
            }
            OutcomeEvent::Skipped(record) => {
                self.status.send(Message::SkippedOne(record)).ok();
            }
            OutcomeEvent::Retry {
                delay,
                mode_changed,
            } => {
                if mode_changed {
                    self.status.send(Message::ModeChanged(Mode::Slow)).ok();
                }
                self.status.send(Message::BackingOff(delay)).ok();
            }
        }
    }
}
