//! A transport that fabricates outcomes, so the whole pipeline can run
//! end to end without a server. Tests script it; the CLI uses it for dry
//! runs.

use mu_core::rand::{self, Rng};
use mu_core::{UploadCandidate, UploadOutcome, Uploaderlike};

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

pub struct SimulatedUploader {
    /// Outcomes handed out in order; once drained every upload succeeds.
    script: Mutex<VecDeque<UploadOutcome>>,
    latency: Duration,
    /// Chance of a fabricated transient failure, 0.0..1.0.
    failure_rate: f64,
}

impl SimulatedUploader {
    pub fn new() -> Self {
        SimulatedUploader {
            script: Mutex::new(VecDeque::new()),
            latency: Duration::from_millis(0),
            failure_rate: 0.0,
        }
    }

    pub fn with_script(outcomes: Vec<UploadOutcome>) -> Self {
        let mut uploader = Self::new();
        uploader.script = Mutex::new(outcomes.into());
        uploader
    }

    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failure_rate(mut self, rate: f64) -> Self {
        self.failure_rate = rate;
        self
    }
}

impl Default for SimulatedUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl Uploaderlike for SimulatedUploader {
    fn upload(&self, _candidate: &UploadCandidate) -> UploadOutcome {
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if let Ok(mut script) = self.script.lock() {
            if let Some(next) = script.pop_front() {
                return next;
            }
        }
        if self.failure_rate > 0.0 && rand::thread_rng().gen_bool(self.failure_rate) {
            return UploadOutcome::TransientFailure("Simulated transport failure".into());
        }
        UploadOutcome::Success
    }
}
