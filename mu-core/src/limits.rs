use std::time::Duration;

/// No messages over 31 megs, per the remote API.
pub const MAX_MESSAGE_SIZE: u64 = 1024 * 1024 * 31;

/// The two operating points of the rate limiter.
///
/// Uploading starts in fast mode and switches to slow mode after
/// [`Limits::fast_mode_max_messages`] uploads, or as soon as the server
/// signals back-pressure. The mode never switches back to fast within a
/// session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Up to 10 tickets pending at a time, roughly 5 per second.
    Fast,
    /// One ticket pending at a time, limited to 1 per second.
    Slow,
}

impl Mode {
    pub fn max_tickets(&self, limits: &Limits) -> usize {
        match self {
            Mode::Fast => limits.fast_max_tickets,
            Mode::Slow => limits.slow_max_tickets,
        }
    }

    pub fn interval(&self, limits: &Limits) -> Duration {
        match self {
            Mode::Fast => limits.fast_interval,
            Mode::Slow => limits.slow_interval,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Slow => "slow",
        }
    }
}

/// All rate-shaping constants in one place, owned by the coordinator
/// instance so that multiple sessions (e.g. in tests) do not interfere.
#[derive(Debug, Clone)]
pub struct Limits {
    pub fast_max_tickets: usize,
    pub fast_interval: Duration,
    pub slow_max_tickets: usize,
    pub slow_interval: Duration,
    /// We can upload up to this many messages in fast mode.
    pub fast_mode_max_messages: usize,
    /// Back-pressure responses cause us to back off for (15, 30, 60, 120)
    /// seconds, indexed by the backoff level and clamped at the last entry.
    pub backoff_schedule: [Duration; 4],
    /// Transient transport failures are retried this often before the
    /// candidate is skipped for good.
    pub max_attempts: u32,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            fast_max_tickets: 10,
            fast_interval: Duration::from_millis(200),
            slow_max_tickets: 1,
            slow_interval: Duration::from_secs(1),
            fast_mode_max_messages: 500,
            backoff_schedule: [
                Duration::from_secs(15),
                Duration::from_secs(30),
                Duration::from_secs(60),
                Duration::from_secs(120),
            ],
            max_attempts: 3,
        }
    }
}

impl Limits {
    /// The retry delay for the given backoff level (1-based, a level of 0
    /// means no active backoff and is never asked for a delay).
    pub fn backoff_delay(&self, level: u32) -> Duration {
        let index = (level.saturating_sub(1) as usize).min(self.backoff_schedule.len() - 1);
        self.backoff_schedule[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule_clamps() {
        let limits = Limits::default();
        assert_eq!(limits.backoff_delay(1), Duration::from_secs(15));
        assert_eq!(limits.backoff_delay(2), Duration::from_secs(30));
        assert_eq!(limits.backoff_delay(3), Duration::from_secs(60));
        assert_eq!(limits.backoff_delay(4), Duration::from_secs(120));
        assert_eq!(limits.backoff_delay(17), Duration::from_secs(120));
    }
}
