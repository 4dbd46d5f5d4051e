//! Tallies the coordinator's status messages into a thread-safe
//! structure that a UI (or the CLI) can poll at its own pace.

use mu_core::eyre::{bail, eyre, Report, Result};
use mu_core::{Message, Mode, StatusReceiver};

use std::collections::VecDeque;
use std::sync::{Arc, RwLock};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// How many recent upload completions feed the rate estimate.
const RATE_WINDOW: usize = 50;

#[derive(Debug)]
struct Data {
    scan_total: usize,
    scanned: usize,
    selected: usize,
    uploaded: usize,
    skipped: usize,
    mode: Mode,
    backing_off: Option<Duration>,
    paused: bool,
    finishing: bool,
    done: bool,
    error: Option<Report>,
    recent: VecDeque<Instant>,
}

impl Default for Data {
    fn default() -> Self {
        Data {
            scan_total: 0,
            scanned: 0,
            selected: 0,
            uploaded: 0,
            skipped: 0,
            mode: Mode::Fast,
            backing_off: None,
            paused: false,
            finishing: false,
            done: false,
            error: None,
            recent: VecDeque::new(),
        }
    }
}

#[derive(Clone, Debug, Copy)]
pub struct Progress {
    pub total: usize,
    pub count: usize,
}

/// A point-in-time snapshot for the progress sink. The time estimate is
/// best-effort: observed rate over a recent window times the remaining
/// count, with no correctness obligation.
#[derive(Clone, Debug, Copy)]
pub struct State {
    pub uploaded: usize,
    pub skipped: usize,
    pub mode: Mode,
    pub paused: bool,
    pub backing_off: Option<Duration>,
    pub finishing: bool,
    pub done: bool,
    pub estimated_seconds_remaining: Option<u64>,
}

/// This can be initialized with a [`StatusReceiver`] and it will
/// automatically tally up the messages into a thread-safe datastructure.
pub struct Adapter {
    producer_lock: Arc<RwLock<Data>>,
    consumer_lock: Arc<RwLock<Data>>,
}

impl Adapter {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let rw_lock = Arc::new(RwLock::default());
        let producer_lock = Arc::clone(&rw_lock);
        let consumer_lock = rw_lock;
        Self {
            producer_lock,
            consumer_lock,
        }
    }

    /// Starts up a thread that tallies the receiver's messages into state
    /// that can be accessed via [`scan_count`], [`upload_count`] and
    /// [`state`]. Returns once `Done` was received or the sending side
    /// went away.
    pub fn process(&self, receiver: StatusReceiver) -> JoinHandle<Result<()>> {
        let lock = Arc::clone(&self.producer_lock);
        std::thread::spawn(move || {
            for message in receiver.iter() {
                let mut write_guard = match lock.write() {
                    Ok(guard) => guard,
                    Err(e) => bail!("RwLock Error: {:?}", e),
                };
                match message {
                    Message::ScanTotal(total) => write_guard.scan_total = total,
                    Message::ScanOne => {
                        write_guard.scanned += 1;
                        // Totals can lag behind on some sources; never
                        // report more than everything.
                        if write_guard.scan_total <= write_guard.scanned {
                            write_guard.scan_total = write_guard.scanned;
                        }
                    }
                    Message::SelectedTotal(total) => write_guard.selected = total,
                    Message::UploadedOne => {
                        write_guard.uploaded += 1;
                        write_guard.backing_off = None;
                        write_guard.recent.push_back(Instant::now());
                        if write_guard.recent.len() > RATE_WINDOW {
                            write_guard.recent.pop_front();
                        }
                    }
                    Message::SkippedOne(_) => write_guard.skipped += 1,
                    Message::ModeChanged(mode) => write_guard.mode = mode,
                    Message::BackingOff(delay) => write_guard.backing_off = Some(delay),
                    Message::Paused(paused) => write_guard.paused = paused,
                    Message::FinishingUp => write_guard.finishing = true,
                    Message::Done => {
                        write_guard.done = true;
                        break;
                    }
                    Message::Error(e) => write_guard.error = Some(e),
                }
            }
            Ok(())
        })
    }

    pub fn scan_count(&self) -> Result<Progress> {
        let item = self.consumer_lock.read().map_err(|e| eyre!("{:?}", &e))?;
        Ok(Progress {
            total: item.scan_total,
            count: item.scanned,
        })
    }

    /// Uploaded plus skipped over selected: the progress-bar fraction.
    pub fn upload_count(&self) -> Result<Progress> {
        let item = self.consumer_lock.read().map_err(|e| eyre!("{:?}", &e))?;
        Ok(Progress {
            total: item.selected,
            count: item.uploaded + item.skipped,
        })
    }

    pub fn state(&self) -> Result<State> {
        let item = self.consumer_lock.read().map_err(|e| eyre!("{:?}", &e))?;
        Ok(State {
            uploaded: item.uploaded,
            skipped: item.skipped,
            mode: item.mode,
            paused: item.paused,
            backing_off: item.backing_off,
            finishing: item.finishing,
            done: item.done,
            estimated_seconds_remaining: estimate(&item),
        })
    }

    pub fn error(&self) -> Result<Option<Report>> {
        // We take the error out of the write lock only if there is one.
        let item = self.consumer_lock.read().map_err(|e| eyre!("{:?}", &e))?;
        let is_error = item.error.is_some();
        drop(item);
        if is_error {
            let mut item = self.producer_lock.write().map_err(|e| eyre!("{:?}", &e))?;
            Ok(item.error.take())
        } else {
            Ok(None)
        }
    }
}

fn estimate(data: &Data) -> Option<u64> {
    // No estimate before the selected total is known.
    if data.selected == 0 {
        return None;
    }
    let remaining = data
        .selected
        .checked_sub(data.uploaded + data.skipped)?;
    if remaining == 0 {
        return Some(0);
    }
    let first = data.recent.front()?;
    let last = data.recent.back()?;
    if data.recent.len() < 2 {
        return None;
    }
    let elapsed = last.duration_since(*first).as_secs_f64();
    if elapsed <= 0.0 {
        return None;
    }
    let rate = (data.recent.len() - 1) as f64 / elapsed;
    Some((remaining as f64 / rate).ceil() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mu_core::crossbeam_channel::unbounded;

    #[test]
    fn test_adapter_tallies_messages() {
        let adapter = Adapter::new();
        let (sender, receiver) = unbounded();
        let handle = adapter.process(receiver);

        sender.send(Message::SelectedTotal(3)).unwrap();
        sender.send(Message::UploadedOne).unwrap();
        sender.send(Message::UploadedOne).unwrap();
        sender.send(Message::ModeChanged(Mode::Slow)).unwrap();
        sender.send(Message::Done).unwrap();
        handle.join().expect("no panic").expect("no error");

        let progress = adapter.upload_count().unwrap();
        assert_eq!(progress.total, 3);
        assert_eq!(progress.count, 2);
        let state = adapter.state().unwrap();
        assert_eq!(state.uploaded, 2);
        assert_eq!(state.skipped, 0);
        assert_eq!(state.mode, Mode::Slow);
        assert!(state.done);
    }

    /// Before the selected total arrives there is nothing to extrapolate
    /// from, so no estimate is reported.
    #[test]
    fn test_no_estimate_before_selected_total() {
        assert_eq!(estimate(&Data::default()), None);

        let adapter = Adapter::new();
        let (sender, receiver) = unbounded();
        let handle = adapter.process(receiver);
        sender.send(Message::UploadedOne).unwrap();
        sender.send(Message::Done).unwrap();
        handle.join().expect("no panic").expect("no error");
        let state = adapter.state().unwrap();
        assert_eq!(state.estimated_seconds_remaining, None);
    }
}
