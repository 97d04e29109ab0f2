//! # Live Detection Module
//!
//! Drives the analysis pipeline from a live sample stream.
//!
//! ## Threads
//! - **Producer**: whoever calls [`PitchDetector::append`], typically an audio
//!   callback. It only copies samples, applies the silence gate and queues a
//!   job; it never waits for analysis.
//! - **Workers**: a fixed pool started by [`PitchDetector::start`] that runs the
//!   transform, HPS, refinement and scoring for each queued window.
//! - **Consumers**: poll [`PitchDetector::latest`] or read events from
//!   [`PitchDetector::subscribe`].
//!
//! ## Ordering
//! Every cycle gets a generation id from a monotonically increasing counter.
//! Workers may finish out of order, so the [`LatestSlot`] only accepts a
//! result whose generation is newer than the one it holds. Each detection run
//! also has an epoch; `stop()` advances it, which discards every result still
//! in flight.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};

use crate::accumulator::{self, SampleAccumulator, WindowSnapshot};
use crate::error::{DetectorError, Result};
use crate::pipeline::{display_band, PitchPipeline};
use crate::session::{AudioSession, NullSession};
use crate::settings::{DetectionSettings, DetectorConfig};
use crate::{seconds_to_timestamp, Detection, NoDetectionReason, PitchEstimate};

/// A block of mono samples as delivered by the capture source.
#[derive(Debug, Clone, Copy)]
pub struct AudioChunk<'a> {
    /// Amplitudes in `[-1, 1]`.
    pub samples: &'a [f32],
    /// Rate the samples were captured at, in Hz.
    pub sample_rate: f32,
}

impl<'a> AudioChunk<'a> {
    pub fn new(samples: &'a [f32], sample_rate: f32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }
}

/// Lifecycle state of a [`PitchDetector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    Idle,
    Detecting,
}

/// What [`PitchDetector::append`] did with a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendStatus {
    /// The detector is idle; the chunk was discarded.
    Ignored,
    /// Stored; no cycle is due yet.
    Buffering,
    /// A cycle was due but the window was silent.
    Silent,
    /// A cycle was queued under this generation id.
    Dispatched(u64),
    /// A cycle was due but the worker queue was full.
    Dropped,
    /// The chunk was malformed and discarded.
    Rejected,
}

/// One published cycle result.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionEvent {
    pub generation: u64,
    pub detection: Detection,
    /// Magnitudes over the configured display band; empty when the cycle
    /// never reached the transform.
    pub spectrum: Vec<f32>,
}

impl DetectionEvent {
    fn without_spectrum(generation: u64, reason: NoDetectionReason) -> Self {
        Self {
            generation,
            detection: Detection::NotDetected(reason),
            spectrum: Vec::new(),
        }
    }
}

/// Events buffered per subscriber before further events are skipped for it.
pub const SUBSCRIBER_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct SlotState {
    active: bool,
    epoch: u64,
    generation: u64,
    latest: Option<DetectionEvent>,
    subscribers: Vec<Sender<DetectionEvent>>,
}

/// Holder of the most recent cycle result.
///
/// Written by workers (and by the producer for silent or rejected windows),
/// read by any number of consumers.
#[derive(Debug, Default)]
pub struct LatestSlot {
    state: Mutex<SlotState>,
}

impl LatestSlot {
    /// Epoch of the current run, or `None` while idle.
    pub fn active_epoch(&self) -> Option<u64> {
        let state = lock(&self.state);
        state.active.then_some(state.epoch)
    }

    pub fn is_active(&self) -> bool {
        lock(&self.state).active
    }

    /// Opens a run and returns its epoch.
    pub fn activate(&self) -> u64 {
        let mut state = lock(&self.state);
        state.active = true;
        state.epoch
    }

    /// Closes the current run: bumps the epoch so pending results are
    /// refused, and clears the latest value. Returns whether a run was open.
    pub fn deactivate(&self) -> bool {
        let mut state = lock(&self.state);
        let was_active = state.active;
        state.active = false;
        state.epoch += 1;
        state.latest = None;
        was_active
    }

    /// Publishes `event` if it belongs to the open run and is newer than the
    /// current value. Returns whether it was accepted.
    pub fn publish(&self, epoch: u64, event: DetectionEvent) -> bool {
        let mut state = lock(&self.state);
        if !state.active || epoch != state.epoch || event.generation <= state.generation {
            return false;
        }
        state.generation = event.generation;
        state
            .subscribers
            .retain(|subscriber| match subscriber.try_send(event.clone()) {
                Ok(()) | Err(TrySendError::Full(_)) => true,
                Err(TrySendError::Disconnected(_)) => false,
            });
        state.latest = Some(event);
        true
    }

    pub fn latest(&self) -> Option<DetectionEvent> {
        lock(&self.state).latest.clone()
    }

    /// Registers a new push receiver holding up to
    /// [`SUBSCRIBER_CAPACITY`] undelivered events. While it is full, new
    /// events skip it. Dropped receivers are pruned on the next publication.
    pub fn subscribe(&self) -> Receiver<DetectionEvent> {
        let (tx, rx) = crossbeam_channel::bounded(SUBSCRIBER_CAPACITY);
        lock(&self.state).subscribers.push(tx);
        rx
    }
}

/// A window waiting for analysis.
struct Job {
    epoch: u64,
    generation: u64,
    snapshot: WindowSnapshot,
    settings: DetectionSettings,
}

struct Shared {
    config: DetectorConfig,
    pipeline: PitchPipeline,
    settings: RwLock<DetectionSettings>,
    accumulator: Mutex<SampleAccumulator>,
    slot: LatestSlot,
    next_generation: AtomicU64,
    jobs: Mutex<Option<Sender<Job>>>,
}

impl Shared {
    fn next_generation(&self) -> u64 {
        self.next_generation.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn analyze(&self, job: &Job) -> DetectionEvent {
        let snapshot = &job.snapshot;
        let analysis = self.pipeline.analyze(
            &snapshot.samples,
            snapshot.sample_rate,
            &job.settings,
            seconds_to_timestamp(snapshot.position_secs),
        );
        let spectrum = display_band(
            &analysis.magnitudes,
            snapshot.sample_rate,
            self.pipeline.window_size(),
            self.config.display_min_hz,
            self.config.display_max_hz,
        );
        DetectionEvent {
            generation: job.generation,
            detection: analysis.detection,
            spectrum,
        }
    }
}

/// Real-time pitch detector fed by [`append`](Self::append).
pub struct PitchDetector {
    shared: Arc<Shared>,
    session: Arc<dyn AudioSession>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl PitchDetector {
    /// Builds an idle detector with no platform session.
    pub fn new(config: DetectorConfig, settings: DetectionSettings) -> Result<Self> {
        Self::with_session(config, settings, Arc::new(NullSession))
    }

    /// Builds an idle detector that activates `session` on every `start()`.
    pub fn with_session(
        config: DetectorConfig,
        settings: DetectionSettings,
        session: Arc<dyn AudioSession>,
    ) -> Result<Self> {
        config.validate()?;
        settings.validate()?;
        let pipeline = PitchPipeline::new(config.window_size)?;
        let accumulator = SampleAccumulator::new(
            config.window_size,
            config.hop_size,
            config.nominal_sample_rate,
            config.expected_chunk_len,
        );

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                pipeline,
                settings: RwLock::new(settings),
                accumulator: Mutex::new(accumulator),
                slot: LatestSlot::default(),
                next_generation: AtomicU64::new(0),
                jobs: Mutex::new(None),
            }),
            session,
            workers: Mutex::new(Vec::new()),
        })
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.shared.config
    }

    pub fn state(&self) -> DetectorState {
        if self.shared.slot.is_active() {
            DetectorState::Detecting
        } else {
            DetectorState::Idle
        }
    }

    /// Settings the next cycle will use.
    pub fn settings(&self) -> DetectionSettings {
        read(&self.shared.settings)
    }

    /// Replaces the settings. Cycles already queued keep the values they were
    /// dispatched with.
    pub fn update_settings(&self, settings: DetectionSettings) -> Result<()> {
        settings.validate()?;
        *self
            .shared
            .settings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = settings;
        info!("detection settings updated: {:?}", settings);
        Ok(())
    }

    /// Sample rate reported by the first chunk of the current run.
    pub fn discovered_sample_rate(&self) -> Option<f32> {
        lock(&self.shared.accumulator).discovered_sample_rate()
    }

    /// Idle → Detecting. Clears the sample window, activates the session and
    /// spawns the worker pool. Calling it while detecting does nothing.
    pub fn start(&self) -> Result<()> {
        let mut workers = lock(&self.workers);
        if self.shared.slot.is_active() {
            return Ok(());
        }

        self.session.activate().map_err(DetectorError::Session)?;
        lock(&self.shared.accumulator).reset();

        let (job_tx, job_rx) = crossbeam_channel::bounded(self.shared.config.queue_capacity);
        for index in 0..self.shared.config.worker_threads {
            let shared = Arc::clone(&self.shared);
            let jobs = job_rx.clone();
            let spawned = thread::Builder::new()
                .name(format!("pitch-worker-{index}"))
                .spawn(move || run_worker(&shared, &jobs));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    error!("failed to spawn analysis worker {index}: {e}");
                    drop(job_tx);
                    for handle in workers.drain(..) {
                        let _ = handle.join();
                    }
                    self.session.deactivate();
                    return Err(DetectorError::WorkerSpawn(e));
                }
            }
        }

        *lock(&self.shared.jobs) = Some(job_tx);
        let epoch = self.shared.slot.activate();
        info!(
            "pitch detection started (epoch {epoch}, window {}, hop {}, {} workers)",
            self.shared.config.window_size,
            self.shared.config.hop_size,
            self.shared.config.worker_threads
        );
        Ok(())
    }

    /// Detecting → Idle. Cancels queued and running cycles, clears the
    /// window and the latest value, and waits for the workers to exit; no
    /// result is published after this returns. Calling it while idle does
    /// nothing.
    pub fn stop(&self) {
        let mut workers = lock(&self.workers);
        if !self.shared.slot.deactivate() {
            return;
        }

        drop(lock(&self.shared.jobs).take());
        for handle in workers.drain(..) {
            if handle.join().is_err() {
                error!("analysis worker exited with a panic");
            }
        }
        lock(&self.shared.accumulator).reset();
        self.session.deactivate();
        info!("pitch detection stopped");
    }

    /// Feeds one chunk from the capture source.
    ///
    /// Safe to call from an audio callback: the heavy analysis runs on the
    /// worker pool and this call never waits for it.
    pub fn append(&self, chunk: AudioChunk<'_>) -> AppendStatus {
        let shared = &self.shared;
        let Some(epoch) = shared.slot.active_epoch() else {
            return AppendStatus::Ignored;
        };

        let pushed = {
            let mut accumulator = lock(&shared.accumulator);
            // `stop()` resets the window after closing the run; a chunk that
            // raced it must not land in the cleared window.
            if shared.slot.active_epoch() != Some(epoch) {
                return AppendStatus::Ignored;
            }
            accumulator.push(chunk.samples, chunk.sample_rate)
        };
        let snapshot = match pushed {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return AppendStatus::Buffering,
            Err(rejection) => {
                warn!("discarding malformed audio chunk: {rejection:?}");
                let event = DetectionEvent::without_spectrum(
                    shared.next_generation(),
                    NoDetectionReason::MalformedInput,
                );
                shared.slot.publish(epoch, event);
                return AppendStatus::Rejected;
            }
        };

        let settings = read(&shared.settings);
        let generation = shared.next_generation();

        if accumulator::is_silent(&snapshot.samples, settings.silence_rms_threshold) {
            let event = DetectionEvent::without_spectrum(generation, NoDetectionReason::Silence);
            shared.slot.publish(epoch, event);
            return AppendStatus::Silent;
        }

        let Some(jobs) = lock(&shared.jobs).clone() else {
            return AppendStatus::Dropped;
        };
        let job = Job {
            epoch,
            generation,
            snapshot,
            settings,
        };
        match jobs.try_send(job) {
            Ok(()) => AppendStatus::Dispatched(generation),
            Err(TrySendError::Full(_)) => {
                debug!("analysis queue full, dropping cycle {generation}");
                AppendStatus::Dropped
            }
            Err(TrySendError::Disconnected(_)) => AppendStatus::Dropped,
        }
    }

    /// Result of the most recent published cycle.
    pub fn latest(&self) -> Option<Detection> {
        self.shared.slot.latest().map(|event| event.detection)
    }

    /// The most recent cycle's estimate, if that cycle detected a pitch.
    pub fn latest_estimate(&self) -> Option<PitchEstimate> {
        self.latest().and_then(|detection| detection.estimate())
    }

    /// Display-band magnitudes of the most recent published cycle.
    pub fn latest_spectrum(&self) -> Vec<f32> {
        self.shared
            .slot
            .latest()
            .map(|event| event.spectrum)
            .unwrap_or_default()
    }

    pub fn latest_event(&self) -> Option<DetectionEvent> {
        self.shared.slot.latest()
    }

    /// Receiver of every accepted cycle result, in publication order.
    pub fn subscribe(&self) -> Receiver<DetectionEvent> {
        self.shared.slot.subscribe()
    }
}

impl Drop for PitchDetector {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(shared: &Shared, jobs: &Receiver<Job>) {
    for job in jobs.iter() {
        if shared.slot.active_epoch() != Some(job.epoch) {
            debug!("skipping cancelled cycle {}", job.generation);
            continue;
        }
        match panic::catch_unwind(AssertUnwindSafe(|| shared.analyze(&job))) {
            Ok(event) => {
                if !shared.slot.publish(job.epoch, event) {
                    debug!("discarding stale result of cycle {}", job.generation);
                }
            }
            Err(_) => error!("analysis of cycle {} panicked; skipping it", job.generation),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T: Copy>(rw: &RwLock<T>) -> T {
    *rw.read().unwrap_or_else(PoisonError::into_inner)
}
