//! Polling loop that turns the shared segment into a frame feed
//!
//! One task owns the segment, the event and all per-session state. Each
//! interval tick it re-reads the header and variable directory, picks the
//! freshest buffer and hands the copied frame to the consumer. A control
//! channel stops it; stop preempts every suspension point in the loop,
//! including a blocked frame handoff.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, trace, warn};

use crate::buffer::select_latest_buffer;
use crate::config::PollConfig;
use crate::reader::FrameReader;
use crate::schema::{
    HEADER_SIZE, SessionInfo, TelemetryHeader, parse_header, parse_variable_directory,
    read_session_info,
};
use crate::shm::{DataEvent, SharedSegment};
use crate::types::{Frame, FreshnessState, VariableDirectory};
use crate::{Result, TelemetryError};

#[cfg(test)]
mod tests;

/// Capacity of the control channel handed out by [`PollLoop::spawn`].
const CONTROL_CAPACITY: usize = 1;

/// Lifecycle of a [`PollLoop`]. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopState {
    #[default]
    Idle,
    Running,
    Stopped,
}

/// Message on the control channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlSignal {
    Stop,
    /// Anything else; logged and ignored
    Other(String),
}

impl From<&str> for ControlSignal {
    fn from(value: &str) -> Self {
        match value {
            "stop" => ControlSignal::Stop,
            other => ControlSignal::Other(other.to_string()),
        }
    }
}

impl From<String> for ControlSignal {
    fn from(value: String) -> Self {
        ControlSignal::from(value.as_str())
    }
}

/// Why the loop exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// A [`ControlSignal::Stop`] arrived
    Requested,
    /// Every control sender was dropped
    ControlClosed,
    /// The frame receiver was dropped
    FramesClosed,
}

/// Counters reported when the loop exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PollSummary {
    pub ticks: u64,
    pub frames: u64,
    pub torn_frames: u64,
    pub stale_ticks: u64,
    pub errors: u64,
    pub state: LoopState,
    pub stop_reason: Option<StopReason>,
}

/// Consumer side of a spawned [`PollLoop`].
pub struct FeedChannels {
    /// Frames in tick order
    pub frames: mpsc::Receiver<Frame>,
    /// Latest variable directory
    pub directory: watch::Receiver<Arc<VariableDirectory>>,
    /// Latest session info, `None` until the producer publishes one
    pub session_info: watch::Receiver<Option<Arc<SessionInfo>>>,
    pub control: mpsc::Sender<ControlSignal>,
    pub task: JoinHandle<PollSummary>,
}

impl FeedChannels {
    /// Send [`ControlSignal::Stop`] and wait for the loop to exit.
    ///
    /// Returns `None` only if the loop task panicked.
    pub async fn shutdown(self) -> Option<PollSummary> {
        // The loop may already have exited on its own
        let _ = self.control.send(ControlSignal::Stop).await;
        drop(self.frames);

        match self.task.await {
            Ok(summary) => Some(summary),
            Err(e) => {
                error!(error = %e, "Poll loop task failed");
                None
            }
        }
    }
}

/// Per-session polling state over a segment and its data-valid event.
pub struct PollLoop<S: SharedSegment, E: DataEvent> {
    segment: S,
    event: E,
    config: PollConfig,
    reader: FrameReader,
    state: LoopState,
    freshness: FreshnessState,
    directory_tx: watch::Sender<Arc<VariableDirectory>>,
    session_tx: watch::Sender<Option<Arc<SessionInfo>>>,
    last_session_update: Option<i32>,
    last_error: Option<String>,
    summary: PollSummary,
    released: bool,
}

impl<S, E> PollLoop<S, E>
where
    S: SharedSegment,
    E: DataEvent,
{
    /// Build a loop over already-open resources.
    ///
    /// An invalid `config` releases both resources before the error is
    /// returned.
    pub fn new(mut segment: S, mut event: E, config: PollConfig) -> Result<Self> {
        if let Err(e) = config.validate() {
            segment.close();
            event.close();
            return Err(e);
        }

        let (directory_tx, _) = watch::channel(Arc::new(VariableDirectory::default()));
        let (session_tx, _) = watch::channel(None);

        Ok(Self {
            segment,
            event,
            reader: FrameReader::new(config.freshness, config.event_timeout),
            config,
            state: LoopState::Idle,
            freshness: FreshnessState::new(),
            directory_tx,
            session_tx,
            last_session_update: None,
            last_error: None,
            summary: PollSummary::default(),
            released: false,
        })
    }

    /// Open the segment, then the event, and build a loop over them.
    ///
    /// If the event cannot be opened the segment is closed before the error
    /// is returned; the loop never runs.
    pub fn connect_with<FS, FE>(
        open_segment: FS,
        open_event: FE,
        config: PollConfig,
    ) -> Result<Self>
    where
        FS: FnOnce(&PollConfig) -> Result<S>,
        FE: FnOnce(&PollConfig) -> Result<E>,
    {
        config.validate()?;

        let mut segment = open_segment(&config).inspect_err(|e| {
            error!(segment = %config.segment_name, error = %e, "Failed to open segment");
        })?;

        let event = match open_event(&config) {
            Ok(event) => event,
            Err(e) => {
                error!(event = %config.event_name, error = %e, "Failed to open data-valid event");
                segment.close();
                return Err(e);
            }
        };

        info!(
            segment = %config.segment_name,
            event = %config.event_name,
            "Opened telemetry session"
        );
        Self::new(segment, event, config)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    pub fn subscribe_directory(&self) -> watch::Receiver<Arc<VariableDirectory>> {
        self.directory_tx.subscribe()
    }

    pub fn subscribe_session_info(&self) -> watch::Receiver<Option<Arc<SessionInfo>>> {
        self.session_tx.subscribe()
    }

    /// Run the loop on a new task and return the consumer's ends.
    pub fn spawn(self) -> FeedChannels
    where
        S: 'static,
        E: 'static,
    {
        let (frames_tx, frames) = mpsc::channel(self.config.frame_capacity);
        let (control, control_rx) = mpsc::channel(CONTROL_CAPACITY);
        let directory = self.subscribe_directory();
        let session_info = self.subscribe_session_info();

        let task = tokio::spawn(self.run(frames_tx, control_rx));

        FeedChannels { frames, directory, session_info, control, task }
    }

    /// Poll until stopped, then release the segment and event.
    pub async fn run(
        mut self,
        frames: mpsc::Sender<Frame>,
        mut control: mpsc::Receiver<ControlSignal>,
    ) -> PollSummary {
        self.state = LoopState::Running;
        info!(
            interval_ms = self.config.poll_interval.as_millis() as u64,
            freshness = ?self.config.freshness,
            "Poll loop started"
        );

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let reason = loop {
            tokio::select! {
                biased;
                reason = wait_for_stop(&mut control) => break reason,
                _ = interval.tick() => {}
            }

            let polled = tokio::select! {
                biased;
                reason = wait_for_stop(&mut control) => break reason,
                polled = self.poll_once() => polled,
            };

            let Some(frame) = polled else {
                continue;
            };

            let permit = tokio::select! {
                biased;
                reason = wait_for_stop(&mut control) => break reason,
                permit = frames.reserve() => permit,
            };

            match permit {
                Ok(permit) => {
                    trace!(tick = frame.tick, index = frame.buffer_index, "Frame emitted");
                    permit.send(frame);
                    self.summary.frames += 1;
                }
                Err(_) => break StopReason::FramesClosed,
            }
        };

        self.release();
        self.state = LoopState::Stopped;
        self.summary.state = LoopState::Stopped;
        self.summary.stop_reason = Some(reason);

        info!(
            reason = ?reason,
            ticks = self.summary.ticks,
            frames = self.summary.frames,
            torn = self.summary.torn_frames,
            errors = self.summary.errors,
            "Poll loop stopped"
        );
        self.summary
    }

    /// One tick. Errors are logged and counted here so the loop only sees
    /// whether a frame is ready.
    async fn poll_once(&mut self) -> Option<Frame> {
        self.summary.ticks += 1;

        match self.tick().await {
            Ok(Some(frame)) => {
                if self.last_error.take().is_some() {
                    info!(tick = frame.tick, "Telemetry feed recovered");
                }
                if frame.is_torn() {
                    self.summary.torn_frames += 1;
                }
                Some(frame)
            }
            Ok(None) => {
                self.summary.stale_ticks += 1;
                None
            }
            Err(e) => {
                self.summary.errors += 1;
                self.report(e);
                None
            }
        }
    }

    async fn tick(&mut self) -> Result<Option<Frame>> {
        let header = parse_header(&self.segment.read_at(0, HEADER_SIZE)?)?;

        // No buffers are published while disconnected, so check before selecting
        if !header.is_connected() {
            self.freshness.reset();
            return Err(TelemetryError::Disconnected);
        }

        let directory = parse_variable_directory(&self.segment, &header)?;
        self.directory_tx.send_if_modified(|current| {
            if **current == directory {
                return false;
            }
            debug!(variables = directory.len(), "Variable directory changed");
            *current = Arc::new(directory);
            true
        });

        let session_changed =
            self.last_session_update.is_none_or(|last| header.session_info_changed(last));
        if session_changed {
            self.refresh_session_info(&header);
        }

        let index = select_latest_buffer(&header)?;
        self.reader
            .read_frame(&self.segment, &header, index, &self.event, &mut self.freshness)
            .await
    }

    fn refresh_session_info(&mut self, header: &TelemetryHeader) {
        match read_session_info(&self.segment, header) {
            Ok(info) => {
                debug!(
                    previous = ?self.last_session_update,
                    update = header.session_info_update,
                    "Session info changed"
                );
                self.last_session_update = Some(header.session_info_update);
                self.session_tx.send_replace(info.map(Arc::new));
            }
            // Retried on the next tick; a bad session string does not block frames
            Err(e) => {
                let update = header.session_info_update;
                warn!(update, error = %e, "Failed to read session info")
            }
        }
    }

    fn report(&mut self, e: TelemetryError) {
        let message = e.to_string();
        let repeated = self.last_error.as_deref() == Some(message.as_str());

        match (e.is_transient(), repeated) {
            (true, true) => debug!(error = %e, "Poll failed again"),
            (true, false) => warn!(error = %e, "Poll failed, retrying next tick"),
            (false, _) => error!(error = %e, "Poll failed"),
        }
        self.last_error = Some(message);
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.segment.close();
        self.event.close();
        debug!("Released segment and event");
    }
}

impl<S: SharedSegment, E: DataEvent> Drop for PollLoop<S, E> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Resolve once a stop is requested or the control channel closes.
///
/// Other signals are consumed and ignored. Cancel safe.
async fn wait_for_stop(control: &mut mpsc::Receiver<ControlSignal>) -> StopReason {
    loop {
        match control.recv().await {
            Some(ControlSignal::Stop) => return StopReason::Requested,
            Some(ControlSignal::Other(value)) => debug!(value, "Ignoring control signal"),
            None => return StopReason::ControlClosed,
        }
    }
}
