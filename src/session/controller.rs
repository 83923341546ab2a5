use std::{
    path::PathBuf,
    sync::{Arc, PoisonError},
};

use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    pipeline::SinkLauncher,
    protocol::FrameUpdate,
    settings::{SessionConfig, SinkFailurePolicy},
    utils::Clock,
};

use super::state::{SessionInner, SessionState};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Recording state for one connected client.
///
/// The receive loop and the ticker task both go through `inner`; nothing else
/// touches the tracker, the pre-roll buffer or the sink.
pub struct Session {
    client_id: String,
    session_no: u32,
    config: SessionConfig,
    launcher: Arc<dyn SinkLauncher>,
    clock: Arc<dyn Clock>,
    inner: Mutex<SessionInner>,
    done: CancellationToken,
    ticker: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    pub fn new(
        client_id: impl Into<String>,
        session_no: u32,
        config: SessionConfig,
        launcher: Arc<dyn SinkLauncher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inner = SessionInner::new(&config);
        Self {
            client_id: client_id.into(),
            session_no,
            config,
            launcher,
            clock,
            inner: Mutex::new(inner),
            done: CancellationToken::new(),
            ticker: std::sync::Mutex::new(None),
        }
    }

    pub fn session_no(&self) -> u32 {
        self.session_no
    }

    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    pub async fn record_count(&self) -> u32 {
        self.inner.lock().await.record_count
    }

    pub async fn pre_roll_len(&self) -> usize {
        self.inner.lock().await.pre_roll.len()
    }

    /// Spawns the periodic evaluation task. A second call is ignored.
    pub fn start_ticker(self: &Arc<Self>) {
        let mut guard = self.ticker.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.is_some() || self.done.is_cancelled() {
            return;
        }

        let session = Arc::clone(self);
        let period = self.config.tick_interval;
        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = session.done.cancelled() => {
                        log_info!("[{}] session cleanup signal received, stopping ticker", session.client_id);
                        break;
                    }
                    _ = ticker.tick() => {
                        session.evaluate().await;
                    }
                }
            }
        });

        *guard = Some(handle);
    }

    /// Feeds one inbound update: detections always, the frame into either the
    /// pre-roll buffer or the live sink depending on state.
    pub async fn process_update(&self, update: &FrameUpdate) {
        let mut inner = self.inner.lock().await;
        if inner.state == SessionState::Canceled {
            return;
        }

        if inner.activity.update(&update.events) {
            log_debug!(
                "[{}] allowed class seen in frame {}",
                self.client_id,
                update.frame_number
            );
        }

        if !update.has_frame() {
            return;
        }

        match inner.state {
            SessionState::Idle => inner.pre_roll.append(update.encoded_frame.clone()),
            SessionState::Recording => {
                log_debug!(
                    "[{}] frame {} ({} bytes) -> encoder",
                    self.client_id,
                    update.frame_number,
                    update.encoded_frame.len()
                );
                self.write_frame(&mut inner, &update.encoded_frame).await;
            }
            SessionState::Canceled => {}
        }
    }

    /// One tick of the state machine. Returns the state after evaluation.
    pub async fn evaluate(&self) -> SessionState {
        let mut inner = self.inner.lock().await;
        let now = self.clock.now_ms();

        match inner.state {
            SessionState::Idle => {
                if inner
                    .activity
                    .has_been_present_for(now, self.config.presence_threshold_ms)
                {
                    self.begin_recording(&mut inner).await;
                }
            }
            SessionState::Recording => {
                let encoder_gone = inner.sink.as_ref().map_or(true, |sink| sink.has_exited());
                if encoder_gone && self.config.sink_failure_policy == SinkFailurePolicy::StopRecording
                {
                    log_warn!("[{}] encoder is gone, leaving Recording", self.client_id);
                    self.end_recording(&mut inner).await;
                } else if inner
                    .activity
                    .has_been_absent_for(now, self.config.absence_threshold_ms)
                {
                    log_info!("[{}] STATE CHANGE: Recording -> Idle (absence)", self.client_id);
                    self.end_recording(&mut inner).await;
                }
            }
            SessionState::Canceled => {}
        }

        inner.state
    }

    /// Moves the session to Canceled and releases the ticker and the encoder.
    /// Safe to call more than once.
    pub async fn close(&self) {
        {
            let mut inner = self.inner.lock().await;
            if inner.state != SessionState::Canceled {
                log_info!(
                    "[{}] STATE CHANGE: {} -> Canceled",
                    self.client_id,
                    inner.state.as_str()
                );
                inner.state = SessionState::Canceled;
            }
        }

        self.done.cancel();
        let ticker = self
            .ticker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = ticker {
            if let Err(err) = handle.await {
                log_error!("[{}] ticker task failed to join: {err}", self.client_id);
            }
        }

        let mut inner = self.inner.lock().await;
        if let Some(mut sink) = inner.sink.take() {
            if let Err(err) = sink.stop().await {
                log_warn!("[{}] encoder shutdown: {err}", self.client_id);
            }
        }
        inner.pre_roll.clear();
        inner.activity.clear();
    }

    fn recording_path(&self, record_no: u32) -> PathBuf {
        self.config.recordings_dir.join(format!(
            "session_{:04}_{:03}.mp4",
            self.session_no, record_no
        ))
    }

    async fn begin_recording(&self, inner: &mut SessionInner) {
        let record_no = inner.record_count + 1;
        let path = self.recording_path(record_no);

        let sink = match self.launcher.launch(&self.client_id, &path).await {
            Ok(sink) => sink,
            Err(err) => {
                // Stay Idle; the next tick retries while presence still holds.
                log_error!("[{}] failed to start encoder: {err}", self.client_id);
                return;
            }
        };

        log_info!(
            "[{}] STATE CHANGE: Idle -> Recording ({})",
            self.client_id,
            path.display()
        );
        inner.record_count = record_no;
        inner.activity.clear();
        inner.sink = Some(sink);
        inner.state = SessionState::Recording;

        let backlog = inner.pre_roll.drain_in_order();
        log_info!(
            "[{}] flushing {} pre-roll frames",
            self.client_id,
            backlog.len()
        );
        for frame in backlog {
            if inner.sink.is_none() {
                break;
            }
            self.write_frame(inner, &frame).await;
        }
    }

    async fn end_recording(&self, inner: &mut SessionInner) {
        inner.activity.clear();
        inner.state = SessionState::Idle;
        if let Some(mut sink) = inner.sink.take() {
            if let Err(err) = sink.stop().await {
                log_warn!("[{}] encoder shutdown: {err}", self.client_id);
            }
        }
    }

    async fn write_frame(&self, inner: &mut SessionInner, frame: &[u8]) {
        let result = match inner.sink.as_mut() {
            Some(sink) => sink.write(frame).await,
            None => return,
        };

        match result {
            Ok(written) if written < frame.len() => {
                log_warn!(
                    "[{}] incomplete write to encoder: wrote {} of {} bytes",
                    self.client_id,
                    written,
                    frame.len()
                );
            }
            Ok(_) => {}
            Err(err) => {
                log_error!("[{}] dropping frame: {err}", self.client_id);
                if self.config.sink_failure_policy == SinkFailurePolicy::StopRecording {
                    log_info!(
                        "[{}] STATE CHANGE: Recording -> Idle (write failure)",
                        self.client_id
                    );
                    self.end_recording(inner).await;
                }
            }
        }
    }
}
