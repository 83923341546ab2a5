use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use super::sink::{FrameSink, SinkError, SinkLauncher};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkCall {
    Started(PathBuf),
    Write(Vec<u8>),
    Stopped,
}

/// Launcher whose sinks record every call instead of running an encoder.
#[derive(Default)]
pub struct FakeLauncher {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    failing_launches: AtomicUsize,
    fail_writes: Arc<AtomicBool>,
    short_writes: Arc<AtomicBool>,
    stop_delay_ms: Arc<AtomicU64>,
    exited: Arc<AtomicBool>,
}

impl FakeLauncher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `count` launches fail as if the encoder could not spawn.
    pub fn fail_launches(&self, count: usize) {
        self.failing_launches.store(count, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sinks accept only half of each frame.
    pub fn short_writes(&self, short: bool) {
        self.short_writes.store(short, Ordering::SeqCst);
    }

    /// Makes `stop` take `delay`, like an encoder finalising its file.
    pub fn stop_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.stop_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Pretends the running encoder died on its own.
    pub fn mark_exited(&self) {
        self.exited.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Write(bytes) => Some(bytes),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl SinkLauncher for FakeLauncher {
    async fn launch(
        &self,
        _label: &str,
        output_path: &Path,
    ) -> Result<Box<dyn FrameSink>, SinkError> {
        let pending = self.failing_launches.load(Ordering::SeqCst);
        if pending > 0 {
            self.failing_launches.store(pending - 1, Ordering::SeqCst);
            return Err(SinkError::Spawn {
                program: "fake-encoder".into(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "simulated"),
            });
        }

        self.exited.store(false, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Started(output_path.to_path_buf()));
        Ok(Box::new(FakeSink {
            calls: Arc::clone(&self.calls),
            fail_writes: Arc::clone(&self.fail_writes),
            short_writes: Arc::clone(&self.short_writes),
            stop_delay_ms: Arc::clone(&self.stop_delay_ms),
            exited: Arc::clone(&self.exited),
            stopped: false,
        }))
    }
}

struct FakeSink {
    calls: Arc<Mutex<Vec<SinkCall>>>,
    fail_writes: Arc<AtomicBool>,
    short_writes: Arc<AtomicBool>,
    stop_delay_ms: Arc<AtomicU64>,
    exited: Arc<AtomicBool>,
    stopped: bool,
}

#[async_trait]
impl FrameSink for FakeSink {
    async fn write(&mut self, frame: &[u8]) -> Result<usize, SinkError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SinkError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated",
            )));
        }
        let accepted = if self.short_writes.load(Ordering::SeqCst) {
            frame.len() / 2
        } else {
            frame.len()
        };
        self.calls
            .lock()
            .unwrap()
            .push(SinkCall::Write(frame[..accepted].to_vec()));
        Ok(accepted)
    }

    async fn stop(&mut self) -> Result<(), SinkError> {
        if !self.stopped {
            self.stopped = true;
            let delay = self.stop_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }
            self.calls.lock().unwrap().push(SinkCall::Stopped);
        }
        Ok(())
    }

    fn has_exited(&self) -> bool {
        self.stopped || self.exited.load(Ordering::SeqCst)
    }
}
