use std::{
    path::{Path, PathBuf},
    process::{ExitStatus, Stdio},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use tokio::{
    io::AsyncWriteExt,
    process::{Child, ChildStdin, Command},
    sync::watch,
    task::JoinHandle,
};

use super::sink::{FrameSink, SinkError, SinkLauncher};

const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Fixed JPEG-in, H.264/MP4-out pipeline. Only the destination and the
/// normalised frame rate vary.
pub fn encoder_args(output_path: &Path, framerate: u32) -> Vec<String> {
    let mut args: Vec<String> = [
        "fdsrc",
        "do-timestamp=true",
        "!",
        "image/jpeg",
        "!",
        "jpegparse",
        "!",
        "jpegdec",
        "!",
        "videoconvert",
        "!",
        "videorate",
        "!",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(format!("video/x-raw,framerate={framerate}/1"));
    args.extend(
        [
            "!",
            "x264enc",
            "tune=zerolatency",
            "speed-preset=ultrafast",
            "!",
            "h264parse",
            "!",
            "mp4mux",
            "fragment-duration=2000",
            "!",
            "filesink",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    args.push(format!("location={}", output_path.display()));
    args.push("sync=false".into());
    args
}

/// Launches one external encoder process per recording.
#[derive(Debug, Clone)]
pub struct EncoderLauncher {
    program: String,
    framerate: u32,
}

impl EncoderLauncher {
    pub fn new(program: impl Into<String>, framerate: u32) -> Self {
        Self {
            program: program.into(),
            framerate,
        }
    }
}

#[async_trait]
impl SinkLauncher for EncoderLauncher {
    async fn launch(
        &self,
        label: &str,
        output_path: &Path,
    ) -> Result<Box<dyn FrameSink>, SinkError> {
        if let Some(dir) = output_path.parent() {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|source| SinkError::OutputDir {
                    path: dir.display().to_string(),
                    source,
                })?;
        }

        let args = encoder_args(output_path, self.framerate);
        let sink = EncoderSink::spawn(&self.program, args.as_slice(), label, output_path)?;
        Ok(Box::new(sink))
    }
}

#[derive(Debug, Clone)]
enum ProcessExit {
    Status(ExitStatus),
    WaitFailed(String),
}

/// Handle on a running encoder process fed through its stdin.
pub struct EncoderSink {
    label: String,
    output_path: PathBuf,
    stdin: Option<ChildStdin>,
    exit_rx: watch::Receiver<Option<ProcessExit>>,
    stopping: Arc<AtomicBool>,
    watcher: Option<JoinHandle<()>>,
}

impl EncoderSink {
    /// Spawns `program` with `args`, stdin piped and diagnostics inherited.
    pub fn spawn(
        program: &str,
        args: &[String],
        label: &str,
        output_path: &Path,
    ) -> Result<Self, SinkError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| SinkError::Spawn {
                program: program.to_string(),
                source,
            })?;

        // Dropping the child here kills it.
        let stdin = child.stdin.take().ok_or(SinkError::StdinUnavailable)?;

        let (exit_tx, exit_rx) = watch::channel(None);
        let stopping = Arc::new(AtomicBool::new(false));
        let watcher = tokio::spawn(watch_process(
            child,
            label.to_string(),
            exit_tx,
            Arc::clone(&stopping),
        ));

        log_info!("[{}] encoder started -> {}", label, output_path.display());

        Ok(Self {
            label: label.to_string(),
            output_path: output_path.to_path_buf(),
            stdin: Some(stdin),
            exit_rx,
            stopping,
            watcher: Some(watcher),
        })
    }
}

async fn watch_process(
    mut child: Child,
    label: String,
    exit_tx: watch::Sender<Option<ProcessExit>>,
    stopping: Arc<AtomicBool>,
) {
    let outcome = match child.wait().await {
        Ok(status) => ProcessExit::Status(status),
        Err(err) => ProcessExit::WaitFailed(err.to_string()),
    };

    if !stopping.load(Ordering::SeqCst) {
        log_warn!("[{}] encoder exited unexpectedly: {:?}", label, outcome);
    }

    let _ = exit_tx.send(Some(outcome));
}

#[async_trait]
impl FrameSink for EncoderSink {
    async fn write(&mut self, frame: &[u8]) -> Result<usize, SinkError> {
        let stdin = self.stdin.as_mut().ok_or(SinkError::Closed)?;
        stdin.write_all(frame).await?;
        Ok(frame.len())
    }

    async fn stop(&mut self) -> Result<(), SinkError> {
        let Some(watcher) = self.watcher.take() else {
            return Ok(());
        };

        self.stopping.store(true, Ordering::SeqCst);
        log_info!("[{}] stopping encoder", self.label);

        // Dropping stdin closes the pipe, which is the encoder's end-of-stream.
        drop(self.stdin.take());

        let outcome = self
            .exit_rx
            .wait_for(Option::is_some)
            .await
            .map(|exit| (*exit).clone())
            .map_err(|_| SinkError::AbnormalExit("encoder watcher vanished".into()))?;
        let _ = watcher.await;

        match outcome {
            Some(ProcessExit::Status(status)) if status.success() => {
                log_info!(
                    "[{}] encoder finished, saved {}",
                    self.label,
                    self.output_path.display()
                );
                Ok(())
            }
            Some(ProcessExit::Status(status)) => Err(SinkError::AbnormalExit(status.to_string())),
            Some(ProcessExit::WaitFailed(reason)) => Err(SinkError::AbnormalExit(reason)),
            None => Err(SinkError::AbnormalExit("no exit status".into())),
        }
    }

    fn has_exited(&self) -> bool {
        self.exit_rx.borrow().is_some()
    }
}

impl Drop for EncoderSink {
    fn drop(&mut self) {
        // Aborting the watcher drops the child, which kills the process.
        if let Some(watcher) = self.watcher.take() {
            log_warn!("[{}] encoder dropped without stop, killing it", self.label);
            watcher.abort();
        }
    }
}
