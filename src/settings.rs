use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

const CONFIG_ENV: &str = "TRACKER_CONFIG";
const DEBUG_ENV: &str = "TRACKER_DEBUG";
const DEFAULT_CONFIG_PATH: &str = "/etc/opt/tracker-recorder/service.json";

/// What a session does when its encoder stops accepting frames.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SinkFailurePolicy {
    /// Log, drop the frame and keep recording.
    #[default]
    Continue,
    /// Tear the recording down and fall back to Idle.
    StopRecording,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub listen_addr: String,
    pub tick_interval_ms: u64,
    pub presence_threshold_ms: u64,
    pub absence_threshold_ms: u64,
    pub pre_roll_capacity: usize,
    pub allowed_classes: Vec<String>,
    pub recordings_dir: PathBuf,
    pub encoder_program: String,
    pub encoder_framerate: u32,
    pub sink_failure_policy: SinkFailurePolicy,
    pub debug: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8081".into(),
            tick_interval_ms: 1000,
            presence_threshold_ms: 2000,
            absence_threshold_ms: 5000,
            pre_roll_capacity: 150,
            allowed_classes: vec!["person".into(), "dog".into()],
            recordings_dir: PathBuf::from("/tmp/tracker-recordings"),
            encoder_program: "gst-launch-1.0".into(),
            encoder_framerate: 30,
            sink_failure_policy: SinkFailurePolicy::Continue,
            debug: false,
        }
    }
}

/// Immutable per-session copy of the knobs the state machine needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub tick_interval: Duration,
    pub presence_threshold_ms: i64,
    pub absence_threshold_ms: i64,
    pub pre_roll_capacity: usize,
    pub allowed_classes: Vec<String>,
    pub recordings_dir: PathBuf,
    pub sink_failure_policy: SinkFailurePolicy,
}

impl Settings {
    /// Config location: first CLI argument, then `TRACKER_CONFIG`, then the
    /// system default path.
    pub fn config_path() -> PathBuf {
        resolve_config_path(env::args().nth(1), env::var(CONFIG_ENV).ok())
    }

    /// Reads and validates `path`; a missing file means defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// `TRACKER_DEBUG=1|true` forces debug logging.
    pub fn with_env_overrides(mut self) -> Self {
        let debug_env = env::var(DEBUG_ENV)
            .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        self.debug |= debug_env;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            bail!("tick_interval_ms must be greater than zero");
        }
        if self.pre_roll_capacity == 0 {
            bail!("pre_roll_capacity must be greater than zero");
        }
        if self.encoder_framerate == 0 {
            bail!("encoder_framerate must be greater than zero");
        }
        Ok(())
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tick_interval: Duration::from_millis(self.tick_interval_ms),
            presence_threshold_ms: clamp_ms(self.presence_threshold_ms),
            absence_threshold_ms: clamp_ms(self.absence_threshold_ms),
            pre_roll_capacity: self.pre_roll_capacity,
            allowed_classes: self.allowed_classes.clone(),
            recordings_dir: self.recordings_dir.clone(),
            sink_failure_policy: self.sink_failure_policy,
        }
    }
}

fn clamp_ms(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn resolve_config_path(arg: Option<String>, env_value: Option<String>) -> PathBuf {
    arg.filter(|value| !value.is_empty())
        .or(env_value.filter(|value| !value.is_empty()))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(settings.listen_addr, "0.0.0.0:8081");
        assert_eq!(settings.pre_roll_capacity, 150);
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        fs::write(
            &path,
            r#"{ "allowed_classes": ["cat"], "sink_failure_policy": "stop_recording" }"#,
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        assert_eq!(settings.allowed_classes, vec!["cat".to_string()]);
        assert_eq!(settings.sink_failure_policy, SinkFailurePolicy::StopRecording);
        assert_eq!(settings.tick_interval_ms, 1000);
    }

    #[test]
    fn zero_tick_interval_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        fs::write(&path, r#"{ "tick_interval_ms": 0 }"#).unwrap();

        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("service.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(Settings::load(&path).is_err());
    }

    #[test]
    fn config_path_prefers_argument_then_env() {
        assert_eq!(
            resolve_config_path(Some("a.json".into()), Some("b.json".into())),
            PathBuf::from("a.json")
        );
        assert_eq!(
            resolve_config_path(None, Some("b.json".into())),
            PathBuf::from("b.json")
        );
        assert_eq!(
            resolve_config_path(Some(String::new()), None),
            PathBuf::from(DEFAULT_CONFIG_PATH)
        );
    }
}
