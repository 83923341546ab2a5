use crate::{
    pipeline::FrameSink,
    settings::SessionConfig,
    tracking::{ActivityTracker, PreRollBuffer},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording,
    /// Terminal: the client stream is gone.
    Canceled,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Idle => "Idle",
            SessionState::Recording => "Recording",
            SessionState::Canceled => "Canceled",
        }
    }
}

/// Everything guarded by the session lock.
pub(crate) struct SessionInner {
    pub(crate) state: SessionState,
    pub(crate) activity: ActivityTracker,
    /// Only fed while Idle.
    pub(crate) pre_roll: PreRollBuffer,
    /// Present exactly while Recording.
    pub(crate) sink: Option<Box<dyn FrameSink>>,
    pub(crate) record_count: u32,
}

impl SessionInner {
    pub(crate) fn new(config: &SessionConfig) -> Self {
        Self {
            state: SessionState::Idle,
            activity: ActivityTracker::new(config.allowed_classes.iter().cloned()),
            pre_roll: PreRollBuffer::new(config.pre_roll_capacity),
            sink: None,
            record_count: 0,
        }
    }
}
