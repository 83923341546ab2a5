use bytes::Bytes;

/// One object detection reported alongside a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionEvent {
    pub class_id: i32,
    pub class_name: String,
    /// Capture time, milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
}

/// A single update on the client stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FrameUpdate {
    pub frame_number: u64,
    pub events: Vec<DetectionEvent>,
    /// Encoded image (JPEG). Empty when the update only carries detections.
    pub encoded_frame: Bytes,
}

impl FrameUpdate {
    pub fn has_frame(&self) -> bool {
        !self.encoded_frame.is_empty()
    }
}

/// Final reply sent once the client finishes its stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamStatus {
    pub success: bool,
}
