use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec, LengthDelimitedCodecError};

use super::messages::{DetectionEvent, FrameUpdate, StreamStatus};

/// Largest accepted frame payload (16 MiB).
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

const UPDATE_HEADER_LEN: usize = 8 + 2;
const EVENT_HEADER_LEN: usize = 4 + 8 + 2;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("truncated {0}")]
    Truncated(&'static str),

    #[error("class name is not valid UTF-8")]
    InvalidUtf8,

    #[error("{field} does not fit the wire format ({len})")]
    TooLong { field: &'static str, len: usize },

    #[error("empty status frame")]
    EmptyStatus,

    #[error("frame exceeds the {max} byte limit")]
    FrameTooLarge { max: usize },
}

impl ProtocolError {
    /// Lifts the framing layer's length violation out of the generic I/O error.
    fn from_framing(err: io::Error) -> Self {
        let too_large = err
            .get_ref()
            .is_some_and(|inner| inner.is::<LengthDelimitedCodecError>());
        if too_large {
            ProtocolError::FrameTooLarge { max: MAX_FRAME_LEN }
        } else {
            ProtocolError::Io(err)
        }
    }
}

fn length_delimited() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_LEN)
        .new_codec()
}

/// Server side: decodes [`FrameUpdate`]s, encodes [`StreamStatus`].
pub struct ServerCodec {
    frames: LengthDelimitedCodec,
}

impl ServerCodec {
    pub fn new() -> Self {
        Self {
            frames: length_delimited(),
        }
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = FrameUpdate;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<FrameUpdate>, ProtocolError> {
        match self.frames.decode(src).map_err(ProtocolError::from_framing)? {
            Some(frame) => decode_update(frame.freeze()).map(Some),
            None => Ok(None),
        }
    }
}

impl Encoder<StreamStatus> for ServerCodec {
    type Error = ProtocolError;

    fn encode(&mut self, status: StreamStatus, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let flag: &'static [u8] = if status.success { &[1] } else { &[0] };
        self.frames
            .encode(Bytes::from_static(flag), dst)
            .map_err(ProtocolError::from_framing)?;
        Ok(())
    }
}

/// Client side: encodes [`FrameUpdate`]s, decodes [`StreamStatus`].
pub struct ClientCodec {
    frames: LengthDelimitedCodec,
}

impl ClientCodec {
    pub fn new() -> Self {
        Self {
            frames: length_delimited(),
        }
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<FrameUpdate> for ClientCodec {
    type Error = ProtocolError;

    fn encode(&mut self, update: FrameUpdate, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let payload = encode_update(&update)?;
        self.frames
            .encode(payload, dst)
            .map_err(ProtocolError::from_framing)?;
        Ok(())
    }
}

impl Decoder for ClientCodec {
    type Item = StreamStatus;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<StreamStatus>, ProtocolError> {
        let Some(frame) = self.frames.decode(src).map_err(ProtocolError::from_framing)? else {
            return Ok(None);
        };
        match frame.first() {
            Some(flag) => Ok(Some(StreamStatus { success: *flag != 0 })),
            None => Err(ProtocolError::EmptyStatus),
        }
    }
}

fn decode_update(mut buf: Bytes) -> Result<FrameUpdate, ProtocolError> {
    if buf.remaining() < UPDATE_HEADER_LEN {
        return Err(ProtocolError::Truncated("update header"));
    }
    let frame_number = buf.get_u64();
    let event_count = usize::from(buf.get_u16());

    let mut events = Vec::with_capacity(event_count);
    for _ in 0..event_count {
        if buf.remaining() < EVENT_HEADER_LEN {
            return Err(ProtocolError::Truncated("event header"));
        }
        let class_id = buf.get_i32();
        let timestamp_ms = buf.get_i64();
        let name_len = usize::from(buf.get_u16());
        if buf.remaining() < name_len {
            return Err(ProtocolError::Truncated("class name"));
        }
        let name = buf.split_to(name_len);
        let class_name = std::str::from_utf8(&name)
            .map_err(|_| ProtocolError::InvalidUtf8)?
            .to_owned();
        events.push(DetectionEvent {
            class_id,
            class_name,
            timestamp_ms,
        });
    }

    Ok(FrameUpdate {
        frame_number,
        events,
        encoded_frame: buf,
    })
}

fn encode_update(update: &FrameUpdate) -> Result<Bytes, ProtocolError> {
    let event_count = u16::try_from(update.events.len()).map_err(|_| ProtocolError::TooLong {
        field: "event list",
        len: update.events.len(),
    })?;

    let names_len: usize = update.events.iter().map(|e| e.class_name.len()).sum();
    let mut out = BytesMut::with_capacity(
        UPDATE_HEADER_LEN
            + update.events.len() * EVENT_HEADER_LEN
            + names_len
            + update.encoded_frame.len(),
    );

    out.put_u64(update.frame_number);
    out.put_u16(event_count);
    for event in &update.events {
        let name_len = u16::try_from(event.class_name.len()).map_err(|_| ProtocolError::TooLong {
            field: "class name",
            len: event.class_name.len(),
        })?;
        out.put_i32(event.class_id);
        out.put_i64(event.timestamp_ms);
        out.put_u16(name_len);
        out.put_slice(event.class_name.as_bytes());
    }
    out.put_slice(&update.encoded_frame);

    Ok(out.freeze())
}
