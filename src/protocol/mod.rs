//! Client-streaming wire protocol spoken by camera clients.
//!
//! Every message travels in a 4-byte big-endian length-prefixed frame. The
//! client sends [`FrameUpdate`]s until it half-closes its side of the socket,
//! then the server answers with a single [`StreamStatus`] and closes.

pub mod codec;
pub mod messages;

pub use codec::{ClientCodec, ProtocolError, ServerCodec, MAX_FRAME_LEN};
pub use messages::{DetectionEvent, FrameUpdate, StreamStatus};
