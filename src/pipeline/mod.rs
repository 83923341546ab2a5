pub mod encoder;
pub mod sink;

pub use encoder::{encoder_args, EncoderLauncher, EncoderSink};
pub use sink::{FrameSink, SinkError, SinkLauncher};

#[cfg(test)]
pub(crate) mod fake;
