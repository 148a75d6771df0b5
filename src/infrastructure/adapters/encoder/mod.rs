//! Audio Encoder Adapters

mod opus_encoder;

pub use opus_encoder::{OpusFrameSource, SymphoniaOpusEncoder, OPUS_SAMPLE_RATE};
