//! Playback Layer - 音频播放控制
//!
//! 实现 PlaybackController，保证每个 guild 同一时刻最多一个播放

mod controller;

pub use controller::{
    PlayRequest, PlaybackController, PlaybackControllerConfig, PlaybackOutcome, PlaybackState,
};
