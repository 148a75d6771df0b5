//! Audio Encoder Port - 音频解码/编码抽象
//!
//! 给定音效 URL 与编码参数，按需产出 20ms opus 帧

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::sound::Sound;

/// 编码错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Failed to fetch media: {0}")]
    Fetch(String),

    #[error("Failed to decode media: {0}")]
    Decode(String),

    #[error("Failed to encode frame: {0}")]
    Encode(String),
}

/// 编码参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    /// 0-512 域中的有效音量（未指定已映射为 256）
    pub volume: u16,
    /// 线性增益，volume / 256
    pub gain: f32,
    pub bitrate: i32,
    pub frame_duration_ms: u32,
}

impl EncodeParams {
    /// 在编码器边界把存储音量映射为增益，不修改存储记录
    pub fn for_sound(sound: &Sound, bitrate: i32, frame_duration_ms: u32) -> Self {
        Self {
            volume: sound.volume.effective(),
            gain: sound.volume.gain(),
            bitrate,
            frame_duration_ms,
        }
    }
}

/// 帧源，逐帧拉取
#[async_trait]
pub trait FrameSource: Send {
    /// `Ok(None)` 表示流结束
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, EncodeError>;
}

/// Audio Encoder Port
#[async_trait]
pub trait AudioEncoderPort: Send + Sync {
    async fn open(&self, url: &str, params: EncodeParams) -> Result<Box<dyn FrameSource>, EncodeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::sound::Volume;
    use crate::domain::MessageId;

    #[test]
    fn test_params_map_unspecified_volume() {
        let sound = Sound::new(MessageId::new(1), "u");
        let params = EncodeParams::for_sound(&sound, 32000, 20);
        assert_eq!(params.volume, 256);
        assert_eq!(params.gain, 1.0);
        assert!(sound.volume.is_unspecified());

        let quiet = sound.with_volume(Volume::new(64).unwrap());
        assert_eq!(EncodeParams::for_sound(&quiet, 32000, 20).gain, 0.25);
    }
}
