//! Symphonia Opus Encoder - 下载、解码并逐帧编码为 opus
//!
//! 流程：
//! - 下载媒体文件
//! - symphonia 解码为 f32 PCM（mp3 / wav）
//! - 转为立体声并线性重采样到 48kHz
//! - 应用音量增益
//! - 按需编码 20ms opus 帧

use async_trait::async_trait;
use opus::{Application, Channels, Encoder};
use reqwest::Client;
use std::io::Cursor;
use std::time::Duration;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::application::ports::{AudioEncoderPort, EncodeError, EncodeParams, FrameSource};

/// 语音通道要求的采样率
pub const OPUS_SAMPLE_RATE: u32 = 48_000;
const OPUS_CHANNELS: usize = 2;
/// Opus 最大包大小
const MAX_PACKET: usize = 4000;

/// 解码后的 PCM（交错）
#[derive(Debug)]
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: usize,
}

/// Symphonia + Opus 编码器
pub struct SymphoniaOpusEncoder {
    client: Client,
}

impl SymphoniaOpusEncoder {
    pub fn new(timeout_secs: u64) -> Result<Self, EncodeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| EncodeError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, EncodeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| EncodeError::Fetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EncodeError::Fetch(format!("HTTP {} for {}", status, url)));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| EncodeError::Fetch(format!("Failed to read media: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

/// 由 URL 推断扩展名，给 symphonia 探测提示
fn extension_hint(url: &str) -> Option<&str> {
    let path = url.split(|c: char| c == '?' || c == '#').next().unwrap_or(url);
    let file = path.rsplit('/').next().unwrap_or(path);
    file.rsplit_once('.').map(|(_, ext)| ext)
}

/// 使用 symphonia 解码为 PCM
fn decode_to_pcm(data: Vec<u8>, extension: Option<&str>) -> Result<DecodedAudio, EncodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(data)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| EncodeError::Decode(format!("Probe failed: {}", e)))?;
    let mut format = probed.format;

    let track = format
        .default_track()
        .ok_or_else(|| EncodeError::Decode("No audio track found".to_string()))?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;
    let mut channels = track.codec_params.channels.map(|c| c.count());

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| EncodeError::Decode(format!("Decoder creation failed: {}", e)))?;

    let mut samples: Vec<f32> = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(EncodeError::Decode(format!("Packet read error: {}", e))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!("Decode error (skipping packet): {}", e);
                continue;
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        channels.get_or_insert(spec.channels.count());

        let num_frames = decoded.frames();
        let mut buffer = SampleBuffer::<f32>::new(num_frames as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        let actual = num_frames * spec.channels.count();
        samples.extend(&buffer.samples()[..actual]);
    }

    let sample_rate = sample_rate.ok_or_else(|| EncodeError::Decode("Unknown sample rate".to_string()))?;
    let channels = channels
        .filter(|c| *c > 0)
        .ok_or_else(|| EncodeError::Decode("Unknown channel count".to_string()))?;

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}

/// 转为立体声：单声道复制，多声道取前两路
fn to_stereo(samples: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => samples.to_vec(),
        1 => samples.iter().flat_map(|&s| [s, s]).collect(),
        n => samples
            .chunks_exact(n)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

/// 简单线性重采样（立体声交错）
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    let frame_count = samples.len() / OPUS_CHANNELS;
    if from_rate == to_rate || frame_count == 0 {
        return samples.to_vec();
    }

    let ratio = to_rate as f64 / from_rate as f64;
    let new_frame_count = (frame_count as f64 * ratio) as usize;
    let mut resampled = Vec::with_capacity(new_frame_count * OPUS_CHANNELS);

    for i in 0..new_frame_count {
        let src_pos = i as f64 / ratio;
        let src_idx = src_pos as usize;
        let frac = (src_pos - src_idx as f64) as f32;

        for ch in 0..OPUS_CHANNELS {
            let idx0 = src_idx * OPUS_CHANNELS + ch;
            let idx1 = (src_idx + 1).min(frame_count - 1) * OPUS_CHANNELS + ch;
            let s0 = samples.get(idx0).copied().unwrap_or(0.0);
            let s1 = samples.get(idx1).copied().unwrap_or(s0);
            resampled.push(s0 + (s1 - s0) * frac);
        }
    }
    resampled
}

/// 解码结果 → 48kHz 立体声 i16，已应用增益
fn prepare_pcm(audio: DecodedAudio, gain: f32) -> Vec<i16> {
    let stereo = to_stereo(&audio.samples, audio.channels);
    resample(&stereo, audio.sample_rate, OPUS_SAMPLE_RATE)
        .into_iter()
        .map(|s| ((s * gain).clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

/// 逐帧编码的 opus 帧源
pub struct OpusFrameSource {
    encoder: Encoder,
    pcm: Vec<i16>,
    position: usize,
    samples_per_frame: usize,
    output: Vec<u8>,
}

impl OpusFrameSource {
    fn new(pcm: Vec<i16>, params: &EncodeParams) -> Result<Self, EncodeError> {
        let mut encoder = Encoder::new(OPUS_SAMPLE_RATE, Channels::Stereo, Application::Audio)
            .map_err(|e| EncodeError::Encode(format!("Failed to create Opus encoder: {}", e)))?;
        encoder
            .set_bitrate(opus::Bitrate::Bits(params.bitrate))
            .map_err(|e| EncodeError::Encode(format!("Failed to set bitrate: {}", e)))?;

        let frame_size = (OPUS_SAMPLE_RATE * params.frame_duration_ms / 1000) as usize;
        Ok(Self {
            encoder,
            pcm,
            position: 0,
            samples_per_frame: frame_size * OPUS_CHANNELS,
            output: vec![0u8; MAX_PACKET],
        })
    }

    pub fn remaining_frames(&self) -> usize {
        let left = self.pcm.len().saturating_sub(self.position);
        left.div_ceil(self.samples_per_frame)
    }
}

#[async_trait]
impl FrameSource for OpusFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, EncodeError> {
        if self.position >= self.pcm.len() {
            return Ok(None);
        }

        let end = (self.position + self.samples_per_frame).min(self.pcm.len());
        let chunk = &self.pcm[self.position..end];
        // 最后一帧不完整时用零填充
        let frame = if chunk.len() < self.samples_per_frame {
            let mut padded = chunk.to_vec();
            padded.resize(self.samples_per_frame, 0);
            padded
        } else {
            chunk.to_vec()
        };
        self.position = end;

        let len = self
            .encoder
            .encode(&frame, &mut self.output)
            .map_err(|e| EncodeError::Encode(format!("Opus encode failed: {}", e)))?;
        Ok(Some(self.output[..len].to_vec()))
    }
}

#[async_trait]
impl AudioEncoderPort for SymphoniaOpusEncoder {
    async fn open(&self, url: &str, params: EncodeParams) -> Result<Box<dyn FrameSource>, EncodeError> {
        let data = self.download(url).await?;
        let size = data.len();
        let extension = extension_hint(url).map(str::to_string);

        let pcm = tokio::task::spawn_blocking(move || {
            decode_to_pcm(data, extension.as_deref()).map(|audio| prepare_pcm(audio, params.gain))
        })
        .await
        .map_err(|e| EncodeError::Decode(format!("Decode task failed: {}", e)))??;

        let source = OpusFrameSource::new(pcm, &params)?;
        tracing::debug!(
            url = %url,
            size = size,
            volume = params.volume,
            frames = source.remaining_frames(),
            "Media decoded for playback"
        );
        Ok(Box::new(source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 生成 WAV：`seconds` 秒，单声道 16 位，恒定幅度
    fn create_test_wav(sample_rate: u32, seconds: usize, amplitude: i16) -> Vec<u8> {
        let num_samples = sample_rate as usize * seconds;
        let data_size = num_samples * 2;

        let mut wav = Vec::with_capacity(44 + data_size);
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&((36 + data_size) as u32).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&1u16.to_le_bytes()); // mono
        wav.extend_from_slice(&sample_rate.to_le_bytes());
        wav.extend_from_slice(&(sample_rate * 2).to_le_bytes());
        wav.extend_from_slice(&2u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&(data_size as u32).to_le_bytes());
        for _ in 0..num_samples {
            wav.extend_from_slice(&amplitude.to_le_bytes());
        }
        wav
    }

    fn params(gain: f32) -> EncodeParams {
        EncodeParams {
            volume: (gain * 256.0) as u16,
            gain,
            bitrate: 32000,
            frame_duration_ms: 20,
        }
    }

    #[test]
    fn test_extension_hint() {
        assert_eq!(extension_hint("https://cdn/a/b/horn.mp3?ex=1"), Some("mp3"));
        assert_eq!(extension_hint("https://cdn/a/b/horn"), None);
    }

    #[test]
    fn test_to_stereo_and_resample() {
        assert_eq!(to_stereo(&[0.1, 0.2], 1), vec![0.1, 0.1, 0.2, 0.2]);
        assert_eq!(to_stereo(&[0.1, 0.2, 0.3, 0.4, 0.5, 0.6], 3), vec![0.1, 0.2, 0.4, 0.5]);

        let stereo = vec![0.0; 24_000 * 2];
        assert_eq!(resample(&stereo, 24_000, 48_000).len(), 48_000 * 2);
    }

    #[test]
    fn test_decode_applies_gain() {
        let wav = create_test_wav(16_000, 1, 8192);
        let audio = decode_to_pcm(wav, Some("wav")).unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.channels, 1);

        let pcm = prepare_pcm(audio, 0.5);
        assert_eq!(pcm.len(), 48_000 * 2);
        // 8192/32768 = 0.25，增益 0.5 后约为 0.125
        assert!((pcm[1000] as i32 - 4095).abs() <= 2);
    }

    #[tokio::test]
    async fn test_frames_are_lazy_twenty_ms() {
        let wav = create_test_wav(48_000, 1, 1000);
        let pcm = prepare_pcm(decode_to_pcm(wav, Some("wav")).unwrap(), 1.0);
        let mut source = OpusFrameSource::new(pcm, &params(1.0)).unwrap();
        assert_eq!(source.remaining_frames(), 50);

        let mut frames = 0;
        while let Some(frame) = source.next_frame().await.unwrap() {
            assert!(!frame.is_empty());
            frames += 1;
        }
        assert_eq!(frames, 50);
        assert!(source.next_frame().await.unwrap().is_none());
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let result = decode_to_pcm(b"not audio at all".to_vec(), Some("mp3"));
        assert!(matches!(result, Err(EncodeError::Decode(_))));
    }
}
