//! Fake Audio Encoder - 用于测试的帧源
//!
//! 每一帧的内容为 `<url>#<index>`，测试可据此判断帧来自哪个音效

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::application::ports::{AudioEncoderPort, EncodeError, EncodeParams, FrameSource};

#[derive(Default)]
struct FakeEncoderState {
    frame_counts: HashMap<String, usize>,
    failing: HashSet<String>,
    opened: Vec<(String, EncodeParams)>,
}

/// Fake Audio Encoder
pub struct FakeEncoder {
    default_frames: usize,
    state: Mutex<FakeEncoderState>,
}

impl FakeEncoder {
    pub fn new(default_frames: usize) -> Self {
        Self {
            default_frames,
            state: Mutex::new(FakeEncoderState::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeEncoderState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_frames(&self, url: &str, frames: usize) {
        self.lock().frame_counts.insert(url.to_string(), frames);
    }

    pub fn fail_on(&self, url: &str) {
        self.lock().failing.insert(url.to_string());
    }

    /// 按顺序记录的 open 调用
    pub fn opened(&self) -> Vec<(String, EncodeParams)> {
        self.lock().opened.clone()
    }
}

struct FakeFrameSource {
    url: String,
    total: usize,
    next: usize,
}

#[async_trait]
impl FrameSource for FakeFrameSource {
    async fn next_frame(&mut self) -> Result<Option<Vec<u8>>, EncodeError> {
        if self.next >= self.total {
            return Ok(None);
        }
        let frame = format!("{}#{}", self.url, self.next).into_bytes();
        self.next += 1;
        Ok(Some(frame))
    }
}

#[async_trait]
impl AudioEncoderPort for FakeEncoder {
    async fn open(&self, url: &str, params: EncodeParams) -> Result<Box<dyn FrameSource>, EncodeError> {
        let mut state = self.lock();
        state.opened.push((url.to_string(), params));
        if state.failing.contains(url) {
            return Err(EncodeError::Decode(format!("unsupported media: {}", url)));
        }
        let total = state.frame_counts.get(url).copied().unwrap_or(self.default_frames);
        Ok(Box::new(FakeFrameSource {
            url: url.to_string(),
            total,
            next: 0,
        }))
    }
}
