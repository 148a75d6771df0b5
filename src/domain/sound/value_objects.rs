//! Sound Context - Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::SoundError;

/// 音量
///
/// 存储域 0-512，256 为原始音量（100%），512 为 200%。
/// 0 表示"未指定"，仅在编码器边界映射为 256，存储值保持不变。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Volume(u16);

impl Volume {
    pub const UNSPECIFIED: u16 = 0;
    pub const UNITY: u16 = 256;
    pub const MAX: u16 = 512;

    pub fn new(value: i64) -> Result<Self, SoundError> {
        if !(0..=Self::MAX as i64).contains(&value) {
            return Err(SoundError::VolumeOutOfRange(value));
        }
        Ok(Self(value as u16))
    }

    pub const fn unspecified() -> Self {
        Self(Self::UNSPECIFIED)
    }

    pub fn value(&self) -> u16 {
        self.0
    }

    pub fn is_unspecified(&self) -> bool {
        self.0 == Self::UNSPECIFIED
    }

    /// 编码器实际使用的音量（未指定 → 256）
    pub fn effective(&self) -> u16 {
        if self.is_unspecified() {
            Self::UNITY
        } else {
            self.0
        }
    }

    /// 线性幅度增益，256 → 1.0
    pub fn gain(&self) -> f32 {
        self.effective() as f32 / Self::UNITY as f32
    }

    /// 面向用户的百分比（0-200%）
    pub fn percent(&self) -> u16 {
        (self.effective() as u32 * 100 / Self::UNITY as u32) as u16
    }
}

impl FromStr for Volume {
    type Err = SoundError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s
            .trim()
            .parse::<i64>()
            .map_err(|_| SoundError::InvalidVolume(s.to_string()))?;
        Self::new(raw)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 音效名称（大小写敏感，guild 内唯一）
///
/// 名称来自附件文件名去掉扩展名，因此不能为空、不能含路径分隔符
pub fn validate_sound_name(name: &str) -> Result<(), SoundError> {
    if name.trim().is_empty() {
        return Err(SoundError::InvalidName("名称不能为空".to_string()));
    }
    if name.chars().count() > 100 {
        return Err(SoundError::InvalidName("名称长度不能超过100字符".to_string()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(SoundError::InvalidName(format!("名称不能包含路径分隔符: {}", name)));
    }
    Ok(())
}

/// 从附件文件名推导音效名称
///
/// 扩展名比较忽略大小写，只去掉最后一个扩展名（`air.horn.mp3` → `air.horn`）
pub fn clip_name(filename: &str, accepted_extension: &str) -> Option<String> {
    let (stem, ext) = filename.rsplit_once('.')?;
    if !ext.eq_ignore_ascii_case(accepted_extension) {
        return None;
    }
    validate_sound_name(stem).ok()?;
    Some(stem.to_string())
}

/// 给音效名称加上媒体扩展名，用于重新上传
pub fn file_name_for(name: &str, extension: &str) -> String {
    format!("{}.{}", name, extension)
}
