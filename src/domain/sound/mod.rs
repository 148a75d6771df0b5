//! Sound Context - 音效限界上下文
//!
//! 职责:
//! - 音效记录与音量值对象
//! - 从音效频道消息推导目录与入场音绑定

mod catalog;
mod entities;
mod errors;
mod value_objects;

pub use catalog::{CatalogBuilder, CatalogSnapshot, EntranceBindings, SoundCatalog};
pub use entities::{parse_sound_message, IndexIssue, ParsedSound, Sound};
pub use errors::SoundError;
pub use value_objects::{clip_name, file_name_for, validate_sound_name, Volume};
