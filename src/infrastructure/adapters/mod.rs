//! Infrastructure Adapters
//!
//! 六边形架构的适配器实现

pub mod encoder;
pub mod fake;
pub mod platform;
pub mod voice;

pub use encoder::*;
pub use platform::*;
pub use voice::*;
