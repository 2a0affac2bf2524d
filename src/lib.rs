/// Stealth Exposure Library
///
/// 以高度圖陰影投射計算各觀察者類別的曝光格，提供潛行 AI 尋路與決策查詢

pub mod comp;
pub mod vision;
pub mod config;
pub mod error;
pub mod state;
pub mod util;

// Re-export commonly used types
pub use crate::comp::*;
pub use crate::vision::*;
pub use crate::config::ExposureConfig;
pub use crate::error::{ExposureError, Result};
pub use crate::state::{EngineStats, ExposureEngine, FrameHandle};
pub use crate::util::{CostProfile, TraversalKind, TraversalLink};
