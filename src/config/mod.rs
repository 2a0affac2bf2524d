/// 設定模組
pub mod exposure_config;

pub use exposure_config::*;
