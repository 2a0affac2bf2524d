/// 曝光引擎設定
///
/// 排程預算、容量上限、蹲姿高度調校與威脅圖參數，皆可由 TOML / YAML / JSON 檔覆寫
use serde::{Deserialize, Serialize};

use crate::error::{ExposureError, Result};

/// 每個觀察者類別最多觀察者數
pub const MAX_OBSERVERS: usize = 16;
/// 設定檔可調整的觀察者上限
pub const MAX_OBSERVERS_LIMIT: usize = 64;
/// 每幀處理的觀察者數
pub const OBSERVERS_PER_FRAME: usize = 8;
/// 危險球體上限
pub const MAX_HAZARD_SPHERES: usize = 152;
/// 動態高度來源上限
pub const MAX_DYNAMIC_HEIGHT_SOURCES: usize = 128;

/// 排程設定
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SchedulerSetting {
    /// 每幀最多處理幾個觀察者（跨所有類別）
    pub observers_per_frame: usize,
    /// 每個類別接受的觀察者上限
    pub max_observers: usize,
    /// 每個類別可指派的高度圖上限（靜態區域加動態來源）
    pub max_height_maps: usize,
    pub max_hazard_spheres: usize,
    pub max_dynamic_sources: usize,
    /// 觀察者貼回可行走表面的搜尋半徑（米）
    pub depenetration_radius: f32,
    /// 使用非同步加速後端
    pub use_accelerated: bool,
    /// 工作執行緒數，0 表示使用 CPU 核心數
    pub worker_threads: usize,
}

impl Default for SchedulerSetting {
    fn default() -> Self {
        Self {
            observers_per_frame: OBSERVERS_PER_FRAME,
            max_observers: MAX_OBSERVERS,
            max_height_maps: 32,
            max_hazard_spheres: MAX_HAZARD_SPHERES,
            max_dynamic_sources: MAX_DYNAMIC_HEIGHT_SOURCES,
            depenetration_radius: 0.99,
            use_accelerated: false,
            worker_threads: 0,
        }
    }
}

/// 蹲姿高度偏移調校
///
/// 高度偏移 = clamp((距離² + add) / divide, min, max)，單位為原始高度格。
/// 越靠近觀察者偏移越小，矮掩體後的蹲姿目標因此不會被看見
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct CrouchTuning {
    pub add: f32,
    pub divide: f32,
    pub min: f32,
    pub max: f32,
}

impl Default for CrouchTuning {
    fn default() -> Self {
        Self {
            add: 0.0,
            divide: 8.0,
            min: 3.0,
            max: 12.0,
        }
    }
}

impl CrouchTuning {
    /// 依距離平方（格²）計算蹲姿高度偏移
    pub fn height_bias(&self, dist_sqr: f32) -> f32 {
        let adjusted = (dist_sqr + self.add) / self.divide;
        self.min.max(self.max.min(adjusted))
    }
}

/// 威脅圖參數
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct ThreatTuning {
    /// 觀察者高度上下的帶寬，用於快速排除區域
    pub height_band: f32,
    /// 格中心與觀察者的最大垂直差
    pub max_height_delta: f32,
    /// 隱蔽地形上 c 參數上限
    pub stealth_max_c: f32,
    /// 隱蔽地形上 d 參數上限
    pub stealth_max_d: f32,
}

impl Default for ThreatTuning {
    fn default() -> Self {
        Self {
            height_band: 2.9,
            max_height_delta: 2.7,
            stealth_max_c: 1.65,
            stealth_max_d: 0.64,
        }
    }
}

/// 查詢設定
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(default)]
pub struct QuerySetting {
    /// 「附近是否有曝光格」的取樣半徑（格）
    pub nearby_radius_cells: i32,
}

impl Default for QuerySetting {
    fn default() -> Self {
        Self {
            nearby_radius_cells: 12,
        }
    }
}

/// 曝光引擎完整設定
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct ExposureConfig {
    pub scheduler: SchedulerSetting,
    pub crouch: CrouchTuning,
    pub threat: ThreatTuning,
    pub queries: QuerySetting,
}

impl ExposureConfig {
    /// 從文件載入配置
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ExposureError::ConfigIo {
            path: path.to_string(),
            source,
        })?;

        let config = if path.ends_with(".toml") {
            Self::from_toml_str(&content)?
        } else if path.ends_with(".yaml") || path.ends_with(".yml") {
            Self::from_yaml_str(&content)?
        } else if path.ends_with(".json") {
            Self::from_json_str(&content)?
        } else {
            return Err(ExposureError::UnsupportedFormat(path.to_string()));
        };

        log::info!("載入曝光設定: {}", path);
        Ok(config)
    }

    /// 從 TOML 載入
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ExposureConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 從 YAML 載入
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let config: ExposureConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 從 JSON 載入
    pub fn from_json_str(content: &str) -> Result<Self> {
        let config: ExposureConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// 檢查設定值
    pub fn validate(&self) -> Result<()> {
        let s = &self.scheduler;
        if s.observers_per_frame == 0 {
            return Err(ExposureError::InvalidConfig("observers_per_frame 必須大於 0".into()));
        }
        if s.max_observers == 0 || s.max_observers > MAX_OBSERVERS_LIMIT {
            return Err(ExposureError::InvalidConfig(format!(
                "max_observers 必須介於 1 與 {}",
                MAX_OBSERVERS_LIMIT
            )));
        }
        if s.max_height_maps == 0 {
            return Err(ExposureError::InvalidConfig("max_height_maps 必須大於 0".into()));
        }
        if s.max_hazard_spheres > MAX_HAZARD_SPHERES {
            return Err(ExposureError::InvalidConfig(format!(
                "max_hazard_spheres 不可超過 {}",
                MAX_HAZARD_SPHERES
            )));
        }
        if s.max_dynamic_sources > MAX_DYNAMIC_HEIGHT_SOURCES {
            return Err(ExposureError::InvalidConfig(format!(
                "max_dynamic_sources 不可超過 {}",
                MAX_DYNAMIC_HEIGHT_SOURCES
            )));
        }
        if !(s.depenetration_radius >= 0.0) {
            return Err(ExposureError::InvalidConfig("depenetration_radius 不可為負".into()));
        }
        if !(self.crouch.divide > 0.0) {
            return Err(ExposureError::InvalidConfig("crouch.divide 必須大於 0".into()));
        }
        if self.crouch.min > self.crouch.max {
            return Err(ExposureError::InvalidConfig("crouch.min 不可大於 crouch.max".into()));
        }
        if self.queries.nearby_radius_cells < 0 {
            return Err(ExposureError::InvalidConfig("nearby_radius_cells 不可為負".into()));
        }
        Ok(())
    }

    /// 實際使用的工作執行緒數
    pub fn worker_threads(&self) -> usize {
        if self.scheduler.worker_threads == 0 {
            num_cpus::get()
        } else {
            self.scheduler.worker_threads
        }
    }
}
