/// 錯誤類型
///
/// 只有設定與生命週期的問題才會成為錯誤；執行期資料狀況（過期區域、容量溢出、
/// 查詢不到有效格）一律在本地恢復，不會向外傳遞
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExposureError {
    /// 讀取設定檔失敗
    #[error("無法讀取設定檔 {path}: {source}")]
    ConfigIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML 設定解析失敗: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("YAML 設定解析失敗: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),

    #[error("JSON 設定解析失敗: {0}")]
    ConfigJson(#[from] serde_json::Error),

    #[error("不支援的設定檔格式: {0}")]
    UnsupportedFormat(String),

    /// 設定值超出允許範圍
    #[error("設定值無效: {0}")]
    InvalidConfig(String),

    #[error("曝光引擎尚未初始化")]
    NotInitialized,

    #[error("曝光引擎已經初始化")]
    AlreadyInitialized,

    #[error("無法建立執行緒池: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ExposureError>;
