/// 引擎狀態管理模塊
///
/// 負責引擎生命週期、每幀排程、投射後端與各觀察者類別的進度

pub mod core;
pub mod initialization;
pub mod scheduler;
pub mod source_state;
pub mod backend;

pub use self::core::{EngineStats, ExposureEngine, FrameHandle, PendingInputs};
pub use initialization::EngineInitializer;
pub use source_state::{SourcePhase, SourceState, WorkingObserver};
pub use backend::{BatchTicket, CpuBackend, ParallelBackend, ShadowCastBackend};
