/// 每個觀察者類別的排程狀態
use std::sync::Arc;

use crate::comp::hazard::DynamicHeightSource;
use crate::comp::observer::{Observer, ObserverClass};
use crate::comp::region::{Region, RegionKey};
use crate::util::region_bits::RegionBits;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SourcePhase {
    /// 游標為 0，等待刷新
    #[default]
    Idle,
    /// 正在收集候選區域與觀察者
    Gathering,
    /// 0 <= 游標 < 觀察者數
    Active,
    /// 所有觀察者都已派工，等待下次收集時發布
    Complete,
}

/// 已接受的觀察者
#[derive(Debug, Clone)]
pub struct WorkingObserver {
    pub observer: Observer,
    /// 貼回表面之後所在的區域
    pub region: RegionKey,
    /// 在所在區域上的格座標（已限制在範圍內）
    pub cell: (i32, i32),
}

#[derive(Debug)]
pub struct SourceState {
    pub class: ObserverClass,
    pub working: Vec<WorkingObserver>,
    /// 指派的靜態區域，自己所在的區域排在前面
    pub regions: Vec<Arc<Region>>,
    /// 指派區域的索引集合，用於清除過期結果
    pub region_bits: RegionBits,
    pub dynamic_sources: Vec<DynamicHeightSource>,
    pub cursor: usize,
    pub phase: SourcePhase,
}

impl SourceState {
    pub fn new(class: ObserverClass) -> Self {
        Self {
            class,
            working: Vec::new(),
            regions: Vec::new(),
            region_bits: RegionBits::new(),
            dynamic_sources: Vec::new(),
            cursor: 0,
            phase: SourcePhase::Idle,
        }
    }

    pub fn observer_count(&self) -> usize {
        self.working.len()
    }

    pub fn needs_refresh(&self) -> bool {
        self.cursor == 0 && self.phase != SourcePhase::Complete
    }

    pub fn is_complete(&self) -> bool {
        self.phase == SourcePhase::Complete
    }

    /// 放棄目前進度，下一幀重新開始
    pub fn discard(&mut self) {
        self.cursor = 0;
        self.phase = SourcePhase::Idle;
    }

    /// 完全重置（登出或停用時）
    pub fn reset(&mut self) {
        self.working.clear();
        self.regions.clear();
        self.region_bits.clear_all();
        self.dynamic_sources.clear();
        self.discard();
    }

    pub fn static_count(&self) -> usize {
        self.regions.len()
    }

    pub fn dynamic_count(&self) -> usize {
        self.dynamic_sources.len()
    }
}
