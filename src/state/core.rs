/// 曝光引擎核心結構

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use rayon::ThreadPool;
use vek::Vec3;

use crate::comp::hazard::{DynamicHeightSource, HazardSphere};
use crate::comp::observer::{AllyRoster, Observer, ObserverClass, SurfaceLocation};
use crate::comp::region::{Region, RegionKey, RegionProvider};
use crate::config::ExposureConfig;
use crate::error::{ExposureError, Result};
use crate::vision::exposure_maps::ExposureMaps;
use crate::vision::query::ExposureSample;
use crate::vision::ray_query::RayOutcome;
use crate::vision::region_store::{ExposureVariant, RegionExposureStore};

use super::backend::{BatchTicket, CpuBackend, ParallelBackend};
use super::initialization::EngineInitializer;
use super::source_state::{SourcePhase, SourceState};

/// 外部每幀提供的輸入
#[derive(Debug, Clone, Default)]
pub struct PendingInputs {
    pub observers: [Vec<Observer>; ObserverClass::COUNT],
    pub hazards: Vec<HazardSphere>,
    pub dynamic_sources: Vec<DynamicHeightSource>,
}

/// 引擎統計
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineStats {
    /// 實際推進過的幀數
    pub frames: u64,
    pub observers_processed: u64,
    pub jobs_kicked: u64,
    pub publishes: u64,
    pub discards: u64,
    pub phases: [SourcePhase; ObserverClass::COUNT],
    pub cursors: [usize; ObserverClass::COUNT],
    pub observer_counts: [usize; ObserverClass::COUNT],
}

/// 只由驅動工作存取的排程狀態
pub(crate) struct DriverState {
    pub(crate) sources: [SourceState; ObserverClass::COUNT],
    /// 輪流推進的類別游標
    pub(crate) cur_src: usize,
    /// 上一幀是否啟用
    pub(crate) enabled: bool,
    pub(crate) stats: EngineStats,
}

impl DriverState {
    fn new() -> Self {
        Self {
            sources: ObserverClass::ALL.map(SourceState::new),
            cur_src: 0,
            enabled: false,
            stats: EngineStats::default(),
        }
    }

    pub(crate) fn refresh_stats(&mut self) {
        for (i, src) in self.sources.iter().enumerate() {
            self.stats.phases[i] = src.phase;
            self.stats.cursors[i] = src.cursor;
            self.stats.observer_counts[i] = src.observer_count();
        }
    }

    fn reset(&mut self) {
        for src in self.sources.iter_mut() {
            src.reset();
        }
        self.cur_src = 0;
        self.refresh_stats();
    }
}

/// 驅動工作與呼叫端共用的狀態
pub(crate) struct EngineShared {
    pub(crate) config: ExposureConfig,
    pub(crate) provider: Arc<dyn RegionProvider>,
    pub(crate) allies: Arc<dyn AllyRoster>,
    pub(crate) cpu: CpuBackend,
    pub(crate) parallel: ParallelBackend,
    pub(crate) enabled: AtomicBool,
    /// 連線模式下不計算也不更新
    pub(crate) net_active: AtomicBool,
    pub(crate) use_accelerated: AtomicBool,
    pub(crate) initialized: AtomicBool,
    pub(crate) pending: Mutex<PendingInputs>,
    pub(crate) driver: Mutex<DriverState>,
    /// 上一幀派出、尚未收集的工作
    pub(crate) in_flight: Mutex<Option<BatchTicket>>,
    pub(crate) maps: RwLock<ExposureMaps>,
}

impl EngineShared {
    /// 等待並丟棄進行中的工作
    fn drain_in_flight(&self) {
        if let Some(ticket) = self.in_flight.lock().take() {
            let dropped = ticket.into_outputs();
            log::debug!("丟棄 {} 個未收集的投射結果", dropped.len());
        }
    }
}

/// 一幀驅動工作的完成憑證
///
/// 驅動工作結束時放開傳送端，所有複本的 `wait` 都會返回
#[derive(Clone)]
pub struct FrameHandle {
    done: Receiver<()>,
}

impl FrameHandle {
    pub fn wait(&self) {
        let _ = self.done.recv();
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.done.try_recv(), Err(TryRecvError::Disconnected))
    }
}

/// 曝光引擎
pub struct ExposureEngine {
    shared: Arc<EngineShared>,
    /// 執行每幀驅動工作的執行緒池
    driver_pool: Arc<ThreadPool>,
    frame: Mutex<Option<FrameHandle>>,
}

impl ExposureEngine {
    pub fn new(
        config: ExposureConfig,
        provider: Arc<dyn RegionProvider>,
        allies: Arc<dyn AllyRoster>,
    ) -> Result<Self> {
        config.validate()?;
        let driver_pool = EngineInitializer::create_thread_pool(1, "exposure-driver")?;
        let shadow_pool = EngineInitializer::create_thread_pool(config.worker_threads(), "exposure-shadow")?;

        let shared = EngineShared {
            enabled: AtomicBool::new(true),
            net_active: AtomicBool::new(false),
            use_accelerated: AtomicBool::new(config.scheduler.use_accelerated),
            initialized: AtomicBool::new(false),
            pending: Mutex::new(PendingInputs::default()),
            driver: Mutex::new(DriverState::new()),
            in_flight: Mutex::new(None),
            maps: RwLock::new(ExposureMaps::new(config.queries)),
            cpu: CpuBackend,
            parallel: ParallelBackend::new(shadow_pool),
            provider,
            allies,
            config,
        };

        Ok(Self {
            shared: Arc::new(shared),
            driver_pool,
            frame: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &ExposureConfig {
        &self.shared.config
    }

    /// 為目前所有區域配置儲存
    pub fn init(&self) -> Result<()> {
        if self.shared.initialized.load(Ordering::Acquire) {
            return Err(ExposureError::AlreadyInitialized);
        }
        let allocated = {
            let mut maps = self.shared.maps.write();
            EngineInitializer::allocate_stores(self.shared.provider.as_ref(), &mut maps)
        };
        self.shared.driver.lock().enabled = self.shared.enabled.load(Ordering::Acquire);
        self.shared.initialized.store(true, Ordering::Release);
        log::info!("曝光引擎初始化完成，配置 {} 個區域儲存", allocated);
        Ok(())
    }

    /// 停止並釋放所有儲存；進行中的工作會先等完
    pub fn shutdown(&self) {
        if !self.shared.initialized.load(Ordering::Acquire) {
            return;
        }
        self.gather_frame();
        self.shared.drain_in_flight();
        self.shared.driver.lock().reset();
        self.shared.maps.write().clear();
        self.shared.initialized.store(false, Ordering::Release);
        log::info!("曝光引擎已關閉");
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.initialized.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Release);
    }

    pub fn set_network_session(&self, active: bool) {
        self.shared.net_active.store(active, Ordering::Release);
    }

    pub fn set_use_accelerated(&self, accelerated: bool) {
        self.shared.use_accelerated.store(accelerated, Ordering::Release);
    }

    /// 在驅動執行緒上啟動這一幀的工作
    pub fn kick_frame(&self) -> Result<FrameHandle> {
        if !self.is_initialized() {
            return Err(ExposureError::NotInitialized);
        }
        let (tx, rx) = bounded::<()>(0);
        let shared = self.shared.clone();
        self.driver_pool.spawn(move || {
            shared.run_frame();
            drop(tx);
        });

        let handle = FrameHandle { done: rx };
        *self.frame.lock() = Some(handle.clone());
        Ok(handle)
    }

    /// 等待驅動工作結束並釋放憑證
    pub fn gather_frame(&self) {
        let handle = self.frame.lock().take();
        if let Some(handle) = handle {
            handle.wait();
        }
    }

    /// 幀末等待：驅動工作與它派出的後端工作都完成，結果保留到下次收集
    pub fn wait_for_frame(&self) {
        let handle = self.frame.lock().clone();
        if let Some(handle) = handle {
            handle.wait();
        }
        if let Some(ticket) = self.shared.in_flight.lock().as_mut() {
            ticket.wait();
        }
    }

    /// 在目前執行緒上同步跑一幀
    pub fn run_frame(&self) -> Result<()> {
        if !self.is_initialized() {
            return Err(ExposureError::NotInitialized);
        }
        self.gather_frame();
        self.shared.run_frame();
        Ok(())
    }

    /// 更新某類別的觀察者，超過上限的部分捨棄（除錯建置下斷言）
    pub fn update_observers(&self, class: ObserverClass, mut observers: Vec<Observer>) {
        let max = self.shared.config.scheduler.max_observers;
        if observers.len() > max {
            log::warn!("{} 觀察者數 {} 超過上限 {}，多餘的捨棄", class.name(), observers.len(), max);
        }
        debug_assert!(observers.len() <= max, "觀察者數超過上限");
        observers.truncate(max);
        self.shared.pending.lock().observers[class.index()] = observers;
    }

    pub fn update_hazard_spheres(&self, mut spheres: Vec<HazardSphere>) {
        let max = self.shared.config.scheduler.max_hazard_spheres;
        if spheres.len() > max {
            log::warn!("危險球體數 {} 超過上限 {}", spheres.len(), max);
        }
        debug_assert!(spheres.len() <= max, "危險球體數超過上限");
        spheres.truncate(max);
        self.shared.pending.lock().hazards = spheres;
    }

    pub fn update_dynamic_height_sources(&self, mut sources: Vec<DynamicHeightSource>) {
        let max = self.shared.config.scheduler.max_dynamic_sources;
        if sources.len() > max {
            log::warn!("動態高度來源數 {} 超過上限 {}", sources.len(), max);
        }
        debug_assert!(sources.len() <= max, "動態高度來源數超過上限");
        sources.truncate(max);
        self.shared.pending.lock().dynamic_sources = sources;
    }

    /// 區域載入：配置清零的儲存
    pub fn on_region_loaded(&self, region: &Region) {
        if !self.is_initialized() {
            return;
        }
        if let Some(field) = region.height_field.as_ref() {
            self.shared
                .maps
                .write()
                .insert(RegionExposureStore::new(region.key, field.clone()));
            log::info!("區域 '{}' 載入，配置曝光儲存", region.name);
        }
    }

    /// 區域卸載：釋放儲存，持有它的類別會在下次收集時重新開始
    pub fn on_region_unloaded(&self, key: RegionKey) {
        if self.shared.maps.write().remove(key).is_some() {
            log::info!("區域 {:?} 卸載，釋放曝光儲存", key);
        }
    }

    /// 登入：補齊儲存，非連線模式下清除已發布結果
    pub fn login(&self) {
        if !self.is_initialized() {
            return;
        }
        let mut maps = self.shared.maps.write();
        let allocated = EngineInitializer::allocate_stores(self.shared.provider.as_ref(), &mut maps);
        if !self.shared.net_active.load(Ordering::Acquire) {
            for store in maps.iter_mut() {
                store.clear_client_visible();
            }
        }
        log::info!("曝光引擎登入，新配置 {} 個區域儲存", allocated);
    }

    /// 登出：等完進行中的工作並釋放所有儲存
    pub fn logout(&self) {
        self.gather_frame();
        self.shared.drain_in_flight();
        self.shared.driver.lock().reset();
        self.shared.maps.write().clear();
        log::info!("曝光引擎登出");
    }

    /// 取得讀鎖，跨多次查詢看到一致的結果
    pub fn read_lock(&self) -> RwLockReadGuard<'_, ExposureMaps> {
        self.shared.maps.read()
    }

    pub fn stats(&self) -> EngineStats {
        self.shared.driver.lock().stats.clone()
    }

    pub fn query_at_location(
        &self,
        region: RegionKey,
        pos: Vec3<f32>,
        variant: ExposureVariant,
        class: ObserverClass,
    ) -> bool {
        self.read_lock().query_at_location(region, pos, variant, class)
    }

    pub fn query_exposure_avoid_threat(
        &self,
        region: RegionKey,
        pos: Vec3<f32>,
        variant: ExposureVariant,
        class: ObserverClass,
    ) -> ExposureSample {
        self.read_lock().query_exposure_avoid_threat(region, pos, variant, class)
    }

    pub fn is_anything_nearby_exposed(&self, region: RegionKey, pos: Vec3<f32>, class: ObserverClass) -> bool {
        self.read_lock().is_anything_nearby_exposed(region, pos, class)
    }

    pub fn integrate_path_exposure(
        &self,
        path: &[SurfaceLocation],
        variant: ExposureVariant,
        class: ObserverClass,
        distance_penalty: f32,
    ) -> f32 {
        self.read_lock().integrate_path_exposure(path, variant, class, distance_penalty)
    }

    pub fn integrate_path_threat(&self, path: &[SurfaceLocation], max_dist: f32) -> f32 {
        self.read_lock().integrate_path_threat(path, max_dist)
    }

    pub fn integrate_path_avoid(&self, path: &[SurfaceLocation]) -> f32 {
        self.read_lock().integrate_path_avoid(path)
    }

    pub fn ray_query(&self, p0: Vec3<f32>, p1: Vec3<f32>) -> RayOutcome {
        self.read_lock().ray_query(p0, p1)
    }
}

impl Drop for ExposureEngine {
    fn drop(&mut self) {
        self.gather_frame();
        self.shared.drain_in_flight();
    }
}
