/// 每幀排程：收集上一批結果並發布，刷新閒置類別，再依觀察者預算派出新的投射工作
use std::sync::atomic::Ordering;
use std::sync::Arc;

use vek::Vec3;

use crate::comp::observer::ObserverClass;
use crate::comp::region::{HeightField, Region};
use crate::util::region_bits::RegionBits;
use crate::vision::aux_maps::{build_avoid_map, build_threat_map};
use crate::vision::exposure_maps::ExposureMaps;
use crate::vision::geometry_utils::{Aabb, GeometryUtils};
use crate::vision::shadow_cast::{ObserverCast, OccluderRef, ShadowCastJob};

use super::backend::ShadowCastBackend;
use super::core::{DriverState, EngineShared, PendingInputs};
use super::source_state::{SourcePhase, SourceState, WorkingObserver};

impl EngineShared {
    /// 跑一幀：收集 → 刷新 → 派工
    pub(crate) fn run_frame(&self) {
        if !self.initialized.load(Ordering::Acquire) {
            return;
        }
        let mut driver = self.driver.lock();

        let enabled = self.enabled.load(Ordering::Acquire);
        let prev_enabled = driver.enabled;
        driver.enabled = enabled;
        if !prev_enabled && !enabled {
            return;
        }

        let net_active = self.net_active.load(Ordering::Acquire);
        self.gather_workload(&mut driver, net_active);

        if !enabled {
            log::info!("曝光引擎停用，捨棄所有類別的進度");
            for src in driver.sources.iter_mut() {
                src.discard();
            }
            driver.refresh_stats();
            return;
        }
        if net_active {
            driver.refresh_stats();
            return;
        }

        driver.stats.frames += 1;
        let use_accelerated = self.use_accelerated.load(Ordering::Acquire);
        let inputs = self.pending.lock().clone();

        {
            let mut maps = self.maps.write();
            for src in driver.sources.iter_mut() {
                if src.needs_refresh() {
                    self.refresh_source(&mut maps, src, &inputs);
                }
            }
        }

        let batch = self.advance_sources(&mut driver);
        if !batch.is_empty() {
            let backend: &dyn ShadowCastBackend = if use_accelerated {
                &self.parallel
            } else {
                &self.cpu
            };
            log::trace!("派出 {} 個投射工作到 {} 後端", batch.len(), backend.name());
            driver.stats.jobs_kicked += batch.len() as u64;
            *self.in_flight.lock() = Some(backend.submit(batch));
        }
        driver.refresh_stats();
    }

    /// 等待上一批工作，把結果併入 Scratch，並發布已完成的類別
    pub(crate) fn gather_workload(&self, driver: &mut DriverState, net_active: bool) {
        let ticket = self.in_flight.lock().take();
        let outputs = match ticket {
            Some(ticket) => ticket.into_outputs(),
            None => Vec::new(),
        };

        let mut maps = self.maps.write();
        for output in outputs {
            match maps.get_mut(output.target) {
                Some(store) => {
                    let scratch = store.scratch_mut(output.class);
                    if scratch.same_shape(&output.grid) {
                        scratch.or_assign(&output.grid);
                    }
                }
                None => log::trace!("區域 {:?} 已卸載，丟棄投射結果", output.target),
            }
        }

        for src in driver.sources.iter_mut() {
            if src.phase == SourcePhase::Idle {
                continue;
            }

            let invalid = src
                .regions
                .iter()
                .any(|r| self.provider.resolve(r.key).is_none() || !maps.contains(r.key));
            if invalid {
                log::debug!("{} 的指派區域已失效，重新開始", src.class.name());
                src.discard();
                driver.stats.discards += 1;
                continue;
            }
            if !src.is_complete() {
                continue;
            }

            publish_source(&mut maps, src);
            src.discard();
            driver.stats.publishes += 1;
        }

        if !net_active {
            let hazards = self.pending.lock().hazards.clone();
            build_avoid_map(&mut maps, &hazards);

            let observers = driver
                .sources
                .iter()
                .flat_map(|s| s.working.iter().map(move |w| (s.class, &w.observer)));
            build_threat_map(&mut maps, observers, self.allies.as_ref(), &self.config.threat);
        }
    }

    /// 刷新閒置類別：接受觀察者、收集區域與動態來源、清除過期結果
    fn refresh_source(&self, maps: &mut ExposureMaps, src: &mut SourceState, inputs: &PendingInputs) {
        let class = src.class;
        let setting = &self.config.scheduler;
        src.phase = SourcePhase::Gathering;
        src.working.clear();

        for observer in inputs.observers[class.index()].iter().take(setting.max_observers) {
            if !observer.is_finite() {
                log::debug!("{} 觀察者位置無效，略過", class.name());
                continue;
            }
            let start = match observer.region {
                Some(key) => key,
                None => continue,
            };

            let mut observer = observer.clone();
            let pos = observer.locator.position;
            let mut key = start;
            if let Some((found, p)) = self
                .provider
                .find_nearest_surface(start, pos, setting.depenetration_radius)
            {
                key = found;
                observer.locator.position = Vec3::new(p.x, pos.y, p.z);
                observer.region = Some(found);
            }

            let field = match self.provider.resolve(key).and_then(|r| r.height_field.clone()) {
                Some(field) if maps.contains(key) => field,
                _ => continue,
            };
            observer.compute_bounds();

            let (cx, cz) = field.cell_of(observer.locator.position);
            let cell = (
                cx.clamp(0, field.size_x() as i32 - 1),
                cz.clamp(0, field.size_z() as i32 - 1),
            );
            src.working.push(WorkingObserver { observer, region: key, cell });
        }

        let cap = setting.max_height_maps;
        let mut regions: Vec<Arc<Region>> = Vec::new();
        let mut bits = RegionBits::new();

        // 自己所在的區域優先，保證看得到自己腳下
        for w in src.working.iter() {
            let index = w.region.index as usize;
            if bits.contains(index) {
                continue;
            }
            if regions.len() >= cap {
                log::warn!("{} 指派區域超過上限 {}", class.name(), cap);
                break;
            }
            if let Some(region) = self.provider.resolve(w.region) {
                bits.set(index);
                regions.push(region);
            }
        }

        for region in self.provider.regions() {
            let index = region.key.index as usize;
            if bits.contains(index) || !maps.contains(region.key) {
                continue;
            }
            let aabb = match region.aabb() {
                Some(aabb) => aabb,
                None => continue,
            };
            if !overlaps_any(&src.working, &aabb) {
                continue;
            }
            if regions.len() >= cap {
                log::warn!("{} 指派區域超過上限 {}", class.name(), cap);
                break;
            }
            bits.set(index);
            regions.push(region);
        }

        let mut dynamic = Vec::new();
        for source in inputs.dynamic_sources.iter() {
            if !source.applies_to(class) || !overlaps_any(&src.working, &source.aabb()) {
                continue;
            }
            if regions.len() + dynamic.len() >= cap {
                log::warn!("{} 動態高度來源超過上限", class.name());
                break;
            }
            dynamic.push(source.clone());
        }

        for region in regions.iter() {
            if let Some(store) = maps.get_mut(region.key) {
                store.clear_scratch(class);
            }
        }

        // 上次指派但這次沒有的區域，清掉此類別的結果
        for index in src.region_bits.difference(&bits).iter() {
            if let Some(store) = maps.get_by_index_mut(index) {
                store.clear_class(class);
            }
        }

        log::debug!(
            "刷新 {}: {} 個觀察者, {} 個區域, {} 個動態來源",
            class.name(),
            src.working.len(),
            regions.len(),
            dynamic.len()
        );

        src.region_bits = bits;
        src.regions = regions;
        src.dynamic_sources = dynamic;
        src.cursor = 0;
        src.phase = if src.working.is_empty() {
            SourcePhase::Complete
        } else {
            SourcePhase::Active
        };
    }

    /// 依預算輪流推進各類別，回傳這一幀要派出的工作
    fn advance_sources(&self, driver: &mut DriverState) -> Vec<ShadowCastJob> {
        let mut batch = Vec::new();
        let mut remaining = self.config.scheduler.observers_per_frame;
        let mut processed = 0usize;
        let orig = driver.cur_src;
        let mut cur = orig;

        loop {
            let src = &mut driver.sources[cur];
            let take = if src.phase == SourcePhase::Active {
                remaining.min(src.observer_count() - src.cursor)
            } else {
                0
            };

            if take == 0 {
                cur = (cur + 1) % ObserverClass::COUNT;
                if remaining == 0 || cur == orig {
                    break;
                }
                continue;
            }

            let start = src.cursor;
            src.cursor += take;
            remaining -= take;
            processed += take;
            self.build_jobs(src, start, src.cursor, &mut batch);
            if src.cursor == src.observer_count() {
                src.phase = SourcePhase::Complete;
            }
        }

        driver.cur_src = cur;
        driver.stats.observers_processed += processed as u64;
        batch
    }

    /// 每個目標區域一個工作，涵蓋 [start, end) 的觀察者
    fn build_jobs(&self, src: &SourceState, start: usize, end: usize, batch: &mut Vec<ShadowCastJob>) {
        let observers = &src.working[start..end];
        let occluder_fields: Vec<Arc<HeightField>> = src
            .regions
            .iter()
            .filter_map(|r| r.height_field.clone())
            .chain(src.dynamic_sources.iter().map(|d| d.field.clone()))
            .collect();

        for region in src.regions.iter() {
            let field = match region.height_field.as_ref() {
                Some(field) => field,
                None => continue,
            };
            let casts: Vec<ObserverCast> = observers
                .iter()
                .map(|w| ObserverCast::new(&w.observer, field))
                .filter(|c| c.rect.is_some())
                .collect();
            if casts.is_empty() {
                continue;
            }

            let occluders = occluder_fields
                .iter()
                .map(|f| OccluderRef::relative_to(f.clone(), field.origin()))
                .collect();
            batch.push(ShadowCastJob {
                class: src.class,
                target: region.key,
                target_field: field.clone(),
                occluders,
                observers: casts,
                crouch: self.config.crouch,
            });
        }
    }
}

/// 任一觀察者的曝光邊界與包圍盒相交
fn overlaps_any(working: &[WorkingObserver], aabb: &Aabb) -> bool {
    working
        .iter()
        .any(|w| GeometryUtils::intersect_quad_aabb_xz(&w.observer.exposure_bounds, aabb).is_valid())
}

/// 標記觀察者自己的格，再把 Scratch 發布為 Normal / StealthMasked
fn publish_source(maps: &mut ExposureMaps, src: &SourceState) {
    let class = src.class;
    for w in src.working.iter() {
        if let Some(store) = maps.get_mut(w.region) {
            let (x, z) = w.cell;
            let scratch = store.scratch_mut(class);
            if scratch.in_bounds(x, z) {
                scratch.set_bit(x as u32, z as u32);
            }
        }
    }
    for region in src.regions.iter() {
        if let Some(store) = maps.get_mut(region.key) {
            store.publish(class);
        }
    }
}
