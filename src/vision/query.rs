/// 查詢介面
///
/// 所有查詢都在持有讀鎖的 `ExposureMaps` 上執行。找不到有效格時回傳保守值：
/// 曝光查詢視為曝光，迴避與威脅查詢視為否
use vek::Vec3;

use crate::comp::observer::{ObserverClass, SurfaceLocation};
use crate::comp::region::RegionKey;
use crate::vision::bitmap_grid::ExposureGrid;
use crate::vision::exposure_maps::ExposureMaps;
use crate::vision::region_store::{ExposureVariant, RegionExposureStore};

/// 單點查詢結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExposureSample {
    pub exposed: bool,
    pub avoid: bool,
    pub threat: bool,
}

impl ExposureSample {
    /// 找不到有效格時的保守值
    pub const UNRESOLVED: ExposureSample = ExposureSample {
        exposed: true,
        avoid: false,
        threat: false,
    };
}

/// 線段積分結果（米）
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SegmentExposure {
    pub exposed: f32,
    pub avoid: f32,
    pub threat: f32,
}

impl ExposureMaps {
    fn resolve_cell(&self, region: RegionKey, pos: Vec3<f32>) -> Option<(&RegionExposureStore, i32, i32)> {
        let store = self.get(region)?;
        let (x, z) = store.find_nearest_valid_cell(pos)?;
        Some((store, x, z))
    }

    /// 就近有效格
    pub fn find_nearest_valid_cell(&self, region: RegionKey, pos: Vec3<f32>) -> Option<(i32, i32)> {
        self.get(region)?.find_nearest_valid_cell(pos)
    }

    pub fn query_at_location(
        &self,
        region: RegionKey,
        pos: Vec3<f32>,
        variant: ExposureVariant,
        class: ObserverClass,
    ) -> bool {
        match self.resolve_cell(region, pos) {
            Some((store, x, z)) => store.query(variant, class, x, z),
            None => true,
        }
    }

    /// 同一格的兩種網格
    pub fn query_two_variants(
        &self,
        region: RegionKey,
        pos: Vec3<f32>,
        class: ObserverClass,
        variants: [ExposureVariant; 2],
    ) -> [bool; 2] {
        match self.resolve_cell(region, pos) {
            Some((store, x, z)) => [
                store.query(variants[0], class, x, z),
                store.query(variants[1], class, x, z),
            ],
            None => [true, true],
        }
    }

    /// 曝光、迴避、威脅一次查完
    pub fn query_exposure_avoid_threat(
        &self,
        region: RegionKey,
        pos: Vec3<f32>,
        variant: ExposureVariant,
        class: ObserverClass,
    ) -> ExposureSample {
        match self.resolve_cell(region, pos) {
            Some((store, x, z)) => ExposureSample {
                exposed: store.query(variant, class, x, z),
                avoid: store.query_avoid(x, z),
                threat: store.query_threat(x, z),
            },
            None => ExposureSample::UNRESOLVED,
        }
    }

    /// 兩個類別各自的曝光，加上共用的迴避與威脅
    pub fn query_two_classes(
        &self,
        region: RegionKey,
        pos: Vec3<f32>,
        variant: ExposureVariant,
        classes: [ObserverClass; 2],
    ) -> [ExposureSample; 2] {
        match self.resolve_cell(region, pos) {
            Some((store, x, z)) => {
                let avoid = store.query_avoid(x, z);
                let threat = store.query_threat(x, z);
                classes.map(|class| ExposureSample {
                    exposed: store.query(variant, class, x, z),
                    avoid,
                    threat,
                })
            }
            None => [ExposureSample::UNRESOLVED; 2],
        }
    }

    pub fn query_avoid_at_location(&self, region: RegionKey, pos: Vec3<f32>) -> bool {
        self.resolve_cell(region, pos)
            .map_or(false, |(store, x, z)| store.query_avoid(x, z))
    }

    pub fn query_threat_at_location(&self, region: RegionKey, pos: Vec3<f32>) -> bool {
        self.resolve_cell(region, pos)
            .map_or(false, |(store, x, z)| store.query_threat(x, z))
    }

    /// 所在格或周圍八格中任一可行走格受威脅
    pub fn location_or_neighbour_threatened(&self, region: RegionKey, pos: Vec3<f32>) -> bool {
        let store = match self.get(region) {
            Some(store) => store,
            None => return false,
        };
        if !store.any_threat() {
            return false;
        }
        let field = store.field();
        let (cx, cz) = store.cell_of(pos);
        for z in cz - 1..=cz + 1 {
            for x in cx - 1..=cx + 1 {
                if field.is_on_surface(x, z) && store.query_threat(x, z) {
                    return true;
                }
            }
        }
        false
    }

    /// 附近圓盤內是否有 StealthMasked 曝光格
    pub fn is_anything_nearby_exposed(&self, region: RegionKey, pos: Vec3<f32>, class: ObserverClass) -> bool {
        let store = match self.get(region) {
            Some(store) => store,
            None => return false,
        };
        if !store.any(class) {
            return false;
        }

        let grid = store.grid(ExposureVariant::StealthMasked, class);
        let (cx, cz) = store.cell_of(pos);
        let radius = self.query.nearby_radius_cells;
        let radius_sqr = radius * radius;
        for dz in -radius..=radius {
            for dx in -radius..=radius {
                if dx * dx + dz * dz < radius_sqr && grid.test_checked(cx + dx, cz + dz) {
                    return true;
                }
            }
        }
        false
    }

    /// 單一線段在兩端點區域上的曝光、迴避與威脅長度
    pub fn integrate_segment(
        &self,
        from: &SurfaceLocation,
        to: &SurfaceLocation,
        variant: ExposureVariant,
        class: ObserverClass,
    ) -> Option<SegmentExposure> {
        let stores = self.segment_stores(from, to);
        if stores.is_empty() {
            return None;
        }
        let mut out = SegmentExposure::default();
        for store in stores {
            let on_surface = store.field().on_surface();
            let (exposed, avoid) = ExposureGrid::integrate_length_pair(
                store.grid(variant, class),
                store.avoid_grid(),
                on_surface,
                store.origin(),
                from.position,
                to.position,
            );
            out.exposed += exposed;
            out.avoid += avoid;
            out.threat += store
                .threat_grid()
                .integrate_length(on_surface, store.origin(), from.position, to.position);
        }
        Some(out)
    }

    /// 路徑曝光長度，越後段權重越高：每段乘上 (1 + 已走距離 × distance_penalty)
    pub fn integrate_path_exposure(
        &self,
        path: &[SurfaceLocation],
        variant: ExposureVariant,
        class: ObserverClass,
        distance_penalty: f32,
    ) -> f32 {
        if path.len() < 2 {
            return f32::MAX;
        }
        let mut total = 0.0;
        let mut travelled = 0.0;
        for pair in path.windows(2) {
            let stores = self.segment_stores(&pair[0], &pair[1]);
            let mut exposed = 0.0;
            for store in stores {
                exposed += store.grid(variant, class).integrate_length(
                    store.field().on_surface(),
                    store.origin(),
                    pair[0].position,
                    pair[1].position,
                );
            }
            total += exposed * (1.0 + travelled * distance_penalty);
            travelled += pair[0].position.distance(pair[1].position);
        }
        total
    }

    /// 路徑前 `max_dist` 米內的威脅長度
    pub fn integrate_path_threat(&self, path: &[SurfaceLocation], max_dist: f32) -> f32 {
        if path.len() < 2 {
            return f32::MAX;
        }
        let mut total = 0.0;
        let mut travelled = 0.0;
        for pair in path.windows(2) {
            if travelled >= max_dist {
                break;
            }
            let stores = self.segment_stores(&pair[0], &pair[1]);
            let start = pair[0].position;
            let added = start.distance(pair[1].position);
            let t = if added > 0.0 {
                ((max_dist - travelled) / added).max(0.0).min(1.0)
            } else {
                1.0
            };
            let end: Vec3<f32> = start + (pair[1].position - start) * t;
            for store in stores {
                total += store
                    .threat_grid()
                    .integrate_length(store.field().on_surface(), store.origin(), start, end);
            }
            travelled += added;
        }
        total
    }

    /// 路徑迴避長度
    pub fn integrate_path_avoid(&self, path: &[SurfaceLocation]) -> f32 {
        if path.len() < 2 {
            return f32::MAX;
        }
        let mut total = 0.0;
        for pair in path.windows(2) {
            let stores = self.segment_stores(&pair[0], &pair[1]);
            for store in stores {
                total += store.avoid_grid().integrate_length(
                    store.field().on_surface(),
                    store.origin(),
                    pair[0].position,
                    pair[1].position,
                );
            }
        }
        total
    }

    /// 線段兩端點所在區域；不同時兩者都要積分，沒有儲存的一側略過
    fn segment_stores(&self, from: &SurfaceLocation, to: &SurfaceLocation) -> Vec<&RegionExposureStore> {
        let mut stores = Vec::with_capacity(2);
        stores.extend(self.get(from.region));
        if to.region != from.region {
            stores.extend(self.get(to.region));
        }
        stores
    }
}
