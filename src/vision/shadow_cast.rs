/// 陰影投射
///
/// 從觀察者所在格向目標矩形周界的每一格投射射線，對每個遮蔽高度圖各做一次，
/// 結果取 AND（必須對所有遮蔽物都沒被擋住才算曝光），再把同類別各觀察者的結果取 OR。
///
/// 所有高度與斜率都以原始高度單位計算，水平距離以格為單位
use std::sync::Arc;

use vek::{Vec2, Vec3};

use crate::comp::observer::{Observer, ObserverClass};
use crate::comp::region::{HeightField, RegionKey, INV_GRID_SPACING, INV_HEIGHT_SPACING};
use crate::config::CrouchTuning;
use crate::vision::bitmap_grid::ExposureGrid;
use crate::vision::geometry_utils::{Aabb, GeometryUtils};
use crate::vision::polar_model::VisibilityModel;

/// 目標區域上的投射矩形（格座標，可能超出區域範圍）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CastRect {
    pub start_x: i32,
    pub start_z: i32,
    pub run_x: i32,
    pub run_z: i32,
}

impl CastRect {
    /// 由邊界四邊形與區域包圍盒的交集建立；交集為空時回傳 None
    pub fn from_intersection(isect: &Aabb, origin: Vec3<f32>) -> Option<Self> {
        if !isect.is_valid() {
            return None;
        }
        let lo = (isect.min - origin) * INV_GRID_SPACING;
        let hi = (isect.max - origin) * INV_GRID_SPACING;
        let start_x = lo.x.floor() as i32;
        let start_z = lo.z.floor() as i32;
        let end_x = hi.x.ceil() as i32;
        let end_z = hi.z.ceil() as i32;

        Some(Self {
            start_x,
            start_z,
            run_x: (end_x - start_x).max(1),
            run_z: (end_z - start_z).max(1),
        })
    }

    pub fn perimeter(&self) -> PerimeterCells {
        PerimeterCells {
            rect: *self,
            next: 0,
            total: 2 * (self.run_x + self.run_z),
        }
    }
}

/// 矩形周界格，逐邊列舉：下緣往 +x、右緣往 +z、上緣往 -x、左緣往 -z
#[derive(Debug, Clone)]
pub struct PerimeterCells {
    rect: CastRect,
    next: i32,
    total: i32,
}

impl Iterator for PerimeterCells {
    type Item = (i32, i32);

    fn next(&mut self) -> Option<(i32, i32)> {
        if self.next >= self.total {
            return None;
        }
        let i = self.next;
        self.next += 1;

        let CastRect { start_x: sx, start_z: sz, run_x: rx, run_z: rz } = self.rect;
        let cell = if i < rx {
            (sx + i, sz)
        } else if i < rx + rz {
            (sx + rx, sz + (i - rx))
        } else if i < 2 * rx + rz {
            (sx + rx - (i - rx - rz), sz + rz)
        } else {
            (sx, sz + rz - (i - 2 * rx - rz))
        };
        Some(cell)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = (self.total - self.next).max(0) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for PerimeterCells {}

/// 一個遮蔽者沿射線形成的斜率帶
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CasterBand {
    pub min: f32,
    pub max: f32,
}

impl CasterBand {
    pub const EMPTY: CasterBand = CasterBand {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
    };

    pub fn include(&mut self, slope: f32) {
        if slope < self.min {
            self.min = slope;
        }
        if slope > self.max {
            self.max = slope;
        }
    }

    /// NaN 一律視為不在帶內
    pub fn contains(&self, slope: f32) -> bool {
        self.min <= slope && slope <= self.max
    }
}

/// 以目標區域為基準的遮蔽高度圖
#[derive(Debug, Clone)]
pub struct OccluderRef {
    pub field: Arc<HeightField>,
    pub offset_x: i32,
    pub offset_z: i32,
    /// 原始高度單位
    pub offset_y: f32,
}

impl OccluderRef {
    pub fn relative_to(field: Arc<HeightField>, target_origin: Vec3<f32>) -> Self {
        let delta = field.origin() - target_origin;
        Self {
            offset_x: (delta.x * INV_GRID_SPACING).round() as i32,
            offset_z: (delta.z * INV_GRID_SPACING).round() as i32,
            offset_y: delta.y * INV_HEIGHT_SPACING,
            field,
        }
    }

    fn contains(&self, x: i32, z: i32) -> bool {
        self.field.in_bounds(x - self.offset_x, z - self.offset_z)
    }
}

/// 轉換到目標區域格空間的觀察者
#[derive(Debug, Clone)]
pub struct ObserverCast {
    pub cell_x: i32,
    pub cell_z: i32,
    /// 眼睛高度（原始單位，相對目標原點）
    pub eye_y: f32,
    pub forward: Vec2<f32>,
    /// 半徑已換成格
    pub model: VisibilityModel,
    pub rect: Option<CastRect>,
}

impl ObserverCast {
    pub fn new(observer: &Observer, target: &HeightField) -> Self {
        let origin = target.origin();
        let local = (observer.locator.position - origin) * INV_GRID_SPACING;
        let eye = observer.eye_position() - origin;
        let isect = GeometryUtils::intersect_quad_aabb_xz(&observer.exposure_bounds, &target.aabb());

        Self {
            cell_x: local.x.floor() as i32,
            cell_z: local.z.floor() as i32,
            eye_y: eye.y * INV_HEIGHT_SPACING,
            forward: observer.locator.forward_xz(),
            model: observer.exposure_model.in_cells(),
            rect: CastRect::from_intersection(&isect, origin),
        }
    }
}

/// 一個（目標區域 × 一批觀察者）的投射工作
#[derive(Debug, Clone)]
pub struct ShadowCastJob {
    pub class: ObserverClass,
    pub target: RegionKey,
    pub target_field: Arc<HeightField>,
    pub occluders: Vec<OccluderRef>,
    pub observers: Vec<ObserverCast>,
    pub crouch: CrouchTuning,
}

/// 投射結果，由收集步驟 OR 進目標的 Scratch
#[derive(Debug, Clone)]
pub struct JobOutput {
    pub target: RegionKey,
    pub class: ObserverClass,
    pub grid: ExposureGrid,
}

/// 執行一個投射工作
pub fn run_job(job: &ShadowCastJob) -> JobOutput {
    let (sx, sz) = (job.target_field.size_x(), job.target_field.size_z());
    let mut output = ExposureGrid::new(sx, sz);
    let mut outer = ExposureGrid::new(sx, sz);
    let mut inner = ExposureGrid::new(sx, sz);

    for observer in job.observers.iter() {
        let rect = match observer.rect {
            Some(rect) => rect,
            None => continue,
        };
        cast_observer(job, observer, &rect, &mut outer, &mut inner);
        output.or_assign(&outer);
    }

    JobOutput {
        target: job.target,
        class: job.class,
        grid: output,
    }
}

/// 單一觀察者對目標的結果寫入 `outer`
pub fn cast_observer(
    job: &ShadowCastJob,
    observer: &ObserverCast,
    rect: &CastRect,
    outer: &mut ExposureGrid,
    inner: &mut ExposureGrid,
) {
    outer.fill();
    for occluder in job.occluders.iter() {
        inner.clear();
        for (px, pz) in rect.perimeter() {
            cast_ray(inner, &job.target_field, occluder, observer, &job.crouch, px, pz);
        }
        outer.and_assign(inner);
    }
}

/// 沿一條射線標記可見格
fn cast_ray(
    grid: &mut ExposureGrid,
    target: &HeightField,
    occluder: &OccluderRef,
    observer: &ObserverCast,
    crouch: &CrouchTuning,
    px: i32,
    pz: i32,
) {
    let (ox, oz) = (observer.cell_x, observer.cell_z);
    let dx = px - ox;
    let dz = pz - oz;
    let dist_sqr = (dx * dx + dz * dz) as f32;
    if dist_sqr == 0.0 {
        return;
    }

    let cos_theta = (observer.forward.x * dx as f32 + observer.forward.y * dz as f32) / dist_sqr.sqrt();
    let (r1, r2) = observer.model.radii(cos_theta);
    let mut rad_sqr = dist_sqr;
    if r1 > 0.0 {
        rad_sqr = rad_sqr.min(r1 * r1);
    }
    rad_sqr = rad_sqr.min(r2 * r2);
    if !(rad_sqr > 0.0) {
        return;
    }

    let step_x = dx.signum();
    let step_z = dz.signum();
    let abs_dx = dx.abs();
    let abs_dz = dz.abs();
    let mut err = abs_dx - abs_dz;
    let (two_dx, two_dz) = (abs_dx << 1, abs_dz << 1);

    let (mut x, mut z) = (ox, oz);
    let step = |x: &mut i32, z: &mut i32, err: &mut i32| {
        if *err > 0 {
            *err -= two_dz;
            *x += step_x;
        } else {
            *err += two_dx;
            *z += step_z;
        }
    };
    let dist_at = |x: i32, z: i32| ((x - ox) * (x - ox) + (z - oz) * (z - oz)) as f32;

    // 遮蔽物範圍之外：沒有東西擋
    while !occluder.contains(x, z) {
        if grid.in_bounds(x, z) {
            grid.set_bit(x as u32, z as u32);
        }
        let d_sqr = dist_at(x, z);
        step(&mut x, &mut z, &mut err);
        if d_sqr >= rad_sqr {
            return;
        }
    }

    let y_off = occluder.offset_y;
    let mut casters = [CasterBand::EMPTY; 2];
    let mut caster: i32 = -1;
    let mut prev_h = y_off;

    loop {
        let occ_h = occluder
            .field
            .height_checked(x - occluder.offset_x, z - occluder.offset_z)
            .map_or(y_off, |h| y_off + h as f32);
        let test_h = target.height_checked(x, z).unwrap_or(0) as f32;
        let d_sqr = dist_at(x, z);
        let d_inv = 1.0 / d_sqr.sqrt();

        if occ_h != y_off {
            // 空洞之後出現新的遮蔽者，保留第一個並覆寫第二個
            if prev_h == y_off {
                caster = (caster + 1).min(1);
                casters[1] = CasterBand::EMPTY;
            }
            casters[caster as usize].include((occ_h - observer.eye_y) * d_inv);
        }
        prev_h = occ_h;

        let crouch_slope = (test_h - observer.eye_y + crouch.height_bias(d_sqr)) * d_inv;
        if test_h != 0.0 && !casters[0].contains(crouch_slope) && !casters[1].contains(crouch_slope) {
            if grid.in_bounds(x, z) {
                grid.set_bit(x as u32, z as u32);
            }
        }

        step(&mut x, &mut z, &mut err);
        if d_sqr >= rad_sqr {
            break;
        }
    }
}
