/// 高度圖視線查詢
///
/// 與曝光網格無關：在每個與線段相交的區域高度圖上做 3D DDA，
/// 射線跨越高度不連續處即視為被擋
use vek::Vec3;

use crate::comp::region::{HeightField, GRID_SPACING, HEIGHT_SPACING, INV_GRID_SPACING, INV_HEIGHT_SPACING};
use crate::vision::exposure_maps::ExposureMaps;

/// 單一高度圖最多走訪的步數
const MAX_RAY_STEPS: u32 = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RayOutcome {
    Clear,
    /// 命中點（投影到射線上）
    Hit(Vec3<f32>),
}

impl RayOutcome {
    pub fn is_clear(&self) -> bool {
        matches!(self, RayOutcome::Clear)
    }
}

impl ExposureMaps {
    pub fn ray_query(&self, p0: Vec3<f32>, p1: Vec3<f32>) -> RayOutcome {
        for store in self.iter() {
            if !store.aabb().intersects_segment(p0, p1) {
                continue;
            }
            if let Some(hit) = march_height_field(store.field(), p0, p1) {
                return RayOutcome::Hit(hit);
            }
        }
        RayOutcome::Clear
    }
}

/// 在單一高度圖上行進，回傳命中點
pub fn march_height_field(field: &HeightField, p0: Vec3<f32>, p1: Vec3<f32>) -> Option<Vec3<f32>> {
    const OUT: i32 = -1;
    let origin = field.origin();
    let a = p0 - origin;
    let b = p1 - origin;

    let mut x0 = (a.x * INV_GRID_SPACING).floor() as i32;
    let mut y0 = (a.y * INV_HEIGHT_SPACING).floor() as i32;
    let mut z0 = (a.z * INV_GRID_SPACING).floor() as i32;
    let x1 = (b.x * INV_GRID_SPACING).floor() as i32;
    let y1 = (b.y * INV_HEIGHT_SPACING).floor() as i32;
    let z1 = (b.z * INV_GRID_SPACING).floor() as i32;

    let (dx, dy, dz) = (b.x - a.x, b.y - a.y, b.z - a.z);
    let sx = (x1 - x0).signum();
    let sy = (y1 - y0).signum();
    let sz = (z1 - z0).signum();

    let boundary = |cell: i32, d: f32, spacing: f32, start: f32| {
        ((cell + (d > 0.0) as i32) as f32 * spacing - start) / d
    };
    let mut cx = if x0 != x1 { boundary(x0, dx, GRID_SPACING, a.x) } else { f32::MAX };
    let mut cy = if y0 != y1 { boundary(y0, dy, HEIGHT_SPACING, a.y) } else { f32::MAX };
    let mut cz = if z0 != z1 { boundary(z0, dz, GRID_SPACING, a.z) } else { f32::MAX };

    let step_x = if dx != 0.0 { sx as f32 * GRID_SPACING / dx } else { f32::MAX };
    let step_y = if dy != 0.0 { sy as f32 * HEIGHT_SPACING / dy } else { f32::MAX };
    let step_z = if dz != 0.0 { sz as f32 * GRID_SPACING / dz } else { f32::MAX };

    let height_at = |x: i32, z: i32| field.height_checked(x, z).map_or(OUT, |h| h as i32);
    let mut c = height_at(x0, z0);
    let mut steps = 0u32;

    while x0 != x1 || y0 != y1 || z0 != z1 {
        steps += 1;
        if steps > MAX_RAY_STEPS {
            log::warn!("視線查詢超過步數上限，視為未命中");
            break;
        }

        let last_y = y0;
        if cx < cz {
            x0 += sx;
            cx += step_x;
            if x0 == x1 {
                cx = f32::MAX;
            }
        } else {
            z0 += sz;
            cz += step_z;
            if z0 == z1 {
                cz = f32::MAX;
            }
        }

        // 水平移到新格之後，把 y 推到對應位置
        let y_rel = if dy != 0.0 && y0 != y1 {
            ((cx.min(cz) - cy) / step_y).ceil()
        } else {
            0.0
        };
        let mut y_steps = (y1 - y0).abs();
        if y_rel < y_steps as f32 {
            y_steps = y_rel.max(0.0) as i32;
        }
        y0 += y_steps * sy;
        cy += y_steps as f32 * step_y;

        let d = height_at(x0, z0);
        if c > 0 && (((c <= y0) ^ (c < last_y)) || (d > 0 && ((c <= y0) ^ (d < y0)))) {
            let cell = Vec3::new(
                x0 as f32 * GRID_SPACING,
                (y0 as f32 - 0.5) * HEIGHT_SPACING,
                z0 as f32 * GRID_SPACING,
            ) + origin;
            let dir = (p1 - p0).try_normalized().unwrap_or(Vec3::unit_z());
            return Some(p0 + dir * (cell - p0).dot(dir));
        }
        if c != OUT && d == OUT {
            break;
        }
        c = d;
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 測試平地上方的視線不被擋，穿過高牆的視線被擋
    #[test]
    fn test_wall_blocks_sightline() {
        let mut field = HeightField::flat(20, 20, Vec3::zero(), 1);
        for z in 0..20 {
            field.set_height(10, z, 60);
        }

        let eye_a = Vec3::new(1.25, 1.8, 5.25);
        let eye_b = Vec3::new(9.25, 1.8, 5.25);
        assert!(march_height_field(&field, eye_a, Vec3::new(4.25, 1.8, 5.25)).is_none(), "平地上不應被擋");

        let hit = march_height_field(&field, eye_a, Vec3::new(8.25, 1.8, 5.25));
        assert!(hit.is_some(), "穿牆視線應被擋");
        let hit = hit.unwrap();
        assert!(hit.x > 4.0 && hit.x < 5.6, "命中點應在牆附近: {:?}", hit);

        assert!(march_height_field(&field, eye_b, Vec3::new(9.75, 1.8, 2.25)).is_none());
    }
}
