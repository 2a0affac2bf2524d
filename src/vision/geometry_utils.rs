use vek::{Vec2, Vec3};

/// 軸對齊包圍盒（世界座標）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3<f32>,
    pub max: Vec3<f32>,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    pub fn new(min: Vec3<f32>, max: Vec3<f32>) -> Self {
        Self { min, max }
    }

    /// 空包圍盒，包含任何點後才會變為有效
    pub fn empty() -> Self {
        Self {
            min: Vec3::broadcast(f32::INFINITY),
            max: Vec3::broadcast(f32::NEG_INFINITY),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.min.x <= self.max.x && self.min.y <= self.max.y && self.min.z <= self.max.z
    }

    pub fn include_point(&mut self, p: Vec3<f32>) {
        self.min = Vec3::partial_min(self.min, p);
        self.max = Vec3::partial_max(self.max, p);
    }

    /// 把 Y 壓平到 0，只保留 XZ 範圍
    pub fn flattened(&self) -> Aabb {
        Aabb::new(
            Vec3::new(self.min.x, 0.0, self.min.z),
            Vec3::new(self.max.x, 0.0, self.max.z),
        )
    }

    pub fn contains_point_xz(&self, p: Vec3<f32>) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.z >= self.min.z && p.z <= self.max.z
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// XZ 四角，順序與觀察者邊界四邊形相同
    pub fn corners_xz(&self) -> [Vec3<f32>; 4] {
        [
            Vec3::new(self.min.x, 0.0, self.min.z),
            Vec3::new(self.min.x, 0.0, self.max.z),
            Vec3::new(self.max.x, 0.0, self.max.z),
            Vec3::new(self.max.x, 0.0, self.min.z),
        ]
    }

    /// 線段與包圍盒相交（slab 測試）
    pub fn intersects_segment(&self, p0: Vec3<f32>, p1: Vec3<f32>) -> bool {
        let dir = p1 - p0;
        let mut t_min = 0.0f32;
        let mut t_max = 1.0f32;

        for axis in 0..3 {
            let (origin, d, lo, hi) = (p0[axis], dir[axis], self.min[axis], self.max[axis]);
            if d.abs() < 1e-8 {
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t0 = (lo - origin) * inv;
            let mut t1 = (hi - origin) * inv;
            if t0 > t1 {
                std::mem::swap(&mut t0, &mut t1);
            }
            t_min = t_min.max(t0);
            t_max = t_max.min(t1);
            if t_min > t_max {
                return false;
            }
        }
        true
    }
}

pub struct GeometryUtils;

impl GeometryUtils {
    /// 點是否在四邊形內（XZ 平面，不論繞行方向）
    pub fn quad_contains_point_xz(quad: &[Vec3<f32>; 4], p: Vec3<f32>) -> bool {
        let mut positive = 0;
        let mut negative = 0;
        for i in 0..4 {
            let a = quad[i];
            let b = quad[(i + 1) % 4];
            let cross = Self::cross_xz(b - a, p - a);
            if cross > 0.0 {
                positive += 1;
            } else if cross < 0.0 {
                negative += 1;
            }
        }
        positive == 0 || negative == 0
    }

    /// XZ 平面上的外積
    pub fn cross_xz(u: Vec3<f32>, v: Vec3<f32>) -> f32 {
        u.x * v.z - u.z * v.x
    }

    /// 線段相交檢測（XZ 平面），回傳第一條線段上的參數 t
    pub fn segment_segment_xz(
        p1: Vec3<f32>, q1: Vec3<f32>,
        p2: Vec3<f32>, q2: Vec3<f32>,
    ) -> Option<f32> {
        let d1 = Vec2::new(q1.x - p1.x, q1.z - p1.z);
        let d2 = Vec2::new(q2.x - p2.x, q2.z - p2.z);
        let cross = d1.x * d2.y - d1.y * d2.x;

        if cross.abs() < 1e-6 {
            return None; // 平行線段
        }

        let w = Vec2::new(p2.x - p1.x, p2.z - p1.z);
        let t1 = (w.x * d2.y - w.y * d2.x) / cross;
        let t2 = (w.x * d1.y - w.y * d1.x) / cross;

        if (0.0..=1.0).contains(&t1) && (0.0..=1.0).contains(&t2) {
            Some(t1)
        } else {
            None
        }
    }

    /// 觀察者邊界四邊形與包圍盒的交集（XZ），結果的 Y 為 0
    ///
    /// 收集落在包圍盒內的四邊形頂點、落在四邊形內的包圍盒頂點，
    /// 以及所有邊與邊的交點；沒有任何點時回傳空包圍盒
    pub fn intersect_quad_aabb_xz(quad: &[Vec3<f32>; 4], aabb: &Aabb) -> Aabb {
        let flat = aabb.flattened();
        let box_corners = flat.corners_xz();
        let mut result = Aabb::empty();

        for p in quad.iter() {
            if flat.contains_point_xz(*p) {
                result.include_point(Vec3::new(p.x, 0.0, p.z));
            }
        }

        for p in box_corners.iter() {
            if Self::quad_contains_point_xz(quad, *p) {
                result.include_point(*p);
            }
        }

        let mut b_quad = quad[3];
        for a_quad in quad.iter() {
            let mut b_box = box_corners[3];
            for a_box in box_corners.iter() {
                if let Some(t) = Self::segment_segment_xz(*a_quad, b_quad, *a_box, b_box) {
                    let hit = *a_quad + (b_quad - *a_quad) * t;
                    result.include_point(Vec3::new(hit.x, 0.0, hit.z));
                }
                b_box = *a_box;
            }
            b_quad = *a_quad;
        }

        result
    }

    /// 兩個球在 XZ 平面上的最小包覆球（回傳圓心與半徑）
    pub fn combine_circles_xz(
        c0: Vec2<f32>, r0: f32,
        c1: Vec2<f32>, r1: f32,
    ) -> (Vec2<f32>, f32) {
        let offset = c1 - c0;
        let dist = offset.magnitude();
        if dist + r1 <= r0 {
            return (c0, r0);
        }
        if dist + r0 <= r1 {
            return (c1, r1);
        }
        let radius = (dist + r0 + r1) * 0.5;
        let center = c0 + offset * ((radius - r0) / dist);
        (center, radius)
    }
}
