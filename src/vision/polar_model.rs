/// 極座標視野模型
///
/// 四個參數 (a, b, c, d) 描述隨角度變化的視距：
/// r1 = a / (1 - b·cosθ)，r2 = c / sqrt(1 - d·cosθ)，
/// r1 > 0 時有效半徑取兩者較小值，否則為 r2。c == 0 表示停用。
/// θ 為方向與觀察者前方的夾角，b 與 d 越大視野越往前偏
use serde::{Deserialize, Serialize};
use vek::{Vec2, Vec3};

use crate::comp::observer::Locator;
use crate::comp::region::INV_GRID_SPACING;

/// 世界座標邊界的外擴量（米）
pub const BOUNDS_PADDING: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VisibilityModel {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl VisibilityModel {
    pub const DISABLED: VisibilityModel = VisibilityModel {
        a: 0.0,
        b: 0.0,
        c: 0.0,
        d: 0.0,
    };

    pub fn new(a: f32, b: f32, c: f32, d: f32) -> Self {
        Self { a, b, c, d }
    }

    /// 圓形視野
    pub fn circle(radius: f32) -> Self {
        Self::new(radius, 0.0, radius, 0.0)
    }

    /// 只有橢圓項的前偏視野
    pub fn forward(c: f32, d: f32) -> Self {
        Self::new(0.0, 0.0, c, d)
    }

    pub fn is_enabled(&self) -> bool {
        self.c != 0.0
    }

    /// 半徑換成格單位
    pub fn in_cells(&self) -> Self {
        Self::new(self.a * INV_GRID_SPACING, self.b, self.c * INV_GRID_SPACING, self.d)
    }

    /// 回傳 (r1, r2)
    pub fn radii(&self, cos_theta: f32) -> (f32, f32) {
        let r1 = self.a / (1.0 - self.b * cos_theta);
        let r2 = self.c / (1.0 - self.d * cos_theta).sqrt();
        (r1, r2)
    }

    /// 夾角餘弦對應的有效半徑
    pub fn radius(&self, cos_theta: f32) -> f32 {
        let (r1, r2) = self.radii(cos_theta);
        if r1 > 0.0 {
            r1.min(r2)
        } else {
            r2
        }
    }

    pub fn radius_at_angle(&self, theta: f32) -> f32 {
        self.radius(theta.cos())
    }

    /// 本地空間邊界，回傳 (min, max)，x 為側向、y 為前方
    pub fn bounds_ls(&self) -> (Vec2<f32>, Vec2<f32>) {
        let (a, b, c, d) = (self.a, self.b, self.c, self.d);

        let max_x = if d != 0.0 {
            (2.0 * c * c * (1.0 - (1.0 - d * d).sqrt()) / (d * d)).sqrt()
        } else {
            c
        };
        let max_z = c / (1.0 - d).sqrt();
        let min_z = (-a / (1.0 + b)).max(-c / (1.0 + d).sqrt());

        (Vec2::new(-max_x, min_z), Vec2::new(max_x, max_z))
    }

    /// 世界空間邊界四邊形
    ///
    /// 角點順序 (minX,minZ) (minX,maxZ) (maxX,maxZ) (maxX,minZ)，Y 為 0。
    /// 對稱正方形只做平移，其餘依定位器旋轉
    pub fn bounds_ws(&self, locator: &Locator) -> [Vec3<f32>; 4] {
        let (mut min, mut max) = self.bounds_ls();
        min -= Vec2::broadcast(BOUNDS_PADDING);
        max += Vec2::broadcast(BOUNDS_PADDING);

        let local = [
            Vec3::new(min.x, 0.0, min.y),
            Vec3::new(min.x, 0.0, max.y),
            Vec3::new(max.x, 0.0, max.y),
            Vec3::new(max.x, 0.0, min.y),
        ];

        let symmetric = min.x == -max.x && min.y == -max.y && min.x == min.y;
        let pos = Vec3::new(locator.position.x, 0.0, locator.position.z);
        let flat = Locator::new(pos, locator.yaw);

        let mut out = [Vec3::zero(); 4];
        for (dst, p) in out.iter_mut().zip(local.iter()) {
            *dst = if symmetric {
                pos + *p
            } else {
                flat.transform_point(*p)
            };
        }
        out
    }
}
