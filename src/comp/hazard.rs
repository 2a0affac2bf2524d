use std::sync::Arc;

use vek::{Vec2, Vec3};

use crate::comp::observer::ObserverClass;
use crate::comp::region::HeightField;
use crate::vision::geometry_utils::{Aabb, GeometryUtils};

/// 危險球體（例如屍體），周圍格會被標記為迴避
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HazardSphere {
    pub center: Vec3<f32>,
    pub radius: f32,
}

impl HazardSphere {
    pub fn new(center: Vec3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(
            self.center - Vec3::broadcast(self.radius),
            self.center + Vec3::broadcast(self.radius),
        )
    }

    /// 由屍體各部位的包圍球合併成一顆
    ///
    /// XZ 取最小包覆圓，Y 取各部位中心的平均
    pub fn from_body_parts(parts: &[(Vec3<f32>, f32)]) -> Option<Self> {
        let (first, rest) = parts.split_first()?;
        let mut center = Vec2::new(first.0.x, first.0.z);
        let mut radius = first.1;
        let mut sum_y = first.0.y;

        for (c, r) in rest {
            let (merged, merged_r) =
                GeometryUtils::combine_circles_xz(center, radius, Vec2::new(c.x, c.z), *r);
            center = merged;
            radius = merged_r;
            sum_y += c.y;
        }

        let y = sum_y / parts.len() as f32;
        Some(Self::new(Vec3::new(center.x, y, center.y), radius))
    }
}

/// 動態高度來源（移動平台、臨時掩體等非常駐高度圖）
#[derive(Debug, Clone)]
pub struct DynamicHeightSource {
    pub field: Arc<HeightField>,
    /// 作用的觀察者類別位元
    pub class_mask: u8,
}

impl DynamicHeightSource {
    pub fn new(field: Arc<HeightField>, classes: &[ObserverClass]) -> Self {
        Self {
            field,
            class_mask: classes.iter().fold(0, |m, c| m | c.mask()),
        }
    }

    pub fn applies_to(&self, class: ObserverClass) -> bool {
        self.class_mask & class.mask() != 0
    }

    pub fn aabb(&self) -> Aabb {
        self.field.aabb()
    }
}
