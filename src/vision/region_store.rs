/// 區域曝光儲存
///
/// 每個有高度圖的區域一份：每個觀察者類別各有 Normal、StealthMasked、Scratch 三張網格，
/// 另有 Avoid 與 Threat 網格以及每類別的「有任何位元」旗標
use std::sync::Arc;

use vek::Vec3;

use crate::comp::observer::ObserverClass;
use crate::comp::region::{HeightField, RegionKey, INV_GRID_SPACING};
use crate::vision::bitmap_grid::ExposureGrid;
use crate::vision::geometry_utils::Aabb;

/// 曝光網格種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExposureVariant {
    /// 已發布的曝光結果（只含可行走格）
    Normal,
    /// Normal 扣除隱蔽地形
    StealthMasked,
    /// 計算中的暫存結果
    Scratch,
}

pub struct RegionExposureStore {
    key: RegionKey,
    field: Arc<HeightField>,
    origin: Vec3<f32>,
    normal: [ExposureGrid; ObserverClass::COUNT],
    stealth_masked: [ExposureGrid; ObserverClass::COUNT],
    scratch: [ExposureGrid; ObserverClass::COUNT],
    avoid: ExposureGrid,
    threat: ExposureGrid,
    any: [bool; ObserverClass::COUNT],
    any_avoid: bool,
    any_threat: bool,
}

impl RegionExposureStore {
    /// 配置並清零
    pub fn new(key: RegionKey, field: Arc<HeightField>) -> Self {
        let (sx, sz) = (field.size_x(), field.size_z());
        debug_assert!(sx > 0 && sz > 0, "區域尺寸不可為零");
        debug_assert!(
            field.on_surface().size_x() == sx && field.stealth().size_x() == sx,
            "遮罩尺寸與高度圖不符"
        );

        Self {
            key,
            origin: field.origin(),
            normal: std::array::from_fn(|_| ExposureGrid::new(sx, sz)),
            stealth_masked: std::array::from_fn(|_| ExposureGrid::new(sx, sz)),
            scratch: std::array::from_fn(|_| ExposureGrid::new(sx, sz)),
            avoid: ExposureGrid::new(sx, sz),
            threat: ExposureGrid::new(sx, sz),
            any: [false; ObserverClass::COUNT],
            any_avoid: false,
            any_threat: false,
            field,
        }
    }

    pub fn key(&self) -> RegionKey {
        self.key
    }

    pub fn field(&self) -> &Arc<HeightField> {
        &self.field
    }

    pub fn origin(&self) -> Vec3<f32> {
        self.origin
    }

    pub fn aabb(&self) -> Aabb {
        self.field.aabb()
    }

    pub fn grid(&self, variant: ExposureVariant, class: ObserverClass) -> &ExposureGrid {
        let i = class.index();
        match variant {
            ExposureVariant::Normal => &self.normal[i],
            ExposureVariant::StealthMasked => &self.stealth_masked[i],
            ExposureVariant::Scratch => &self.scratch[i],
        }
    }

    pub fn avoid_grid(&self) -> &ExposureGrid {
        &self.avoid
    }

    pub fn threat_grid(&self) -> &ExposureGrid {
        &self.threat
    }

    pub fn query(&self, variant: ExposureVariant, class: ObserverClass, x: i32, z: i32) -> bool {
        self.grid(variant, class).test_checked(x, z)
    }

    pub fn query_avoid(&self, x: i32, z: i32) -> bool {
        self.avoid.test_checked(x, z)
    }

    pub fn query_threat(&self, x: i32, z: i32) -> bool {
        self.threat.test_checked(x, z)
    }

    pub fn any(&self, class: ObserverClass) -> bool {
        self.any[class.index()]
    }

    pub fn any_avoid(&self) -> bool {
        self.any_avoid
    }

    pub fn any_threat(&self) -> bool {
        self.any_threat
    }

    /// 清除所有類別的 Normal 與 StealthMasked
    pub fn clear_client_visible(&mut self) {
        for grid in self.normal.iter_mut().chain(self.stealth_masked.iter_mut()) {
            grid.clear();
        }
        self.any = [false; ObserverClass::COUNT];
    }

    /// 清除單一類別的已發布結果
    pub fn clear_class(&mut self, class: ObserverClass) {
        let i = class.index();
        self.normal[i].clear();
        self.stealth_masked[i].clear();
        self.any[i] = false;
    }

    pub fn clear_scratch(&mut self, class: ObserverClass) {
        self.scratch[class.index()].clear();
    }

    pub fn scratch_mut(&mut self, class: ObserverClass) -> &mut ExposureGrid {
        &mut self.scratch[class.index()]
    }

    /// 把暫存結果發布為 Normal 與 StealthMasked
    pub fn publish(&mut self, class: ObserverClass) {
        let i = class.index();
        self.any[i] = self.normal[i].assign_and(&self.scratch[i], self.field.on_surface());
        self.stealth_masked[i].assign_and_not(&self.normal[i], self.field.stealth());
    }

    pub fn clear_avoid(&mut self) {
        self.avoid.clear();
        self.any_avoid = false;
    }

    pub fn avoid_mut(&mut self) -> &mut ExposureGrid {
        &mut self.avoid
    }

    pub fn set_any_avoid(&mut self) {
        self.any_avoid = true;
    }

    pub fn clear_threat(&mut self) {
        self.threat.clear();
        self.any_threat = false;
    }

    /// 同時取得威脅網格（可寫）與某類別的 Normal（唯讀）
    pub fn threat_and_normal_mut(&mut self, class: ObserverClass) -> (&mut ExposureGrid, &ExposureGrid) {
        (&mut self.threat, &self.normal[class.index()])
    }

    pub fn set_any_threat(&mut self) {
        self.any_threat = true;
    }

    /// 世界座標所在格
    pub fn cell_of(&self, p: Vec3<f32>) -> (i32, i32) {
        self.field.cell_of(p)
    }

    /// 就近有效格
    ///
    /// 檢查所在格與周圍八格，取可行走且離理想位置最近者
    pub fn find_nearest_valid_cell(&self, p: Vec3<f32>) -> Option<(i32, i32)> {
        let ideal_x = (p.x - self.origin.x) * INV_GRID_SPACING;
        let ideal_z = (p.z - self.origin.z) * INV_GRID_SPACING;
        let cx = ideal_x.floor() as i32;
        let cz = ideal_z.floor() as i32;

        let mut best: Option<(f32, i32, i32)> = None;
        for z in cz - 1..=cz + 1 {
            for x in cx - 1..=cx + 1 {
                if !self.field.is_on_surface(x, z) {
                    continue;
                }
                let dx = x as f32 + 0.5 - ideal_x;
                let dz = z as f32 + 0.5 - ideal_z;
                let d = dx * dx + dz * dz;
                if best.map_or(true, |b| d < b.0) {
                    best = Some((d, x, z));
                }
            }
        }
        best.map(|(_, x, z)| (x, z))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> RegionExposureStore {
        let field = HeightField::flat(8, 8, Vec3::zero(), 1)
            .with_stealth_cells([(2, 2)])
            .with_off_surface_cells([(5, 5)]);
        RegionExposureStore::new(RegionKey::new(0, 1), Arc::new(field))
    }

    /// 測試發布：不可行走格被濾除，隱蔽格不出現在 StealthMasked
    #[test]
    fn test_publish_masks() {
        let mut s = store();
        let class = ObserverClass::EnemyNpcs;
        s.scratch_mut(class).fill();
        s.publish(class);

        assert!(s.any(class));
        assert!(s.query(ExposureVariant::Normal, class, 2, 2));
        assert!(!s.query(ExposureVariant::StealthMasked, class, 2, 2), "隱蔽格應被遮蔽");
        assert!(!s.query(ExposureVariant::Normal, class, 5, 5), "不可行走格不應曝光");
        assert!(!s.any(ObserverClass::Player));
    }

    /// 測試清除單一類別與全部
    #[test]
    fn test_clear_class() {
        let mut s = store();
        for class in ObserverClass::ALL {
            s.scratch_mut(class).set_bit(1, 1);
            s.publish(class);
        }
        s.clear_class(ObserverClass::Player);
        assert!(!s.any(ObserverClass::Player));
        assert!(!s.query(ExposureVariant::Normal, ObserverClass::Player, 1, 1));
        assert!(s.query(ExposureVariant::Normal, ObserverClass::EnemyNpcs, 1, 1));

        s.clear_client_visible();
        assert!(!s.query(ExposureVariant::StealthMasked, ObserverClass::EnemyNpcs, 1, 1));
        assert!(!s.any(ObserverClass::FutureEnemyNpcs));
    }

    /// 測試就近有效格會避開不可行走格
    #[test]
    fn test_find_nearest_valid_cell() {
        let s = store();
        assert_eq!(s.find_nearest_valid_cell(Vec3::new(1.2, 0.0, 1.2)), Some((2, 2)));

        // (5,5) 不可行走，應挑相鄰格
        let cell = s.find_nearest_valid_cell(Vec3::new(2.75, 0.0, 2.75)).unwrap();
        assert_ne!(cell, (5, 5));
        assert!((cell.0 - 5).abs() <= 1 && (cell.1 - 5).abs() <= 1);

        assert_eq!(s.find_nearest_valid_cell(Vec3::new(-10.0, 0.0, -10.0)), None);
    }
}
