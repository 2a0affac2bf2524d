/// 導航區域與高度圖
///
/// 區域由導航子系統提供，本引擎只讀取：格狀高度資料（0 表示空洞）、
/// 可行走遮罩、隱蔽地形遮罩、世界原點與穩定索引
use std::sync::Arc;

use parking_lot::RwLock;
use vek::Vec3;

use crate::vision::bitmap_grid::ExposureGrid;
use crate::vision::geometry_utils::Aabb;

/// 水平格距（米）
pub const GRID_SPACING: f32 = 0.5;
pub const INV_GRID_SPACING: f32 = 1.0 / GRID_SPACING;
/// 每單位原始高度對應的米數
pub const HEIGHT_SPACING: f32 = 0.078125;
pub const INV_HEIGHT_SPACING: f32 = 1.0 / HEIGHT_SPACING;

/// 區域穩定索引加世代，索引被重用後舊鍵即失效
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionKey {
    pub index: u32,
    pub generation: u32,
}

impl RegionKey {
    pub fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }
}

/// 量化高度圖
#[derive(Debug, Clone)]
pub struct HeightField {
    size_x: u32,
    size_z: u32,
    /// 最高的原始高度，用於包圍盒
    size_y: u32,
    /// 世界座標原點（包圍盒最小角）
    origin: Vec3<f32>,
    heights: Vec<u8>,
    on_surface: ExposureGrid,
    stealth: ExposureGrid,
}

impl HeightField {
    /// 由原始高度建立，非空洞格皆視為可行走
    pub fn new(size_x: u32, size_z: u32, origin: Vec3<f32>, mut heights: Vec<u8>) -> Self {
        let cells = (size_x * size_z) as usize;
        debug_assert_eq!(heights.len(), cells, "高度資料長度與尺寸不符");
        heights.resize(cells, 0);

        let mut on_surface = ExposureGrid::new(size_x, size_z);
        let mut size_y = 0u32;
        for z in 0..size_z {
            for x in 0..size_x {
                let h = heights[(z * size_x + x) as usize];
                if h != 0 {
                    on_surface.set_bit(x, z);
                    size_y = size_y.max(h as u32);
                }
            }
        }

        Self {
            size_x,
            size_z,
            size_y,
            origin,
            heights,
            on_surface,
            stealth: ExposureGrid::new(size_x, size_z),
        }
    }

    /// 平坦高度圖
    pub fn flat(size_x: u32, size_z: u32, origin: Vec3<f32>, raw_height: u8) -> Self {
        Self::new(size_x, size_z, origin, vec![raw_height; (size_x * size_z) as usize])
    }

    /// 設定單格高度並同步可行走遮罩
    pub fn set_height(&mut self, x: u32, z: u32, raw_height: u8) {
        self.heights[(z * self.size_x + x) as usize] = raw_height;
        if raw_height == 0 {
            self.on_surface.clear_bit(x, z);
        } else {
            self.on_surface.set_bit(x, z);
            self.size_y = self.size_y.max(raw_height as u32);
        }
    }

    /// 標記隱蔽地形（例如草叢）
    pub fn with_stealth_cells<I: IntoIterator<Item = (u32, u32)>>(mut self, cells: I) -> Self {
        for (x, z) in cells {
            self.stealth.set_bit(x, z);
        }
        self
    }

    /// 有高度但不可行走的格（例如牆頂）
    pub fn with_off_surface_cells<I: IntoIterator<Item = (u32, u32)>>(mut self, cells: I) -> Self {
        for (x, z) in cells {
            self.on_surface.clear_bit(x, z);
        }
        self
    }

    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    pub fn size_z(&self) -> u32 {
        self.size_z
    }

    pub fn origin(&self) -> Vec3<f32> {
        self.origin
    }

    pub fn heights(&self) -> &[u8] {
        &self.heights
    }

    pub fn on_surface(&self) -> &ExposureGrid {
        &self.on_surface
    }

    pub fn stealth(&self) -> &ExposureGrid {
        &self.stealth
    }

    pub fn in_bounds(&self, x: i32, z: i32) -> bool {
        (x as u32) < self.size_x && (z as u32) < self.size_z
    }

    pub fn height(&self, x: u32, z: u32) -> u8 {
        self.heights[(z * self.size_x + x) as usize]
    }

    /// 越界回傳 None
    pub fn height_checked(&self, x: i32, z: i32) -> Option<u8> {
        if self.in_bounds(x, z) {
            Some(self.height(x as u32, z as u32))
        } else {
            None
        }
    }

    pub fn is_on_surface(&self, x: i32, z: i32) -> bool {
        self.on_surface.test_checked(x, z)
    }

    pub fn is_stealth(&self, x: i32, z: i32) -> bool {
        self.stealth.test_checked(x, z)
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::new(
            self.origin,
            self.origin
                + Vec3::new(
                    self.size_x as f32 * GRID_SPACING,
                    self.size_y as f32 * HEIGHT_SPACING,
                    self.size_z as f32 * GRID_SPACING,
                ),
        )
    }

    /// 世界座標所在格（向下取整，可能越界）
    pub fn cell_of(&self, p: Vec3<f32>) -> (i32, i32) {
        let local = (p - self.origin) * INV_GRID_SPACING;
        (local.x.floor() as i32, local.z.floor() as i32)
    }

    /// 格中心的世界座標，Y 為該格高度
    pub fn cell_center(&self, x: u32, z: u32) -> Vec3<f32> {
        self.origin
            + Vec3::new(
                (x as f32 + 0.5) * GRID_SPACING,
                self.height(x, z) as f32 * HEIGHT_SPACING,
                (z as f32 + 0.5) * GRID_SPACING,
            )
    }
}

/// 導航區域
#[derive(Debug, Clone)]
pub struct Region {
    pub key: RegionKey,
    pub name: String,
    pub height_field: Option<Arc<HeightField>>,
}

impl Region {
    pub fn aabb(&self) -> Option<Aabb> {
        self.height_field.as_ref().map(|f| f.aabb())
    }
}

/// 區域提供者
///
/// 由導航子系統實作；引擎透過它列舉區域、解析區域鍵，以及把觀察者貼回可行走表面
pub trait RegionProvider: Send + Sync {
    /// 目前載入的所有區域
    fn regions(&self) -> Vec<Arc<Region>>;

    /// 解析區域鍵；世代不符或已卸載時回傳 None
    fn resolve(&self, key: RegionKey) -> Option<Arc<Region>>;

    /// 在半徑內尋找最近的可行走點，可能落在其他區域上
    fn find_nearest_surface(
        &self,
        start: RegionKey,
        pos: Vec3<f32>,
        radius: f32,
    ) -> Option<(RegionKey, Vec3<f32>)> {
        nearest_surface_point(&self.regions(), start, pos, radius)
    }
}

/// 最近可行走點搜尋
///
/// 若位置已在起始區域的可行走格上則原樣回傳；否則在所有包圍盒距離半徑內的區域中
/// 找格中心最近的可行走格
pub fn nearest_surface_point(
    regions: &[Arc<Region>],
    start: RegionKey,
    pos: Vec3<f32>,
    radius: f32,
) -> Option<(RegionKey, Vec3<f32>)> {
    if let Some(field) = regions
        .iter()
        .find(|r| r.key == start)
        .and_then(|r| r.height_field.as_ref())
    {
        let (x, z) = field.cell_of(pos);
        if field.is_on_surface(x, z) {
            return Some((start, pos));
        }
    }

    let radius_sqr = radius * radius;
    let mut best: Option<(f32, RegionKey, Vec3<f32>)> = None;

    for region in regions {
        let field = match region.height_field.as_ref() {
            Some(f) => f,
            None => continue,
        };
        let aabb = field.aabb();
        if pos.x + radius < aabb.min.x
            || pos.x - radius > aabb.max.x
            || pos.z + radius < aabb.min.z
            || pos.z - radius > aabb.max.z
        {
            continue;
        }

        let (x_lo, z_lo) = field.cell_of(pos - Vec3::new(radius, 0.0, radius));
        let (x_hi, z_hi) = field.cell_of(pos + Vec3::new(radius, 0.0, radius));
        let x_lo = x_lo.max(0);
        let z_lo = z_lo.max(0);
        let x_hi = x_hi.min(field.size_x() as i32 - 1);
        let z_hi = z_hi.min(field.size_z() as i32 - 1);

        for z in z_lo..=z_hi {
            for x in x_lo..=x_hi {
                if !field.is_on_surface(x, z) {
                    continue;
                }
                let center = field.cell_center(x as u32, z as u32);
                let dx = center.x - pos.x;
                let dz = center.z - pos.z;
                let dist_sqr = dx * dx + dz * dz;
                if dist_sqr <= radius_sqr && best.map_or(true, |b| dist_sqr < b.0) {
                    best = Some((dist_sqr, region.key, center));
                }
            }
        }
    }

    best.map(|(_, key, center)| (key, center))
}

/// 記憶體內的區域登錄表
///
/// 以索引槽位加世代管理區域；卸載後槽位可重用，舊鍵因世代不符而失效
#[derive(Default)]
pub struct RegionRegistry {
    slots: RwLock<Vec<RegionSlot>>,
}

#[derive(Default)]
struct RegionSlot {
    generation: u32,
    region: Option<Arc<Region>>,
}

impl RegionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 登錄區域並回傳其鍵
    pub fn insert(&self, name: &str, height_field: Option<HeightField>) -> Arc<Region> {
        let mut slots = self.slots.write();
        let index = match slots.iter().position(|s| s.region.is_none()) {
            Some(i) => i,
            None => {
                slots.push(RegionSlot::default());
                slots.len() - 1
            }
        };
        let slot = &mut slots[index];
        slot.generation += 1;
        let region = Arc::new(Region {
            key: RegionKey::new(index as u32, slot.generation),
            name: name.to_string(),
            height_field: height_field.map(Arc::new),
        });
        slot.region = Some(region.clone());
        region
    }

    /// 卸載區域
    pub fn remove(&self, key: RegionKey) -> Option<Arc<Region>> {
        let mut slots = self.slots.write();
        let slot = slots.get_mut(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.region.take()
    }

    pub fn len(&self) -> usize {
        self.slots.read().iter().filter(|s| s.region.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RegionProvider for RegionRegistry {
    fn regions(&self) -> Vec<Arc<Region>> {
        self.slots
            .read()
            .iter()
            .filter_map(|s| s.region.clone())
            .collect()
    }

    fn resolve(&self, key: RegionKey) -> Option<Arc<Region>> {
        let slots = self.slots.read();
        let slot = slots.get(key.index as usize)?;
        if slot.generation != key.generation {
            return None;
        }
        slot.region.clone()
    }
}
