use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};
use vek::{Vec2, Vec3};

use crate::comp::region::RegionKey;
use crate::vision::polar_model::VisibilityModel;

/// 觀察者類別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObserverClass {
    /// 玩家
    Player,
    /// 目前可見的敵方
    EnemyNpcs,
    /// 即將可見的敵方（預測位置）
    FutureEnemyNpcs,
}

impl ObserverClass {
    pub const COUNT: usize = 3;
    pub const ALL: [ObserverClass; 3] = [
        ObserverClass::Player,
        ObserverClass::EnemyNpcs,
        ObserverClass::FutureEnemyNpcs,
    ];

    pub fn index(self) -> usize {
        match self {
            ObserverClass::Player => 0,
            ObserverClass::EnemyNpcs => 1,
            ObserverClass::FutureEnemyNpcs => 2,
        }
    }

    /// 動態高度來源的類別遮罩位元
    pub fn mask(self) -> u8 {
        1 << self.index()
    }

    pub fn name(self) -> &'static str {
        match self {
            ObserverClass::Player => "player",
            ObserverClass::EnemyNpcs => "enemy_npcs",
            ObserverClass::FutureEnemyNpcs => "future_enemy_npcs",
        }
    }
}

/// 位置加偏航角，前方為本地 +Z
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Locator {
    pub position: Vec3<f32>,
    /// 弧度，繞 Y 軸
    pub yaw: f32,
}

impl Locator {
    pub fn new(position: Vec3<f32>, yaw: f32) -> Self {
        Self { position, yaw }
    }

    /// 看向指定方向（只取 XZ）
    pub fn facing(position: Vec3<f32>, dir: Vec3<f32>) -> Self {
        Self {
            position,
            yaw: dir.x.atan2(dir.z),
        }
    }

    pub fn forward(&self) -> Vec3<f32> {
        Vec3::new(self.yaw.sin(), 0.0, self.yaw.cos())
    }

    pub fn forward_xz(&self) -> Vec2<f32> {
        Vec2::new(self.yaw.sin(), self.yaw.cos())
    }

    /// 本地座標轉世界座標
    pub fn transform_point(&self, local: Vec3<f32>) -> Vec3<f32> {
        let (sin, cos) = self.yaw.sin_cos();
        self.position
            + Vec3::new(
                local.x * cos + local.z * sin,
                local.y,
                -local.x * sin + local.z * cos,
            )
    }
}

/// 觀察者
///
/// 每幀由外部依類別提供，被排程器接受後複製到工作狀態
#[derive(Debug, Clone, PartialEq)]
pub struct Observer {
    pub locator: Locator,
    /// 威脅圖使用的位置與朝向（通常為頭部）
    pub threat_locator: Locator,
    /// 所在區域
    pub region: Option<RegionKey>,
    /// 眼睛相對位置的偏移
    pub eye_offset: Vec3<f32>,
    pub exposure_model: VisibilityModel,
    pub threat_model: VisibilityModel,
    /// 曝光模型的世界座標邊界四邊形
    pub exposure_bounds: [Vec3<f32>; 4],
    pub threat_bounds: [Vec3<f32>; 4],
}

impl Observer {
    pub fn new(region: RegionKey, position: Vec3<f32>, yaw: f32) -> Self {
        let locator = Locator::new(position, yaw);
        let mut observer = Self {
            locator,
            threat_locator: locator,
            region: Some(region),
            eye_offset: Vec3::new(0.0, 1.7, 0.0),
            exposure_model: VisibilityModel::DISABLED,
            threat_model: VisibilityModel::DISABLED,
            exposure_bounds: [Vec3::zero(); 4],
            threat_bounds: [Vec3::zero(); 4],
        };
        observer.compute_bounds();
        observer
    }

    pub fn with_eye_height(mut self, height: f32) -> Self {
        self.eye_offset = Vec3::new(0.0, height, 0.0);
        self
    }

    pub fn with_exposure_model(mut self, model: VisibilityModel) -> Self {
        self.exposure_model = model;
        self.compute_bounds();
        self
    }

    pub fn with_threat_model(mut self, model: VisibilityModel) -> Self {
        self.threat_model = model;
        self.compute_bounds();
        self
    }

    pub fn with_threat_locator(mut self, locator: Locator) -> Self {
        self.threat_locator = locator;
        self
    }

    pub fn is_finite(&self) -> bool {
        let p = self.locator.position;
        p.x.is_finite() && p.y.is_finite() && p.z.is_finite() && self.locator.yaw.is_finite()
    }

    pub fn eye_position(&self) -> Vec3<f32> {
        self.locator.position + self.eye_offset
    }

    /// 依目前位置重算兩個邊界四邊形
    pub fn compute_bounds(&mut self) {
        self.exposure_bounds = self.exposure_model.bounds_ws(&self.locator);
        self.threat_bounds = self.threat_model.bounds_ws(&self.locator);
    }
}

/// 導航表面上的一點
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceLocation {
    pub region: RegionKey,
    pub position: Vec3<f32>,
}

impl SurfaceLocation {
    pub fn new(region: RegionKey, position: Vec3<f32>) -> Self {
        Self { region, position }
    }
}

/// 友方名冊
///
/// 威脅圖只有在至少一名友方存活時才需要計算
pub trait AllyRoster: Send + Sync {
    fn any_living_ally(&self) -> bool;
}

/// 以計數表示存活友方的簡單名冊
#[derive(Debug, Default)]
pub struct LivingAllies {
    count: AtomicUsize,
}

impl LivingAllies {
    pub fn new(count: usize) -> Self {
        Self {
            count: AtomicUsize::new(count),
        }
    }

    pub fn set(&self, count: usize) {
        self.count.store(count, Ordering::Relaxed);
    }
}

impl AllyRoster for LivingAllies {
    fn any_living_ally(&self) -> bool {
        self.count.load(Ordering::Relaxed) > 0
    }
}
