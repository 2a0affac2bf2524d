/// 路徑代價函數
///
/// 尋路時以曝光、迴避與威脅長度為表面線段加權，並依穿越連結（梯子、跳躍、門）
/// 的種類與出入口是否曝光為連結加權。呼叫端需持有曝光圖讀鎖
use serde::{Deserialize, Serialize};

use crate::comp::observer::{ObserverClass, SurfaceLocation};
use crate::vision::exposure_maps::ExposureMaps;
use crate::vision::region_store::ExposureVariant;

/// 代價函數種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CostProfile {
    Sneak,
    SneakReducedExposure,
    BuddyCombat,
    BuddyFollow,
    BuddyLead,
    ScriptedBuddy,
}

/// 穿越連結種類
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraversalKind {
    Ladder,
    /// 往下跳，`dy` 為垂直落差（米）
    JumpDown { dy: f32 },
    JumpAcross,
    JumpUp,
    Default,
}

/// 尋路圖上的一條穿越連結
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraversalLink {
    pub kind: TraversalKind,
    pub entry: SurfaceLocation,
    pub exit: SurfaceLocation,
    /// 開著的門
    pub door_open: bool,
    /// 連結本身的基本代價，只有 BuddyLead 使用
    pub base_cost: f32,
}

impl TraversalLink {
    pub fn new(kind: TraversalKind, entry: SurfaceLocation, exit: SurfaceLocation) -> Self {
        Self {
            kind,
            entry,
            exit,
            door_open: false,
            base_cost: 0.0,
        }
    }

    pub fn with_door(mut self) -> Self {
        self.door_open = true;
        self
    }

    pub fn with_base_cost(mut self, base_cost: f32) -> Self {
        self.base_cost = base_cost;
        self
    }
}

/// 各連結種類的權重
struct TraversalWeights {
    default: f32,
    ladder: f32,
    jump_down_high: f32,
    jump_down_low: f32,
    jump_across: f32,
    jump_up: f32,
}

impl TraversalWeights {
    fn weight(&self, kind: TraversalKind) -> f32 {
        match kind {
            TraversalKind::Ladder => self.ladder,
            TraversalKind::JumpDown { dy } => {
                if dy.abs() > 2.0 {
                    self.jump_down_high
                } else {
                    self.jump_down_low
                }
            }
            TraversalKind::JumpAcross => self.jump_across,
            TraversalKind::JumpUp => self.jump_up,
            TraversalKind::Default => self.default,
        }
    }
}

const SNEAK_WEIGHTS: TraversalWeights = TraversalWeights {
    default: 3.8,
    ladder: 10.0,
    jump_down_high: 2.0,
    jump_down_low: 1.4,
    jump_across: 2.0,
    jump_up: 2.8,
};

const SNEAK_REDUCED_WEIGHTS: TraversalWeights = TraversalWeights {
    default: 3.5,
    ladder: 10.0,
    jump_down_high: 2.0,
    jump_down_low: 1.4,
    jump_across: 2.0,
    jump_up: 2.9,
};

const BUDDY_COMBAT_WEIGHTS: TraversalWeights = TraversalWeights {
    default: 3.5,
    ladder: 10.0,
    jump_down_high: 2.0,
    jump_down_low: 1.5,
    jump_across: 2.0,
    jump_up: 3.0,
};

const BUDDY_FOLLOW_WEIGHTS: TraversalWeights = TraversalWeights {
    default: 3.5,
    ladder: 10.0,
    jump_down_high: 2.6,
    jump_down_low: 2.0,
    jump_across: 2.0,
    jump_up: 5.0,
};

/// 敵方 NPC 類別
const ENEMY: ObserverClass = ObserverClass::EnemyNpcs;

impl CostProfile {
    pub const ALL: [CostProfile; 6] = [
        CostProfile::Sneak,
        CostProfile::SneakReducedExposure,
        CostProfile::BuddyCombat,
        CostProfile::BuddyFollow,
        CostProfile::BuddyLead,
        CostProfile::ScriptedBuddy,
    ];

    /// 註冊名稱
    pub fn name(self) -> &'static str {
        match self {
            CostProfile::Sneak => "sneak",
            CostProfile::SneakReducedExposure => "sneak-reduced-exposure",
            CostProfile::BuddyCombat => "buddy-combat",
            CostProfile::BuddyFollow => "buddy-follow",
            CostProfile::BuddyLead => "buddy-lead",
            CostProfile::ScriptedBuddy => "scripted-buddy",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|p| p.name() == name)
    }

    /// 表面線段代價
    ///
    /// 線段所在區域沒有曝光儲存時只回傳距離
    pub fn surface_cost(self, maps: &ExposureMaps, from: &SurfaceLocation, to: &SurfaceLocation) -> f32 {
        let dist = from.position.distance(to.position);
        if self == CostProfile::ScriptedBuddy || self == CostProfile::BuddyLead {
            return dist;
        }

        // 隱蔽草叢一律視為未曝光
        let seg = match maps.integrate_segment(from, to, ExposureVariant::StealthMasked, ENEMY) {
            Some(seg) => seg,
            None => return dist,
        };
        match self {
            CostProfile::Sneak => dist + 2.6 * seg.exposed + 4.5 * seg.avoid,
            CostProfile::SneakReducedExposure => dist + 1.7 * seg.exposed + 4.5 * seg.avoid,
            CostProfile::BuddyCombat => dist + 1.1 * seg.exposed + 0.3 * seg.threat + 5.5 * seg.avoid,
            CostProfile::BuddyFollow => dist + 5.5 * seg.avoid,
            CostProfile::BuddyLead | CostProfile::ScriptedBuddy => dist,
        }
    }

    /// 穿越連結代價，`dist` 為連結兩端距離
    pub fn traversal_cost(self, maps: &ExposureMaps, link: &TraversalLink, dist: f32) -> f32 {
        match self {
            CostProfile::ScriptedBuddy => 10.0,
            CostProfile::BuddyLead => {
                let weight: f32 = match link.kind {
                    TraversalKind::JumpDown { dy } if dy.abs() > 2.0 => 2.0,
                    TraversalKind::JumpDown { .. } => 1.3,
                    _ => 2.0,
                };
                link.base_cost + weight.max(weight * dist)
            }
            CostProfile::BuddyFollow => {
                let weight = BUDDY_FOLLOW_WEIGHTS.weight(link.kind);
                weight.max(weight * dist)
            }
            CostProfile::BuddyCombat => {
                let (entry, exit) = endpoints_exposed(maps, link);
                let factor = match (entry, exit) {
                    (true, true) => 1.3,
                    (_, true) => 1.25,
                    (true, false) => 1.2,
                    (false, false) => 1.0,
                };
                let weight = BUDDY_COMBAT_WEIGHTS.weight(link.kind);
                weight.max(weight * dist * factor)
            }
            CostProfile::Sneak | CostProfile::SneakReducedExposure => {
                let dist = if self == CostProfile::Sneak && link.door_open {
                    dist + 3.5
                } else {
                    dist
                };
                let (entry, exit) = endpoints_exposed(maps, link);
                let factor = if exit {
                    2.25
                } else if entry {
                    4.5
                } else {
                    1.0
                };
                let weights = if self == CostProfile::Sneak {
                    &SNEAK_WEIGHTS
                } else {
                    &SNEAK_REDUCED_WEIGHTS
                };
                let weight = weights.weight(link.kind);
                weight.max(weight * dist * factor)
            }
        }
    }
}

/// 連結入口與出口是否曝光（隱蔽草叢算曝光）
fn endpoints_exposed(maps: &ExposureMaps, link: &TraversalLink) -> (bool, bool) {
    let entry = maps.query_at_location(link.entry.region, link.entry.position, ExposureVariant::Normal, ENEMY);
    let exit = maps.query_at_location(link.exit.region, link.exit.position, ExposureVariant::Normal, ENEMY);
    (entry, exit)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use vek::Vec3;

    use super::*;
    use crate::comp::region::{HeightField, RegionKey};
    use crate::config::QuerySetting;
    use crate::vision::region_store::RegionExposureStore;

    fn key() -> RegionKey {
        RegionKey::new(0, 1)
    }

    fn at(x: f32, z: f32) -> SurfaceLocation {
        SurfaceLocation::new(key(), Vec3::new(x, 0.0, z))
    }

    fn maps(exposed: bool) -> ExposureMaps {
        let mut maps = ExposureMaps::new(QuerySetting::default());
        let field = HeightField::flat(40, 40, Vec3::zero(), 1);
        let mut store = RegionExposureStore::new(key(), Arc::new(field));
        if exposed {
            store.scratch_mut(ENEMY).fill();
            store.publish(ENEMY);
        }
        maps.insert(store);
        maps
    }

    #[test]
    fn test_profile_names() {
        for profile in CostProfile::ALL {
            assert_eq!(CostProfile::from_name(profile.name()), Some(profile));
        }
        assert_eq!(CostProfile::from_name("run"), None);
    }

    /// 測試表面代價：曝光長度按權重加到距離上
    #[test]
    fn test_surface_cost_weights() {
        let (from, to) = (at(2.25, 5.25), at(7.25, 5.25));

        let hidden = maps(false);
        for profile in CostProfile::ALL {
            assert!((profile.surface_cost(&hidden, &from, &to) - 5.0).abs() < 1e-3);
        }

        let exposed = maps(true);
        let sneak = CostProfile::Sneak.surface_cost(&exposed, &from, &to);
        assert!((sneak - (5.0 + 2.6 * 5.0)).abs() < 1e-2, "sneak {}", sneak);
        let reduced = CostProfile::SneakReducedExposure.surface_cost(&exposed, &from, &to);
        assert!((reduced - (5.0 + 1.7 * 5.0)).abs() < 1e-2, "reduced {}", reduced);
        let follow = CostProfile::BuddyFollow.surface_cost(&exposed, &from, &to);
        assert!((follow - 5.0).abs() < 1e-3);

        // 沒有曝光儲存的區域只算距離
        let elsewhere = SurfaceLocation::new(RegionKey::new(4, 1), Vec3::new(7.25, 0.0, 5.25));
        assert!((CostProfile::Sneak.surface_cost(&exposed, &from, &elsewhere) - 5.0).abs() < 1e-3);
    }

    /// 測試穿越代價：種類權重、出入口曝光倍率與門
    #[test]
    fn test_traversal_cost() {
        let hidden = maps(false);
        let exposed = maps(true);
        let ladder = TraversalLink::new(TraversalKind::Ladder, at(2.25, 2.25), at(2.25, 4.25));

        assert_eq!(CostProfile::Sneak.traversal_cost(&hidden, &ladder, 2.0), 20.0);
        assert_eq!(CostProfile::Sneak.traversal_cost(&hidden, &ladder, 0.05), 10.0);
        assert!((CostProfile::Sneak.traversal_cost(&exposed, &ladder, 2.0) - 45.0).abs() < 1e-4);
        assert!((CostProfile::BuddyCombat.traversal_cost(&exposed, &ladder, 2.0) - 26.0).abs() < 1e-4);
        assert_eq!(CostProfile::ScriptedBuddy.traversal_cost(&exposed, &ladder, 2.0), 10.0);

        let door = TraversalLink::new(TraversalKind::Default, at(2.25, 2.25), at(2.25, 4.25)).with_door();
        assert!((CostProfile::Sneak.traversal_cost(&hidden, &door, 1.0) - 3.8 * 4.5).abs() < 1e-4);
        assert!((CostProfile::SneakReducedExposure.traversal_cost(&hidden, &door, 1.0) - 3.5).abs() < 1e-4);

        let drop = TraversalLink::new(TraversalKind::JumpDown { dy: -3.0 }, at(2.25, 2.25), at(2.25, 4.25))
            .with_base_cost(1.5);
        assert!((CostProfile::BuddyLead.traversal_cost(&hidden, &drop, 2.0) - 5.5).abs() < 1e-4);
        assert!((CostProfile::BuddyFollow.traversal_cost(&hidden, &drop, 2.0) - 5.2).abs() < 1e-4);
    }
}
