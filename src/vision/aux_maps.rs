/// 輔助圖：迴避圖與威脅圖
///
/// 與陰影投射流程無關，每幀在收集之後重建；連線模式下不計算
use vek::Vec3;

use crate::comp::hazard::HazardSphere;
use crate::comp::observer::{AllyRoster, Observer, ObserverClass};
use crate::comp::region::{GRID_SPACING, HEIGHT_SPACING, INV_GRID_SPACING};
use crate::config::ThreatTuning;
use crate::util::region_bits::RegionBits;
use crate::vision::exposure_maps::ExposureMaps;
use crate::vision::geometry_utils::GeometryUtils;

/// 威脅圖使用的觀察者類別
pub const THREAT_CLASSES: [ObserverClass; 2] = [ObserverClass::EnemyNpcs, ObserverClass::FutureEnemyNpcs];

/// 重建迴避圖
///
/// 格中心與球心的差在 Y 方向放大兩倍後落在半徑內即標記
pub fn build_avoid_map(maps: &mut ExposureMaps, spheres: &[HazardSphere]) {
    let previous = std::mem::take(&mut maps.avoid_regions);
    for index in previous.iter() {
        if let Some(store) = maps.get_by_index_mut(index) {
            store.clear_avoid();
        }
    }

    let mut contributing = RegionBits::new();
    for sphere in spheres {
        let sphere_box = sphere.aabb();
        let radius_sqr = sphere.radius * sphere.radius;

        for store in maps.iter_mut() {
            if !store.aabb().intersects(&sphere_box) {
                continue;
            }
            let field = store.field().clone();
            let origin = store.origin();
            let center = sphere.center - origin;

            let lo = (sphere_box.min - origin) * INV_GRID_SPACING;
            let hi = (sphere_box.max - origin) * INV_GRID_SPACING;
            let x0 = (lo.x.floor() as i32).max(0);
            let z0 = (lo.z.floor() as i32).max(0);
            let x1 = (hi.x.floor() as i32).min(field.size_x() as i32 - 1);
            let z1 = (hi.z.floor() as i32).min(field.size_z() as i32 - 1);

            let mut marked = false;
            for z in z0..=z1 {
                for x in x0..=x1 {
                    let h = field.height(x as u32, z as u32);
                    let cell = Vec3::new(
                        (x as f32 + 0.5) * GRID_SPACING,
                        (h as f32 + 0.5) * HEIGHT_SPACING,
                        (z as f32 + 0.5) * GRID_SPACING,
                    );
                    let delta = (cell - center) * Vec3::new(1.0, 2.0, 1.0);
                    if delta.magnitude_squared() < radius_sqr {
                        store.avoid_mut().set_bit(x as u32, z as u32);
                        marked = true;
                    }
                }
            }

            if marked {
                store.set_any_avoid();
                contributing.set(store.key().index as usize);
            }
        }
    }

    maps.avoid_regions = contributing;
}

/// 重建威脅圖
///
/// 只在有存活友方時計算。對敵方類別中啟用威脅模型的觀察者，
/// 標記其威脅曲線內、且該類別 Normal 已曝光的格
pub fn build_threat_map<'a, I>(
    maps: &mut ExposureMaps,
    observers: I,
    allies: &dyn AllyRoster,
    tuning: &ThreatTuning,
) where
    I: IntoIterator<Item = (ObserverClass, &'a Observer)>,
{
    let previous = std::mem::take(&mut maps.threat_regions);
    for index in previous.iter() {
        if let Some(store) = maps.get_by_index_mut(index) {
            store.clear_threat();
        }
    }

    if !allies.any_living_ally() {
        return;
    }

    let mut contributing = RegionBits::new();
    for (class, observer) in observers {
        if !THREAT_CLASSES.contains(&class) || !observer.threat_model.is_enabled() {
            continue;
        }
        mark_threat(maps, class, observer, tuning, &mut contributing);
    }

    maps.threat_regions = contributing;
}

fn mark_threat(
    maps: &mut ExposureMaps,
    class: ObserverClass,
    observer: &Observer,
    tuning: &ThreatTuning,
    contributing: &mut RegionBits,
) {
    let forward = observer.threat_locator.forward();
    let eye = observer.threat_locator.position;
    let model = observer.threat_model;

    for store in maps.iter_mut() {
        let aabb = store.aabb();
        if eye.y + tuning.height_band < aabb.min.y || eye.y - tuning.height_band > aabb.max.y {
            continue;
        }
        let isect = GeometryUtils::intersect_quad_aabb_xz(&observer.threat_bounds, &aabb);
        if !isect.is_valid() {
            continue;
        }
        contributing.set(store.key().index as usize);

        let field = store.field().clone();
        let origin = store.origin();
        let local_eye = eye - origin;
        let lo = (isect.min - origin) * INV_GRID_SPACING;
        let hi = (isect.max - origin) * INV_GRID_SPACING;
        let x0 = (lo.x.floor() as i32).max(0);
        let z0 = (lo.z.floor() as i32).max(0);
        let x1 = (hi.x.ceil() as i32).min(field.size_x() as i32 - 1);
        let z1 = (hi.z.ceil() as i32).min(field.size_z() as i32 - 1);

        let mut marked = false;
        {
            let (threat, normal) = store.threat_and_normal_mut(class);
            for z in z0..=z1 {
                for x in x0..=x1 {
                    let (ux, uz) = (x as u32, z as u32);
                    if !normal.test(ux, uz) {
                        continue;
                    }
                    let cell = Vec3::new(
                        (x as f32 + 0.5) * GRID_SPACING,
                        field.height(ux, uz) as f32 * HEIGHT_SPACING,
                        (z as f32 + 0.5) * GRID_SPACING,
                    );
                    let delta = cell - local_eye;
                    let rad_sqr = delta.x * delta.x + delta.z * delta.z;
                    let cos_theta = if rad_sqr > 0.0 {
                        (forward.x * delta.x + forward.z * delta.z) / rad_sqr.sqrt()
                    } else {
                        1.0
                    };

                    let (mut c, mut d) = (model.c, model.d);
                    if field.stealth().test(ux, uz) {
                        c = c.min(tuning.stealth_max_c);
                        d = d.min(tuning.stealth_max_d);
                    }
                    let rad_max = c / (1.0 - d * cos_theta).sqrt() + GRID_SPACING;
                    if rad_sqr <= rad_max * rad_max && delta.y.abs() < tuning.max_height_delta {
                        threat.set_bit(ux, uz);
                        marked = true;
                    }
                }
            }
        }
        if marked {
            store.set_any_threat();
        }
    }
}
