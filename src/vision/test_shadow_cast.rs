/// 陰影投射測試
#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::f32::consts::FRAC_PI_2;
    use std::sync::Arc;

    use vek::Vec3;

    use crate::comp::observer::{Observer, ObserverClass};
    use crate::comp::region::{HeightField, RegionKey, HEIGHT_SPACING};
    use crate::config::CrouchTuning;
    use crate::vision::bitmap_grid::ExposureGrid;
    use crate::vision::polar_model::VisibilityModel;
    use crate::vision::shadow_cast::*;

    fn key() -> RegionKey {
        RegionKey::new(0, 1)
    }

    /// 10x10 平地（原始高度 1），可選擇在 (3,4) 放一道高牆
    fn scene(wall: bool) -> Arc<HeightField> {
        let mut field = HeightField::flat(10, 10, Vec3::zero(), 1);
        if wall {
            field.set_height(3, 4, 40);
        }
        Arc::new(field)
    }

    /// 站在 (0,4) 格、面向 +X 的觀察者
    fn observer() -> Observer {
        Observer::new(key(), Vec3::new(0.25, HEIGHT_SPACING, 2.25), FRAC_PI_2)
            .with_exposure_model(VisibilityModel::circle(20.0))
    }

    fn cast(field: &Arc<HeightField>, observer: &Observer) -> ExposureGrid {
        let job = ShadowCastJob {
            class: ObserverClass::EnemyNpcs,
            target: key(),
            target_field: field.clone(),
            occluders: vec![OccluderRef::relative_to(field.clone(), field.origin())],
            observers: vec![ObserverCast::new(observer, field)],
            crouch: CrouchTuning::default(),
        };
        run_job(&job).grid
    }

    /// 測試周界列舉：每格恰好一次且都在矩形邊上
    #[test]
    fn test_perimeter_cells() {
        let rect = CastRect { start_x: 2, start_z: 1, run_x: 3, run_z: 2 };
        let cells: Vec<(i32, i32)> = rect.perimeter().collect();
        assert_eq!(cells.len(), 10);
        assert_eq!(rect.perimeter().len(), 10);

        let unique: HashSet<(i32, i32)> = cells.iter().cloned().collect();
        assert_eq!(unique.len(), cells.len(), "周界格不應重複");
        for (x, z) in cells {
            let on_edge = x == 2 || x == 5 || z == 1 || z == 3;
            assert!(on_edge, "({}, {}) 不在邊上", x, z);
        }
    }

    /// 測試觀察者格空間轉換
    #[test]
    fn test_observer_cast_setup() {
        let field = scene(false);
        let cast = ObserverCast::new(&observer(), &field);
        assert_eq!((cast.cell_x, cast.cell_z), (0, 4));
        assert!((cast.eye_y - (HEIGHT_SPACING + 1.7) / HEIGHT_SPACING).abs() < 1e-3);
        assert_eq!(cast.rect, Some(CastRect { start_x: 0, start_z: 0, run_x: 10, run_z: 10 }));
        assert!(cast.forward.x > 0.99);
    }

    /// 測試牆後目標：有牆時不曝光、拆牆後曝光，牆影響不到的格完全相同
    #[test]
    fn test_wall_occludes_target_behind() {
        let obs = observer();
        let open = cast(&scene(false), &obs);
        let walled = cast(&scene(true), &obs);

        assert!(open.test(6, 4), "拆牆後牆後目標應曝光");
        assert!(!walled.test(6, 4), "牆後目標應被遮住");

        for z in 0..10 {
            for x in 0..10 {
                if x <= 2 || z <= 2 || z >= 6 {
                    assert_eq!(open.test(x, z), walled.test(x, z), "({}, {}) 不應受牆影響", x, z);
                }
            }
        }
    }

    /// 測試停用模型（半徑為零）不產生任何曝光
    #[test]
    fn test_zero_radius_contributes_nothing() {
        let field = scene(false);
        let mut obs = observer();
        obs.exposure_model = VisibilityModel::DISABLED;
        obs.compute_bounds();
        assert!(cast(&field, &obs).is_empty());
    }

    /// 測試邊界與區域不相交時沒有射線
    #[test]
    fn test_no_intersection_no_rays() {
        let field = scene(false);
        let far = Observer::new(key(), Vec3::new(100.0, 0.0, 100.0), 0.0)
            .with_exposure_model(VisibilityModel::circle(3.0));
        let cast_far = ObserverCast::new(&far, &field);
        assert!(cast_far.rect.is_none());
        assert!(cast(&field, &far).is_empty());
    }

    /// 測試背後超出半徑的格不曝光
    #[test]
    fn test_backward_out_of_range() {
        let field = Arc::new(HeightField::flat(40, 40, Vec3::zero(), 1));
        let obs = Observer::new(key(), Vec3::new(10.25, HEIGHT_SPACING, 10.25), 0.0)
            .with_exposure_model(VisibilityModel::new(2.0, 0.5, 6.0, 0.5));
        let grid = cast(&field, &obs);

        // 正前方 2 米內可見
        assert!(grid.test(20, 24));
        // 背後 2 米外不可見（後方半徑 a/(1+b) = 1.33 米）
        assert!(!grid.test(20, 16));
        assert!(!grid.test(20, 5));
    }

    /// 測試同一條射線上三道牆的斜率帶：保留第一道，第二道被第三道覆寫
    ///
    /// 眼睛高度 5 米 + 1.7 米 = 原始 85.76。牆之間是空洞（高度 0）：
    /// 第一道 x=2..3 高 76，帶 [-4.88, -3.25]；第二道 x=6..7 高 107，帶 [3.03, 3.54]；
    /// 第三道 x=10..11 高 91，帶 [0.476, 0.524]
    #[test]
    fn test_first_and_last_caster_bands() {
        let mut walls = HeightField::flat(20, 5, Vec3::zero(), 0);
        for (x, h) in [(2, 76), (3, 76), (6, 107), (7, 107), (10, 91), (11, 91)] {
            walls.set_height(x, 2, h);
        }
        let walls = Arc::new(walls);

        let mut surface = HeightField::flat(20, 5, Vec3::zero(), 60);
        // 第二道牆之前、落在第二道牆的帶內：(112 - 85.76) / 8 = 3.28
        surface.set_height(8, 2, 112);
        // 不在任何帶內：26.24 / 13 = 2.02
        surface.set_height(13, 2, 112);
        // 只落在第二道牆的帶內：45.24 / 14 = 3.23
        surface.set_height(14, 2, 131);
        // 落在第一道牆的帶內：-59.76 / 15 = -3.98
        surface.set_height(15, 2, 26);
        // 落在第三道牆的帶內：8.24 / 16 = 0.515
        surface.set_height(16, 2, 94);
        let surface = Arc::new(surface);

        let obs = Observer::new(key(), Vec3::new(0.25, 5.0, 1.25), FRAC_PI_2)
            .with_exposure_model(VisibilityModel::circle(20.0));
        let job = ShadowCastJob {
            class: ObserverClass::EnemyNpcs,
            target: key(),
            target_field: surface.clone(),
            occluders: vec![OccluderRef::relative_to(walls, surface.origin())],
            observers: vec![ObserverCast::new(&obs, &surface)],
            crouch: CrouchTuning { min: 0.0, max: 0.0, ..CrouchTuning::default() },
        };
        let cast = &job.observers[0];
        assert_eq!((cast.cell_x, cast.cell_z), (0, 2));

        // 只投射沿 z = 2 的兩條射線
        let rect = CastRect { start_x: 16, start_z: 2, run_x: 1, run_z: 0 };
        let mut outer = ExposureGrid::new(20, 5);
        let mut inner = ExposureGrid::new(20, 5);
        cast_observer(&job, cast, &rect, &mut outer, &mut inner);

        assert!(outer.test(0, 2), "觀察者腳下");
        assert!(!outer.test(8, 2), "第三道牆出現前，第二道牆的帶仍有效");
        assert!(outer.test(13, 2), "不在任何帶內");
        assert!(outer.test(14, 2), "第二道牆的帶已被覆寫");
        assert!(!outer.test(15, 2), "第一道牆的帶一直保留");
        assert!(!outer.test(16, 2), "最後一道牆的帶");
        assert!(!outer.test(14, 3), "射線之外的格不會被標記");
    }

    /// 測試斜率帶：NaN 不在帶內
    #[test]
    fn test_caster_band_contains() {
        let mut band = CasterBand::EMPTY;
        assert!(!band.contains(0.0));
        band.include(-1.0);
        band.include(2.0);
        assert!(band.contains(0.5));
        assert!(band.contains(2.0));
        assert!(!band.contains(2.5));
        assert!(!band.contains(f32::NAN));
    }
}
