/// 位元網格測試
///
/// 清除冪等、AND/OR 代數（含補齊位元）與線段積分
#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use vek::Vec3;

    use crate::vision::bitmap_grid::ExposureGrid;

    const SIZES: [(u32, u32); 6] = [(1, 1), (10, 10), (63, 5), (64, 3), (65, 7), (130, 33)];

    fn random_grid(rng: &mut StdRng, sx: u32, sz: u32) -> ExposureGrid {
        let mut grid = ExposureGrid::new(sx, sz);
        for w in grid.words_mut() {
            *w = rng.random();
        }
        grid
    }

    /// 測試字組數補齊為偶數且列距為 64 的倍數
    #[test]
    fn test_block_layout() {
        for (sx, sz) in SIZES {
            let grid = ExposureGrid::new(sx, sz);
            assert_eq!(grid.words().len() % 2, 0, "字組數應為偶數 {}x{}", sx, sz);
            assert_eq!(grid.pitch() % 64, 0);
            assert!(grid.pitch() >= sx);
            assert!(grid.words().len() * 64 >= (grid.pitch() * sz) as usize);
        }
    }

    /// 測試清除後所有格皆為 false，不論寬度是否整除字組寬
    #[test]
    fn test_clear_idempotence() {
        let mut rng = StdRng::seed_from_u64(7);
        for (sx, sz) in SIZES {
            let mut grid = random_grid(&mut rng, sx, sz);
            grid.clear();
            grid.clear();
            for z in 0..sz {
                for x in 0..sx {
                    assert!(!grid.test(x, z), "清除後 ({}, {}) 仍為 true", x, z);
                }
            }
            assert!(grid.is_empty());
        }
    }

    /// 測試填滿與單點設定清除
    #[test]
    fn test_fill_and_single_bits() {
        let mut grid = ExposureGrid::filled(65, 3);
        assert_eq!(grid.count_set(), 65 * 3);
        grid.clear_bit(64, 2);
        assert!(!grid.test(64, 2));
        assert!(grid.test(63, 2));

        grid.clear();
        grid.set_bit(64, 1);
        assert!(grid.test(64, 1));
        assert_eq!(grid.count_set(), 1);
        assert!(!grid.test_checked(-1, 0));
        assert!(!grid.test_checked(65, 0));
    }

    /// 隨機測試 AND / OR / AND NOT 與逐格布林運算一致，補齊位元也一併打亂
    #[test]
    fn test_bitwise_algebra_fuzz() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..20 {
            let sx = rng.random_range(1..200);
            let sz = rng.random_range(1..40);
            let a = random_grid(&mut rng, sx, sz);
            let b = random_grid(&mut rng, sx, sz);

            let mut and = a.clone();
            and.and_assign(&b);
            let mut or = a.clone();
            or.or_assign(&b);
            let mut and_not = a.clone();
            and_not.and_not_assign(&b);
            let mut assigned = ExposureGrid::new(sx, sz);
            let any = assigned.assign_and(&a, &b);

            let mut expect_any = false;
            for z in 0..sz {
                for x in 0..sx {
                    let (ta, tb) = (a.test(x, z), b.test(x, z));
                    assert_eq!(and.test(x, z), ta && tb);
                    assert_eq!(or.test(x, z), ta || tb);
                    assert_eq!(and_not.test(x, z), ta && !tb);
                    assert_eq!(assigned.test(x, z), ta && tb);
                }
            }
            for (w, (wa, wb)) in assigned.words().iter().zip(a.words().iter().zip(b.words().iter())) {
                assert_eq!(*w, wa & wb, "補齊位元也應逐字組運算");
                expect_any |= *w != 0;
            }
            assert_eq!(any, expect_any);
        }
    }

    /// 測試線段積分：全曝光直線的長度接近線段長度
    #[test]
    fn test_integrate_length_full_grid() {
        let on_surface = ExposureGrid::filled(20, 20);
        let exposed = ExposureGrid::filled(20, 20);
        let p0 = Vec3::new(2.25, 0.0, 5.25);
        let p1 = Vec3::new(7.25, 0.0, 5.25);

        let len = exposed.integrate_length(&on_surface, Vec3::zero(), p0, p1);
        assert!((len - 5.0).abs() < 1e-3, "長度 {} 應等於線段長 5.0", len);

        let empty = ExposureGrid::new(20, 20);
        assert_eq!(empty.integrate_length(&on_surface, Vec3::zero(), p0, p1), 0.0);

        let (a, b) = ExposureGrid::integrate_length_pair(&exposed, &empty, &on_surface, Vec3::zero(), p0, p1);
        assert!((a - len).abs() < 1e-5);
        assert_eq!(b, 0.0);
    }

    /// 測試就近可行走查詢：本格不可行走時改看相鄰格，邊界一格內一律 false
    #[test]
    fn test_nearest_on_surface_fallback() {
        let mut on_surface = ExposureGrid::filled(8, 8);
        on_surface.clear_bit(4, 4);
        let mut grid = ExposureGrid::new(8, 8);
        grid.set_bit(5, 4);

        assert!(grid.test_nearest_on_surface(&on_surface, 4, 4), "應回退到 +x 鄰格");
        assert!(!grid.test_nearest_on_surface(&on_surface, 3, 3));

        grid.set_bit(0, 3);
        assert!(!grid.test_nearest_on_surface(&on_surface, 0, 3), "邊界格應被拒絕");
    }
}
