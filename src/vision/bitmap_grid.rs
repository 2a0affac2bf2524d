/// 位元曝光網格
///
/// 每格一個位元，以 u64 字組儲存，列距為 64 的倍數，字組數補齊為偶數以便成對處理。
/// 位元索引 = z * pitch + x。批次運算可能寫入補齊位元，查詢前須以可行走遮罩過濾
use vek::Vec3;

use crate::comp::region::{GRID_SPACING, INV_GRID_SPACING};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExposureGrid {
    size_x: u32,
    size_z: u32,
    pitch: u32,
    words: Vec<u64>,
}

impl ExposureGrid {
    /// 字組數：每列 (size_x + 63) / 64 個，總數補齊為偶數
    pub fn block_count(size_x: u32, size_z: u32) -> usize {
        let per_row = ((size_x as usize) + 63) >> 6;
        let total = per_row * size_z as usize;
        ((total + 1) >> 1) << 1
    }

    /// 建立全零網格
    pub fn new(size_x: u32, size_z: u32) -> Self {
        Self {
            size_x,
            size_z,
            pitch: (size_x + 63) & !63,
            words: vec![0; Self::block_count(size_x, size_z)],
        }
    }

    /// 建立全滿網格
    pub fn filled(size_x: u32, size_z: u32) -> Self {
        let mut grid = Self::new(size_x, size_z);
        grid.fill();
        grid
    }

    pub fn size_x(&self) -> u32 {
        self.size_x
    }

    pub fn size_z(&self) -> u32 {
        self.size_z
    }

    pub fn pitch(&self) -> u32 {
        self.pitch
    }

    pub fn words(&self) -> &[u64] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u64] {
        &mut self.words
    }

    pub fn same_shape(&self, other: &ExposureGrid) -> bool {
        self.size_x == other.size_x && self.size_z == other.size_z
    }

    /// 座標是否在網格內
    pub fn in_bounds(&self, x: i32, z: i32) -> bool {
        (x as u32) < self.size_x && (z as u32) < self.size_z
    }

    #[inline]
    fn index(&self, x: u32, z: u32) -> usize {
        (z as usize) * (self.pitch as usize) + x as usize
    }

    #[inline]
    fn test_index(&self, index: usize) -> bool {
        (self.words[index >> 6] >> (index & 63)) & 1 != 0
    }

    pub fn clear(&mut self) {
        self.words.iter_mut().for_each(|w| *w = 0);
    }

    pub fn fill(&mut self) {
        self.words.iter_mut().for_each(|w| *w = !0);
    }

    pub fn set_bit(&mut self, x: u32, z: u32) {
        debug_assert!(x < self.size_x && z < self.size_z, "set_bit 越界 ({}, {})", x, z);
        let index = self.index(x, z);
        self.words[index >> 6] |= 1u64 << (index & 63);
    }

    pub fn clear_bit(&mut self, x: u32, z: u32) {
        debug_assert!(x < self.size_x && z < self.size_z, "clear_bit 越界 ({}, {})", x, z);
        let index = self.index(x, z);
        self.words[index >> 6] &= !(1u64 << (index & 63));
    }

    /// 呼叫端需先確認座標在範圍內
    pub fn test(&self, x: u32, z: u32) -> bool {
        debug_assert!(x < self.size_x && z < self.size_z, "test 越界 ({}, {})", x, z);
        self.test_index(self.index(x, z))
    }

    /// 越界時回傳 false
    pub fn test_checked(&self, x: i32, z: i32) -> bool {
        self.in_bounds(x, z) && self.test(x as u32, z as u32)
    }

    /// self &= src
    pub fn and_assign(&mut self, src: &ExposureGrid) {
        debug_assert!(self.same_shape(src));
        for pair in self.words.chunks_exact_mut(2).zip(src.words.chunks_exact(2)) {
            pair.0[0] &= pair.1[0];
            pair.0[1] &= pair.1[1];
        }
    }

    /// self |= src
    pub fn or_assign(&mut self, src: &ExposureGrid) {
        debug_assert!(self.same_shape(src));
        for pair in self.words.chunks_exact_mut(2).zip(src.words.chunks_exact(2)) {
            pair.0[0] |= pair.1[0];
            pair.0[1] |= pair.1[1];
        }
    }

    /// self &= !src
    pub fn and_not_assign(&mut self, src: &ExposureGrid) {
        debug_assert!(self.same_shape(src));
        for pair in self.words.chunks_exact_mut(2).zip(src.words.chunks_exact(2)) {
            pair.0[0] &= !pair.1[0];
            pair.0[1] &= !pair.1[1];
        }
    }

    /// self = a & b，回傳結果是否有任何位元
    pub fn assign_and(&mut self, a: &ExposureGrid, b: &ExposureGrid) -> bool {
        debug_assert!(self.same_shape(a) && self.same_shape(b));
        let mut any = 0u64;
        for ((dst, a), b) in self.words.iter_mut().zip(a.words.iter()).zip(b.words.iter()) {
            *dst = a & b;
            any |= *dst;
        }
        any != 0
    }

    /// self = a & !b
    pub fn assign_and_not(&mut self, a: &ExposureGrid, b: &ExposureGrid) {
        debug_assert!(self.same_shape(a) && self.same_shape(b));
        for ((dst, a), b) in self.words.iter_mut().zip(a.words.iter()).zip(b.words.iter()) {
            *dst = a & !b;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// 範圍內被設定的格數（不含補齊位元）
    pub fn count_set(&self) -> usize {
        let mut count = 0;
        for z in 0..self.size_z {
            for x in 0..self.size_x {
                if self.test(x, z) {
                    count += 1;
                }
            }
        }
        count
    }

    /// 以可行走遮罩就近查詢：先查本格，再依序查 +x、-x、+z、-z 四鄰，
    /// 回傳第一個可行走格的位元；距邊界一格以內一律視為 false
    pub fn test_nearest_on_surface(&self, on_surface: &ExposureGrid, x: i32, z: i32) -> bool {
        if self.size_x < 3 || self.size_z < 3 {
            return false;
        }
        if (x.wrapping_sub(1) as u32) >= self.size_x - 2 || (z.wrapping_sub(1) as u32) >= self.size_z - 2 {
            return false;
        }

        let pitch = self.pitch as usize;
        let base = self.index(x as u32, z as u32);
        for index in [base, base + 1, base - 1, base + pitch, base - pitch] {
            if on_surface.test_index(index) {
                return self.test_index(index);
            }
        }
        false
    }

    /// 沿線段積分此網格為真的長度
    ///
    /// `origin` 為區域的世界原點；每個命中的格貢獻一個格距，總和再以
    /// 線段長度與步數比例縮放
    pub fn integrate_length(
        &self,
        on_surface: &ExposureGrid,
        origin: Vec3<f32>,
        p0: Vec3<f32>,
        p1: Vec3<f32>,
    ) -> f32 {
        let mut hits = 0u32;
        let scale = walk_line(origin, p0, p1, |x, z| {
            if self.test_nearest_on_surface(on_surface, x, z) {
                hits += 1;
            }
        });
        hits as f32 * GRID_SPACING * scale
    }

    /// 一次走訪同時積分兩個網格
    pub fn integrate_length_pair(
        first: &ExposureGrid,
        second: &ExposureGrid,
        on_surface: &ExposureGrid,
        origin: Vec3<f32>,
        p0: Vec3<f32>,
        p1: Vec3<f32>,
    ) -> (f32, f32) {
        let mut hits = (0u32, 0u32);
        let scale = walk_line(origin, p0, p1, |x, z| {
            if first.test_nearest_on_surface(on_surface, x, z) {
                hits.0 += 1;
            }
            if second.test_nearest_on_surface(on_surface, x, z) {
                hits.1 += 1;
            }
        });
        (
            hits.0 as f32 * GRID_SPACING * scale,
            hits.1 as f32 * GRID_SPACING * scale,
        )
    }
}

/// Bresenham 走訪線段經過的格（含起點與終點），回傳長度縮放係數
pub(crate) fn walk_line<F: FnMut(i32, i32)>(
    origin: Vec3<f32>,
    p0: Vec3<f32>,
    p1: Vec3<f32>,
    mut visit: F,
) -> f32 {
    let p0_ls = (p0 - origin) * INV_GRID_SPACING;
    let p1_ls = (p1 - origin) * INV_GRID_SPACING;

    let mut x0 = p0_ls.x.floor() as i32;
    let mut z0 = p0_ls.z.floor() as i32;
    let x1 = p1_ls.x.floor() as i32;
    let z1 = p1_ls.z.floor() as i32;

    let d_x = (x1 - x0).abs();
    let d_z = -(z1 - z0).abs();
    let s_x = if x0 < x1 { 1 } else { -1 };
    let s_z = if z0 < z1 { 1 } else { -1 };
    let mut err = d_x + d_z;

    visit(x0, z0);
    while x0 != x1 || z0 != z1 {
        let e2 = err << 1;
        if e2 > d_z {
            err += d_z;
            x0 += s_x;
        }
        if e2 < d_x {
            err += d_x;
            z0 += s_z;
        }
        visit(x0, z0);
    }

    p0_ls.distance(p1_ls) / (d_x.max(-d_z) + 1) as f32
}
