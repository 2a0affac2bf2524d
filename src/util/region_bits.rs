use bitvec::vec::BitVec;

/// 以區域穩定索引為鍵的位元集合
///
/// 用來記錄哪些區域目前持有某類別、迴避或威脅的貢獻，以便下次增量清除
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegionBits {
    bits: BitVec,
}

impl RegionBits {
    pub fn new() -> Self {
        Self { bits: BitVec::new() }
    }

    /// 設定位元並回傳舊值
    pub fn set(&mut self, index: usize) -> bool {
        let previous = if index >= self.bits.len() {
            self.bits.resize(index + 1, false);
            false
        } else {
            self.bits[index]
        };
        self.bits.set(index, true);
        previous
    }

    pub fn contains(&self, index: usize) -> bool {
        self.bits.get(index).map(|b| *b).unwrap_or(false)
    }

    pub fn clear_index(&mut self, index: usize) {
        if index < self.bits.len() {
            self.bits.set(index, false);
        }
    }

    pub fn clear_all(&mut self) {
        self.bits.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    pub fn count(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.iter_ones()
    }

    /// 在 self 中但不在 other 中的索引
    pub fn difference(&self, other: &RegionBits) -> RegionBits {
        let mut out = RegionBits::new();
        for index in self.iter().filter(|i| !other.contains(*i)) {
            out.set(index);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 測試設定與查詢
    #[test]
    fn test_set_and_contains() {
        let mut bits = RegionBits::new();
        assert!(bits.is_empty());
        assert!(!bits.set(5));
        assert!(bits.set(5), "重複設定應回傳舊值 true");
        assert!(bits.contains(5));
        assert!(!bits.contains(4));
        assert!(!bits.contains(500), "超出長度的索引視為未設定");
        assert_eq!(bits.count(), 1);
    }

    /// 測試差集只保留舊集合獨有的索引
    #[test]
    fn test_difference() {
        let mut old = RegionBits::new();
        old.set(1);
        old.set(3);
        old.set(70);
        let mut new = RegionBits::new();
        new.set(3);
        new.set(4);

        let only_old: Vec<usize> = old.difference(&new).iter().collect();
        assert_eq!(only_old, vec![1, 70]);
    }
}
