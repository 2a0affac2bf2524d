/// 所有區域曝光儲存的容器，受引擎讀寫鎖保護
///
/// 以區域穩定索引為槽位，取用時比對世代，因此不需要任何重定位步驟
use crate::comp::region::RegionKey;
use crate::config::QuerySetting;
use crate::util::region_bits::RegionBits;
use crate::vision::region_store::RegionExposureStore;

#[derive(Default)]
pub struct ExposureMaps {
    stores: Vec<Option<RegionExposureStore>>,
    /// 目前持有迴避貢獻的區域
    pub(crate) avoid_regions: RegionBits,
    /// 目前持有威脅貢獻的區域
    pub(crate) threat_regions: RegionBits,
    pub(crate) query: QuerySetting,
}

impl ExposureMaps {
    pub fn new(query: QuerySetting) -> Self {
        Self {
            query,
            ..Default::default()
        }
    }

    /// 放入儲存；同索引的舊儲存會被取代
    pub fn insert(&mut self, store: RegionExposureStore) {
        let index = store.key().index as usize;
        if index >= self.stores.len() {
            self.stores.resize_with(index + 1, || None);
        }
        self.stores[index] = Some(store);
    }

    /// 移除儲存，世代不符時不動作
    pub fn remove(&mut self, key: RegionKey) -> Option<RegionExposureStore> {
        let slot = self.stores.get_mut(key.index as usize)?;
        if slot.as_ref().map_or(false, |s| s.key() == key) {
            self.avoid_regions.clear_index(key.index as usize);
            self.threat_regions.clear_index(key.index as usize);
            slot.take()
        } else {
            None
        }
    }

    pub fn contains(&self, key: RegionKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: RegionKey) -> Option<&RegionExposureStore> {
        self.stores
            .get(key.index as usize)?
            .as_ref()
            .filter(|s| s.key() == key)
    }

    pub fn get_mut(&mut self, key: RegionKey) -> Option<&mut RegionExposureStore> {
        self.stores
            .get_mut(key.index as usize)?
            .as_mut()
            .filter(|s| s.key() == key)
    }

    /// 依索引取用，不比對世代（用於依位元集合清除）
    pub fn get_by_index_mut(&mut self, index: usize) -> Option<&mut RegionExposureStore> {
        self.stores.get_mut(index)?.as_mut()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RegionExposureStore> {
        self.stores.iter().filter_map(|s| s.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut RegionExposureStore> {
        self.stores.iter_mut().filter_map(|s| s.as_mut())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 釋放全部儲存
    pub fn clear(&mut self) {
        self.stores.clear();
        self.avoid_regions.clear_all();
        self.threat_regions.clear_all();
    }
}
