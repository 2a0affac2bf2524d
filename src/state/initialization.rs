/// 引擎初始化器 - 負責建立執行緒池與配置區域儲存

use std::sync::Arc;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::comp::region::RegionProvider;
use crate::error::Result;
use crate::vision::exposure_maps::ExposureMaps;
use crate::vision::region_store::RegionExposureStore;

/// 引擎初始化器
pub struct EngineInitializer;

impl EngineInitializer {
    /// 創建執行緒池
    pub fn create_thread_pool(threads: usize, prefix: &'static str) -> Result<Arc<ThreadPool>> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads.max(1))
            .thread_name(move |i| format!("{}-{}", prefix, i))
            .build()?;
        Ok(Arc::new(pool))
    }

    /// 為所有帶高度圖但尚未配置的區域建立儲存，回傳新配置數
    pub fn allocate_stores(provider: &dyn RegionProvider, maps: &mut ExposureMaps) -> usize {
        let mut allocated = 0;
        for region in provider.regions() {
            let field = match region.height_field.as_ref() {
                Some(field) => field,
                None => continue,
            };
            if maps.contains(region.key) {
                continue;
            }
            maps.insert(RegionExposureStore::new(region.key, field.clone()));
            log::debug!("配置區域 '{}' 的曝光儲存 ({}x{})", region.name, field.size_x(), field.size_z());
            allocated += 1;
        }
        allocated
    }
}
