/// 曝光計算模組
///
/// 包含位元網格、視野模型、區域儲存、陰影投射、輔助圖與查詢
pub mod geometry_utils;
pub mod bitmap_grid;
pub mod polar_model;
pub mod region_store;
pub mod exposure_maps;
pub mod shadow_cast;
pub mod aux_maps;
pub mod query;
pub mod ray_query;
pub mod test_bitmap_grid;
pub mod test_shadow_cast;

pub use self::{
    geometry_utils::{Aabb, GeometryUtils},
    bitmap_grid::ExposureGrid,
    polar_model::VisibilityModel,
    region_store::{ExposureVariant, RegionExposureStore},
    exposure_maps::ExposureMaps,
    shadow_cast::{run_job, CastRect, JobOutput, ShadowCastJob},
    query::{ExposureSample, SegmentExposure},
    ray_query::RayOutcome,
};
