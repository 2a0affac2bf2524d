pub mod region_bits;
pub mod path_cost;

pub use self::{
    path_cost::{CostProfile, TraversalKind, TraversalLink},
    region_bits::RegionBits,
};
