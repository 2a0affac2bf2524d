pub mod region;
pub mod observer;
pub mod hazard;

pub use self::{
    region::*,
    observer::*,
    hazard::*,
};
