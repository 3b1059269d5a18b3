pub mod incentive;
pub mod prelude;
pub mod shared;
pub mod submit;
