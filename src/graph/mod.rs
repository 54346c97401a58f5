pub mod diff;
pub mod model;
