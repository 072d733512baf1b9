pub mod sheet;
pub mod target;
