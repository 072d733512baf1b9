pub mod change;
pub mod mapping;
pub mod plan;
pub mod row;
pub mod value;
