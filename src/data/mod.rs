pub mod datetime;
pub mod synthetic;
