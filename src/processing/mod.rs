pub mod geometry;
pub mod geometry_pool;
pub mod segment_cache;
pub mod statistics;
