pub mod models;
pub mod sink;
