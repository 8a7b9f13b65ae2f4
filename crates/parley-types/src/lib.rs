pub mod api;
pub mod frames;
