pub mod figure;
pub mod null_model;
pub mod sharing;
