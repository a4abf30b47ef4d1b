// Audio module - Output backends and the audio clock

pub mod engine;
pub mod offline;
pub mod output;
pub mod timing;
