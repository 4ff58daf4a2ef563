pub mod classify;
pub mod stats;
