pub mod engine;
pub mod models;


pub use engine::{compute_stop, StopLossEngine};
pub use models::*;
