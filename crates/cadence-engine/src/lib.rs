pub mod config;
pub mod engine;
pub mod identity;

pub use config::EngineConfig;
pub use engine::CadenceEngine;
