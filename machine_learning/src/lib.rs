pub mod arch;
pub mod config;
pub mod data;
mod device;
pub mod error;
pub mod optimization;
pub mod training;

pub use device::Device;
pub use error::{MlErr, Result};
