//! Handlers 模块

pub mod data;
pub mod devices;
pub mod energy;
pub mod polling;
pub mod system;

pub use data::*;
pub use devices::*;
pub use energy::*;
pub use polling::*;
pub use system::*;
