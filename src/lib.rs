pub mod devices;
pub mod error;
pub mod machine;
pub mod memory;
pub mod mos6502; // CPU

pub use error::Error;
pub use machine::{Machine, MachineConfig, MachineSnapshot, RegionConfig, RunReport};
