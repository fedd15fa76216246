use thiserror::Error;

use crate::memory::BusError;
use crate::mos6502::CpuError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error(transparent)]
  Cpu(#[from] CpuError),
  #[error(transparent)]
  Bus(#[from] BusError),
  #[error("region '{0}': IO regions are attached by their peripheral, not configured")]
  ConfiguredIo(String),
  #[error("snapshot names region '{name}' at #{index}, machine has '{found}'")]
  RegionMismatch { index: usize, name: String, found: String },
}
