// Peripheral side of the bus.
//
// A peripheral (timer, video chip, serial port, ...) implements `Device` with
// offset based register access and is attached to the bus wrapped in an
// `IoRegion`, which gives it an address range and kind IO. All CPU reads and
// writes in that range end up here, debugger peeks included.

use std::cell::Cell;

use crate::memory::{AddressRange, BusError, MemoryRegion, RegionKind};

#[derive(Debug)]
pub struct Signal(Cell<bool>);
impl Signal {
  pub const fn new() -> Self {
    Signal(Cell::new(false))
  }

  pub fn raise(&self) {
    self.0.set(true);
  }

  // read and acknowledge
  pub fn sense(&self) -> bool {
    self.0.replace(false)
  }

  pub fn is_raised(&self) -> bool {
    self.0.get()
  }
}

impl Default for Signal {
  fn default() -> Self {
    Self::new()
  }
}

pub trait Device {
  fn name(&self) -> &'static str;

  // CPU read, may clear latches and the like
  fn read(&mut self, offset: u16) -> u8 {
    self.peek(offset)
  }

  // debugger read, must not change anything
  fn peek(&self, offset: u16) -> u8;

  fn write(&mut self, offset: u16, value: u8);

  // cycles elapsed since the previous call
  fn step(&mut self, _cycles: u64) {}

  // load register state captured by a snapshot; false if unsupported
  fn restore(&mut self, _registers: &[u8]) -> bool {
    false
  }
}

pub struct IoRegion<D: Device> {
  name: String,
  range: AddressRange,
  device: D,
}

impl<D: Device> IoRegion<D> {
  pub fn new(name: &str, range: AddressRange, device: D) -> Self {
    IoRegion { name: name.to_string(), range, device }
  }

  pub fn device(&self) -> &D {
    &self.device
  }

  pub fn device_mut(&mut self) -> &mut D {
    &mut self.device
  }
}

impl<D: Device> MemoryRegion for IoRegion<D> {
  fn name(&self) -> &str { &self.name }
  fn kind(&self) -> RegionKind { RegionKind::IO }
  fn range(&self) -> AddressRange { self.range }

  fn read(&mut self, offset: u16) -> u8 {
    let value = self.device.read(offset);
    log::trace!("+{offset:#06x} -> {value:02x} | Reading from {} ({})", self.name, self.device.name());
    value
  }

  fn peek(&self, offset: u16) -> u8 {
    self.device.peek(offset)
  }

  fn write(&mut self, offset: u16, value: u8) {
    log::trace!("{value:02x} -> +{offset:#06x} | Writing to {} ({})", self.name, self.device.name());
    self.device.write(offset, value);
  }

  fn restore(&mut self, bytes: &[u8]) -> Result<(), BusError> {
    let expected = self.range.size() as usize;
    if bytes.len() != expected {
      return Err(BusError::SnapshotSize { region: self.name.clone(), expected, actual: bytes.len() });
    }
    if !self.device.restore(bytes) {
      log::warn!("{} ({}) cannot restore its registers, left as is", self.name, self.device.name());
    }
    Ok(())
  }

  fn tick(&mut self, cycles: u64) {
    self.device.step(cycles);
  }
}

// Nothing fitted: reads float to a fixed value, writes vanish.
#[derive(Debug)]
pub struct Unpopulated {
  floating: u8,
}

impl Unpopulated {
  pub const fn new(floating: u8) -> Self {
    Unpopulated { floating }
  }
}

impl Device for Unpopulated {
  fn name(&self) -> &'static str { "unpopulated" }

  fn peek(&self, _offset: u16) -> u8 {
    self.floating
  }

  fn write(&mut self, offset: u16, value: u8) {
    log::trace!("{value:02x} -> +{offset:#06x} | nothing there");
  }

  fn restore(&mut self, _registers: &[u8]) -> bool {
    true // stateless
  }
}

#[test]
fn signal_is_edge_latched() {
  let signal = Signal::new();
  assert!(!signal.sense());
  signal.raise();
  signal.raise();
  assert!(signal.is_raised());
  assert!(signal.sense());
  assert!(!signal.sense());
}

#[test]
fn unpopulated_floats() {
  let range = AddressRange::new(0xDE00, 0x200).unwrap();
  let mut io = IoRegion::new("expansion", range, Unpopulated::new(0xFF));
  io.write(0, 0x12);
  assert_eq!(io.read(0), 0xFF);
  assert_eq!(io.peek(0x1FF), 0xFF);
  assert_eq!(io.kind(), RegionKind::IO);
  assert_eq!(io.snapshot().len(), 0x200);
  assert!(io.restore(&[0; 0x200]).is_ok());
  assert!(io.restore(&[0; 3]).is_err());
  *io.device_mut() = Unpopulated::new(0x00);
  assert_eq!(io.device().peek(0), 0x00);
}
