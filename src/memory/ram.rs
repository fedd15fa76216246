use crate::memory::{AddressRange, BusError, MemoryRegion, RegionKind};

pub struct Ram {
  name: String,
  range: AddressRange,
  bytes: Vec<u8>,
}

impl Ram {
  pub fn new(name: &str, range: AddressRange) -> Ram {
    Self::filled(name, range, 0x00)
  }

  pub fn filled(name: &str, range: AddressRange, fill: u8) -> Ram {
    let bytes = vec![fill; range.size() as usize];
    Ram { name: name.to_string(), range, bytes }
  }

  // whole 64k address space
  pub fn full() -> Ram {
    Self::new("ram", AddressRange::full())
  }

  pub fn load_at(&mut self, program: &[u8], offset: u16) -> usize {
    self.load(offset, program);
    program.len()
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.bytes
  }
}

impl MemoryRegion for Ram {
  fn name(&self) -> &str { &self.name }
  fn kind(&self) -> RegionKind { RegionKind::RAM }
  fn range(&self) -> AddressRange { self.range }

  fn read(&mut self, offset: u16) -> u8 {
    self.bytes[offset as usize]
  }

  fn peek(&self, offset: u16) -> u8 {
    self.bytes[offset as usize]
  }

  fn write(&mut self, offset: u16, value: u8) {
    self.bytes[offset as usize] = value;
  }

  fn load(&mut self, offset: u16, bytes: &[u8]) {
    let start = offset as usize;
    self.bytes[start .. start + bytes.len()].copy_from_slice(bytes);
  }

  fn snapshot(&self) -> Vec<u8> {
    self.bytes.clone()
  }

  fn restore(&mut self, bytes: &[u8]) -> Result<(), BusError> {
    if bytes.len() != self.bytes.len() {
      return Err(BusError::SnapshotSize {
        region: self.name.clone(), expected: self.bytes.len(), actual: bytes.len(),
      });
    }
    self.bytes.copy_from_slice(bytes);
    Ok(())
  }
}

#[test]
fn ram_is_offset_relative() {
  let range = AddressRange::new(0x0800, 0x0100).unwrap();
  let mut ram = Ram::filled("low", range, 0xAA);
  assert_eq!(ram.peek(0xFF), 0xAA);
  ram.write(0x10, 0x42);
  assert_eq!(ram.read(0x10), 0x42);
  assert_eq!(ram.load_at(&[1, 2, 3], 0xFD), 3);
  assert_eq!(&ram.as_slice()[0xFD ..], &[1, 2, 3]);
}

#[test]
fn ram_restore_checks_size() {
  let range = AddressRange::new(0, 4).unwrap();
  let mut ram = Ram::new("tiny", range);
  assert!(ram.restore(&[1, 2, 3, 4]).is_ok());
  assert_eq!(ram.snapshot(), vec![1, 2, 3, 4]);
  assert_eq!(ram.restore(&[1]), Err(BusError::SnapshotSize {
    region: "tiny".to_string(), expected: 4, actual: 1,
  }));
}
