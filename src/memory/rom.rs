use crate::memory::{AddressRange, BusError, MemoryRegion, RegionKind};

// Read-only from the CPU's point of view. The loader and save-state restore
// still fill it, they are not bus cycles.
pub struct Rom {
  name: String,
  range: AddressRange,
  bytes: Vec<u8>,
}

impl Rom {
  pub fn new(name: &str, range: AddressRange) -> Rom {
    Self::filled(name, range, 0xFF)
  }

  pub fn filled(name: &str, range: AddressRange, fill: u8) -> Rom {
    let bytes = vec![fill; range.size() as usize];
    Rom { name: name.to_string(), range, bytes }
  }

  // image shorter than the range is padded with 0xFF, longer is truncated
  pub fn with_image(name: &str, range: AddressRange, image: &[u8]) -> Rom {
    let mut rom = Self::new(name, range);
    let size = image.len().min(rom.bytes.len());
    rom.bytes[.. size].copy_from_slice(&image[.. size]);
    rom
  }
}

impl MemoryRegion for Rom {
  fn name(&self) -> &str { &self.name }
  fn kind(&self) -> RegionKind { RegionKind::ROM }
  fn range(&self) -> AddressRange { self.range }

  fn read(&mut self, offset: u16) -> u8 {
    self.bytes[offset as usize]
  }

  fn peek(&self, offset: u16) -> u8 {
    self.bytes[offset as usize]
  }

  fn write(&mut self, offset: u16, value: u8) {
    log::trace!("{value:02x} -> {} +{offset:#06x} | ignored, read only", self.name);
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
fn rom_ignores_writes() {
  let range = AddressRange::new(0xE000, 0x2000).unwrap();
  let mut rom = Rom::with_image("kernal", range, &[0x4C, 0x00, 0xE0]);
  rom.write(0, 0xEA);
  assert_eq!(rom.read(0), 0x4C);
  assert_eq!(rom.peek(3), 0xFF); // padding
  rom.load(3, &[0x60]);
  assert_eq!(rom.peek(3), 0x60);
}
