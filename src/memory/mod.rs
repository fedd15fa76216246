pub mod bus;
pub mod ram;
pub mod rom;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use bus::{Access, Bus, MappedSpan, RegionId, WatchHit, MAX_HITS};
pub use ram::Ram;
pub use rom::Rom;

// Everything the CPU touches goes through this trait. `read` is what the
// processor does on the bus and may disturb peripheral latches; `peek` is for
// debuggers and dumps and must never change any state.
pub trait MemoryBus {
  fn read(&mut self, address: Address) -> u8;
  fn write(&mut self, address: Address, value: u8);
  fn peek(&self, address: Address) -> u8;
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(u16);

impl Address {
  pub const fn from(address: u16) -> Self {
    Address(address)
  }

  pub const fn from_le_bytes(lo: u8, hi: u8) -> Address {
    let lo = lo as u16;
    let hi = hi as u16;
    Address(hi << 8 | lo)
  }

  pub const fn to_u16(&self) -> u16 {
    self.0
  }

  pub const fn hi_u8(&self) -> u8 {
    let page = (self.0 & 0xFF00) >> 8;
    page as u8
  }

  pub const fn lo_u8(&self) -> u8 {
    (self.0 & 0x00FF) as u8
  }

  pub const fn page(&self) -> u8 {
    self.hi_u8()
  }

  pub const fn same_page(&self, other: Address) -> bool {
    self.hi_u8() == other.hi_u8()
  }

  pub const fn next(&self) -> Address {
    Address(self.0.wrapping_add(1))
  }

  // wraps inside the current page, the way zero page pointers and the
  // JMP (ind) pointer fetch do
  pub const fn next_in_page(&self) -> Address {
    Address::from_le_bytes(self.lo_u8().wrapping_add(1), self.hi_u8())
  }

  pub const fn offset(&self, displacement: i8) -> Address {
    Address(self.0.wrapping_add_signed(displacement as i16))
  }

  pub fn inc_by(&mut self, plus: u8) {
    self.0 = self.0.wrapping_add(plus.into());
  }

  pub fn dec_by(&mut self, minus: u8) {
    self.0 = self.0.wrapping_sub(minus.into());
  }
}

impl std::fmt::Debug for Address {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "&{:#06x}", self.0)
  }
}

// [start, start + size) over the 64k address space, validated on construction
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawRange", into = "RawRange")]
pub struct AddressRange {
  start: u16,
  size: u32,
}

#[derive(Serialize, Deserialize)]
struct RawRange {
  start: u16,
  size: u32,
}

impl AddressRange {
  pub const ADDRESS_SPACE: u32 = 0x1_0000;

  pub fn new(start: u16, size: u32) -> Result<Self, BusError> {
    if size > Self::ADDRESS_SPACE || start as u32 + size > Self::ADDRESS_SPACE {
      return Err(BusError::InvalidRange { start, size });
    }
    Ok(AddressRange { start, size })
  }

  pub const fn full() -> Self {
    AddressRange { start: 0, size: Self::ADDRESS_SPACE }
  }

  pub const fn page(page: u8) -> Self {
    AddressRange { start: (page as u16) << 8, size: 0x100 }
  }

  pub const fn start(&self) -> Address {
    Address::from(self.start)
  }

  pub const fn size(&self) -> u32 {
    self.size
  }

  // exclusive
  pub const fn end(&self) -> u32 {
    self.start as u32 + self.size
  }

  pub const fn is_empty(&self) -> bool {
    self.size == 0
  }

  pub const fn contains_address(&self, address: Address) -> bool {
    let address = address.to_u16() as u32;
    self.start as u32 <= address && address < self.end()
  }

  pub const fn contains(&self, other: &AddressRange) -> bool {
    self.start <= other.start && other.end() <= self.end()
  }

  pub const fn overlaps(&self, other: &AddressRange) -> bool {
    (self.start as u32) < other.end() && (other.start as u32) < self.end()
  }

  // offset of `address` relative to the start of the range
  pub const fn offset_of(&self, address: Address) -> u16 {
    address.to_u16().wrapping_sub(self.start)
  }

  pub fn iter(&self) -> impl Iterator<Item = Address> {
    (self.start as u32 .. self.end()).map(|a| Address::from(a as u16))
  }
}

impl TryFrom<RawRange> for AddressRange {
  type Error = BusError;
  fn try_from(raw: RawRange) -> Result<Self, Self::Error> {
    AddressRange::new(raw.start, raw.size)
  }
}

impl From<AddressRange> for RawRange {
  fn from(range: AddressRange) -> Self {
    RawRange { start: range.start, size: range.size }
  }
}

impl std::fmt::Debug for AddressRange {
  fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
    write!(f, "&{:#06x}..&{:#07x}", self.start, self.end())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegionKind {
  RAM,
  ROM,
  IO,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
  #[error("no region mapped at {0:?}")]
  DispatchGap(Address),
  #[error("invalid address range: start {start:#06x}, size {size:#x}")]
  InvalidRange { start: u16, size: u32 },
  #[error("unknown region #{0}")]
  UnknownRegion(usize),
  #[error("span {start:#06x}+{size:#x} lies outside region '{region}'")]
  SpanOutsideRegion { region: String, start: u16, size: u32 },
  #[error("snapshot for region '{region}' holds {actual} bytes, expected {expected}")]
  SnapshotSize { region: String, expected: usize, actual: usize },
}

// A block of storage (or a peripheral) answering for one AddressRange.
// Offsets are relative to `range().start()`.
pub trait MemoryRegion {
  fn name(&self) -> &str;
  fn kind(&self) -> RegionKind;
  fn range(&self) -> AddressRange;

  fn read(&mut self, offset: u16) -> u8;
  fn peek(&self, offset: u16) -> u8;
  fn write(&mut self, offset: u16, value: u8);

  // bulk copy, used by loaders; caller guarantees the bytes fit
  fn load(&mut self, offset: u16, bytes: &[u8]) {
    for (i, byte) in bytes.iter().enumerate() {
      self.write(offset.wrapping_add(i as u16), *byte);
    }
  }

  fn snapshot(&self) -> Vec<u8> {
    (0 .. self.range().size()).map(|offset| self.peek(offset as u16)).collect()
  }

  fn restore(&mut self, bytes: &[u8]) -> Result<(), BusError>;

  // elapsed CPU cycles since the last call, for clocked peripherals
  fn tick(&mut self, _cycles: u64) {}
}

pub fn read_address(memory: &mut dyn MemoryBus, address: Address) -> Address {
  let lo = memory.read(address);
  let hi = memory.read(address.next());
  Address::from_le_bytes(lo, hi)
}

pub fn peek_address(memory: &dyn MemoryBus, address: Address) -> Address {
  let lo = memory.peek(address);
  let hi = memory.peek(address.next());
  Address::from_le_bytes(lo, hi)
}

// side effect free copy of `size` bytes starting at `address`
pub fn slice(memory: &dyn MemoryBus, address: Address, size: usize) -> Vec<u8> {
  let mut address = address;
  let mut bytes = Vec::with_capacity(size);
  for _ in 0 .. size {
    bytes.push(memory.peek(address));
    address = address.next();
  }
  bytes
}

#[test]
fn address_helpers() {
  let a = Address::from(0x12FF);
  assert_eq!(a.hi_u8(), 0x12);
  assert_eq!(a.lo_u8(), 0xFF);
  assert_eq!(a.next(), Address::from(0x1300));
  assert_eq!(a.next_in_page(), Address::from(0x1200));
  assert_eq!(a.offset(-0x10), Address::from(0x12EF));
  assert_eq!(Address::from(0xFFFF).offset(1), Address::from(0));
  assert_eq!(format!("{:?}", Address::from(0xC000)), "&0xc000");
}

#[test]
fn address_range_validation() {
  assert!(AddressRange::new(0, 0x1_0000).is_ok());
  assert!(AddressRange::new(0xFFFF, 1).is_ok());
  assert!(AddressRange::new(0xFFFF, 0).is_ok());
  assert_eq!(AddressRange::new(0xFFFF, 2),
             Err(BusError::InvalidRange { start: 0xFFFF, size: 2 }));
  assert!(AddressRange::new(0, 0x1_0001).is_err());

  let outer = AddressRange::new(0x1000, 0x1000).unwrap();
  let inner = AddressRange::new(0x1800, 0x0800).unwrap();
  let straddle = AddressRange::new(0x1F00, 0x0200).unwrap();
  assert!(outer.contains(&inner));
  assert!(!inner.contains(&outer));
  assert!(!outer.contains(&straddle));
  assert!(outer.overlaps(&straddle));
  assert!(outer.contains_address(Address::from(0x1FFF)));
  assert!(!outer.contains_address(Address::from(0x2000)));
  assert_eq!(outer.offset_of(Address::from(0x1234)), 0x0234);
  assert_eq!(AddressRange::full().iter().count(), 0x1_0000);
}
