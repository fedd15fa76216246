// Address space dispatcher.
//
// Every one of the 65536 addresses points at the region currently answering
// for it. Regions are attached once and stay attached: mapping a region again
// (bank switching) only rewrites the lookup table for its range, so whatever
// it shadows keeps its storage and comes back when mapped in again. The most
// recent mapping wins, overlaps are not rejected.

use serde::{Deserialize, Serialize};

use crate::memory::{Address, AddressRange, BusError, MemoryBus, MemoryRegion};

const ADDRESS_SPACE: usize = AddressRange::ADDRESS_SPACE as usize;

// hits kept until `take_hits`, later ones are dropped
pub const MAX_HITS: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegionId(usize);

impl RegionId {
  pub const fn index(&self) -> usize {
    self.0
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
  Read,
  Write,
  Any,
}

impl Access {
  const fn matches(&self, access: Access) -> bool {
    matches!((self, access), (Access::Any, _) | (Access::Read, Access::Read) | (Access::Write, Access::Write))
  }
}

// One run of consecutive addresses answered by the same region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappedSpan {
  pub region: usize,
  pub start: u16,
  pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchHit {
  pub address: Address,
  pub value: u8,
  pub access: Access,
}

struct Watchpoint {
  range: AddressRange,
  access: Access,
}

pub struct Bus {
  regions: Vec<Box<dyn MemoryRegion>>,
  dispatch: Box<[Option<RegionId>]>,
  watchpoints: Vec<Watchpoint>,
  hits: Vec<WatchHit>,
}

impl Default for Bus {
  fn default() -> Self {
    Self::new()
  }
}

impl Bus {
  pub fn new() -> Self {
    Bus {
      regions: Vec::new(),
      dispatch: vec![None; ADDRESS_SPACE].into_boxed_slice(),
      watchpoints: Vec::new(),
      hits: Vec::new(),
    }
  }

  // flat 64k of RAM, handy for running bare programs
  pub fn with_ram() -> Self {
    let mut bus = Self::new();
    bus.add(Box::new(crate::memory::Ram::full()));
    bus
  }

  // Register a region without making it visible
  pub fn attach(&mut self, region: Box<dyn MemoryRegion>) -> RegionId {
    let id = RegionId(self.regions.len());
    log::debug!("attach #{} '{}' {:?} {:?}", id.0, region.name(), region.kind(), region.range());
    self.regions.push(region);
    id
  }

  // (Re)map a region over its range; last one mapped wins
  pub fn map(&mut self, id: RegionId) -> Result<(), BusError> {
    if id.0 >= self.regions.len() {
      return Err(BusError::UnknownRegion(id.0));
    }
    self.remap(id);
    Ok(())
  }

  pub fn add(&mut self, region: Box<dyn MemoryRegion>) -> RegionId {
    let id = self.attach(region);
    self.remap(id);
    id
  }

  fn remap(&mut self, id: RegionId) {
    let range = self.regions[id.0].range();
    let mut shadowed: Vec<RegionId> = Vec::new();
    for address in range.iter() {
      let entry = &mut self.dispatch[address.to_u16() as usize];
      if let Some(previous) = *entry {
        if previous != id && !shadowed.contains(&previous) {
          shadowed.push(previous);
        }
      }
      *entry = Some(id);
    }
    let shadowed: Vec<&str> = shadowed.iter().map(|s| self.regions[s.0].name()).collect();
    log::debug!("map '{}' at {range:?}, shadowing {shadowed:?}", self.regions[id.0].name());
  }

  // Current dispatch table as runs, lowest address first. Unowned addresses
  // are left out.
  pub fn layout(&self) -> Vec<MappedSpan> {
    let mut spans: Vec<MappedSpan> = Vec::new();
    for (address, owner) in self.dispatch.iter().enumerate() {
      let Some(id) = owner else { continue };
      match spans.last_mut() {
        Some(span) if span.region == id.0 && span.start as usize + span.size as usize == address => {
          span.size += 1;
        },
        _ => spans.push(MappedSpan { region: id.0, start: address as u16, size: 1 }),
      }
    }
    spans
  }

  // Rebuild the dispatch table from `layout`, e.g. to bring back the banks
  // that were mapped when a snapshot was taken.
  pub fn apply_layout(&mut self, layout: &[MappedSpan]) -> Result<(), BusError> {
    self.check_layout(layout)?;
    self.dispatch.fill(None);
    for span in layout {
      let start = span.start as usize;
      let end = start + span.size as usize;
      self.dispatch[start .. end].fill(Some(RegionId(span.region)));
    }
    log::debug!("restored layout of {} spans", layout.len());
    Ok(())
  }

  // Every span must name an attached region and lie inside that region's
  // own range, otherwise offsets would run past its storage
  pub fn check_layout(&self, layout: &[MappedSpan]) -> Result<(), BusError> {
    for span in layout {
      let Some(region) = self.regions.get(span.region) else {
        return Err(BusError::UnknownRegion(span.region));
      };
      let range = AddressRange::new(span.start, span.size)?;
      if !region.range().contains(&range) {
        return Err(BusError::SpanOutsideRegion {
          region: region.name().to_string(), start: span.start, size: span.size,
        });
      }
    }
    Ok(())
  }

  pub fn owner(&self, address: Address) -> Option<RegionId> {
    self.dispatch[address.to_u16() as usize]
  }

  pub fn region(&self, id: RegionId) -> Option<&dyn MemoryRegion> {
    self.regions.get(id.0).map(|r| r.as_ref())
  }

  pub fn region_mut(&mut self, id: RegionId) -> Option<&mut (dyn MemoryRegion + 'static)> {
    self.regions.get_mut(id.0).map(|r| r.as_mut())
  }

  pub fn find(&self, name: &str) -> Option<RegionId> {
    self.regions.iter().position(|r| r.name() == name).map(RegionId)
  }

  // every attached region, mapped or not, in attach order
  pub fn regions(&self) -> impl Iterator<Item = (RegionId, &dyn MemoryRegion)> {
    self.regions.iter().enumerate().map(|(i, r)| (RegionId(i), r.as_ref()))
  }

  // every address must be owned by some region
  pub fn validate(&self) -> Result<(), BusError> {
    match self.dispatch.iter().position(Option::is_none) {
      Some(gap) => Err(BusError::DispatchGap(Address::from(gap as u16))),
      None => Ok(()),
    }
  }

  fn lookup(&self, address: Address) -> Result<RegionId, BusError> {
    self.owner(address).ok_or(BusError::DispatchGap(address))
  }

  pub fn try_read(&mut self, address: Address) -> Result<u8, BusError> {
    let id = self.lookup(address)?;
    let region = &mut self.regions[id.0];
    let offset = region.range().offset_of(address);
    let value = region.read(offset);
    self.check_watchpoints(address, value, Access::Read);
    Ok(value)
  }

  pub fn try_write(&mut self, address: Address, value: u8) -> Result<(), BusError> {
    let id = self.lookup(address)?;
    let region = &mut self.regions[id.0];
    let offset = region.range().offset_of(address);
    region.write(offset, value);
    self.check_watchpoints(address, value, Access::Write);
    Ok(())
  }

  pub fn try_peek(&self, address: Address) -> Result<u8, BusError> {
    let id = self.lookup(address)?;
    let region = &self.regions[id.0];
    Ok(region.peek(region.range().offset_of(address)))
  }

  pub fn read_word(&mut self, address: Address) -> u16 {
    let lo = self.read(address);
    let hi = self.read(address.next());
    Address::from_le_bytes(lo, hi).to_u16()
  }

  pub fn write_word(&mut self, address: Address, value: u16) {
    let [lo, hi] = value.to_le_bytes();
    self.write(address, lo);
    self.write(address.next(), hi);
  }

  pub fn peek_word(&self, address: Address) -> u16 {
    let lo = self.peek(address);
    let hi = self.peek(address.next());
    Address::from_le_bytes(lo, hi).to_u16()
  }

  // Loader path: copies straight into region storage (ROM included) without
  // watchpoint checks. One region owning the whole span gets a single bulk
  // load, anything else goes byte by byte. Wraps at the top of memory.
  pub fn bulk_copy(&mut self, address: Address, bytes: &[u8]) -> Result<(), BusError> {
    if bytes.is_empty() {
      return Ok(());
    }
    let start = address.to_u16() as usize;
    let end = start + bytes.len();
    let first = self.lookup(address)?;
    let single_owner = end <= ADDRESS_SPACE
      && self.dispatch[start .. end].iter().all(|owner| *owner == Some(first));

    if single_owner {
      let region = &mut self.regions[first.0];
      let offset = region.range().offset_of(address);
      region.load(offset, bytes);
      return Ok(());
    }

    log::debug!("bulk copy of {} bytes at {address:?} spans regions", bytes.len());
    let mut address = address;
    for byte in bytes {
      let id = self.lookup(address)?;
      let region = &mut self.regions[id.0];
      let offset = region.range().offset_of(address);
      region.load(offset, std::slice::from_ref(byte));
      address = address.next();
    }
    Ok(())
  }

  // side effect free
  pub fn dump(&self, range: AddressRange) -> Vec<u8> {
    range.iter().map(|address| self.peek(address)).collect()
  }

  pub fn tick(&mut self, cycles: u64) {
    for region in self.regions.iter_mut() {
      region.tick(cycles);
    }
  }

  pub fn watch(&mut self, range: AddressRange, access: Access) {
    log::debug!("watch {range:?} for {access:?}");
    self.watchpoints.push(Watchpoint { range, access });
  }

  pub fn clear_watchpoints(&mut self) {
    self.watchpoints.clear();
    self.hits.clear();
  }

  pub fn has_hits(&self) -> bool {
    !self.hits.is_empty()
  }

  // Hits pile up (up to MAX_HITS) until taken. `Machine::run` drains them,
  // callers driving `CPU::run` themselves have to.
  pub fn take_hits(&mut self) -> Vec<WatchHit> {
    std::mem::take(&mut self.hits)
  }

  fn check_watchpoints(&mut self, address: Address, value: u8, access: Access) {
    let hit = self.watchpoints.iter()
      .any(|w| w.access.matches(access) && w.range.contains_address(address));
    if !hit {
      return;
    }
    if self.hits.len() >= MAX_HITS {
      log::trace!("watchpoint {access:?} {address:?} dropped, {MAX_HITS} hits not taken");
      return;
    }
    log::trace!("watchpoint {access:?} {address:?} = {value:#04x}");
    self.hits.push(WatchHit { address, value, access });
  }
}

impl MemoryBus for Bus {
  fn read(&mut self, address: Address) -> u8 {
    match self.try_read(address) {
      Ok(value) => value,
      Err(error) => panic!("{error}"),
    }
  }

  fn write(&mut self, address: Address, value: u8) {
    if let Err(error) = self.try_write(address, value) {
      panic!("{error}");
    }
  }

  fn peek(&self, address: Address) -> u8 {
    match self.try_peek(address) {
      Ok(value) => value,
      Err(error) => panic!("{error}"),
    }
  }
}

#[test]
fn dispatch_gap_is_reported() {
  let mut bus = Bus::new();
  let low = AddressRange::new(0, 0x8000).unwrap();
  bus.add(Box::new(crate::memory::Ram::new("low", low)));
  assert_eq!(bus.validate(), Err(BusError::DispatchGap(Address::from(0x8000))));
  assert_eq!(bus.try_read(Address::from(0x9000)), Err(BusError::DispatchGap(Address::from(0x9000))));
  assert_eq!(bus.try_read(Address::from(0x7FFF)), Ok(0));
}

#[test]
fn unknown_region_cannot_be_mapped() {
  let mut bus = Bus::with_ram();
  assert_eq!(bus.map(RegionId(7)), Err(BusError::UnknownRegion(7)));
}

#[test]
fn words_are_little_endian() {
  let mut bus = Bus::with_ram();
  bus.write_word(Address::from(0x0300), 0x1234);
  assert_eq!(bus.peek(Address::from(0x0300)), 0x34);
  assert_eq!(bus.peek(Address::from(0x0301)), 0x12);
  assert_eq!(bus.read_word(Address::from(0x0300)), 0x1234);
  assert_eq!(bus.peek_word(Address::from(0x0300)), 0x1234);
}

#[test]
fn watchpoints_ignore_peek() {
  let mut bus = Bus::with_ram();
  bus.watch(AddressRange::page(0xD0), Access::Write);
  bus.peek(Address::from(0xD000));
  bus.read(Address::from(0xD000));
  assert!(!bus.has_hits());
  bus.write(Address::from(0xD020), 6);
  assert_eq!(bus.take_hits(), vec![WatchHit {
    address: Address::from(0xD020), value: 6, access: Access::Write,
  }]);
  assert!(!bus.has_hits());
}

#[test]
fn layout_follows_bank_switches() {
  let mut bus = Bus::with_ram();
  let bank = AddressRange::new(0x8000, 0x4000).unwrap();
  let basic = bus.attach(Box::new(crate::memory::Rom::filled("basic", bank, 0xB0)));
  let rom = bus.attach(Box::new(crate::memory::Rom::filled("dfs", bank, 0xD0)));
  bus.map(basic).unwrap();
  let before = bus.layout();
  assert_eq!(before, vec![
    MappedSpan { region: 0, start: 0x0000, size: 0x8000 },
    MappedSpan { region: basic.index(), start: 0x8000, size: 0x4000 },
    MappedSpan { region: 0, start: 0xC000, size: 0x4000 },
  ]);

  bus.map(rom).unwrap();
  assert_eq!(bus.peek(Address::from(0x8000)), 0xD0);
  bus.apply_layout(&before).unwrap();
  assert_eq!(bus.peek(Address::from(0x8000)), 0xB0);
  let bad = [MappedSpan { region: 9, start: 0, size: 1 }];
  assert_eq!(bus.apply_layout(&bad), Err(BusError::UnknownRegion(9)));
}

#[test]
fn layout_must_stay_inside_regions() {
  let mut bus = Bus::new();
  bus.add(Box::new(crate::memory::Ram::new("ram", AddressRange::new(0, 0x8000).unwrap())));
  bus.add(Box::new(crate::memory::Ram::new("hi", AddressRange::new(0x8000, 0x8000).unwrap())));
  let before = bus.layout();

  let stray = [MappedSpan { region: 1, start: 0x0000, size: 0x100 }];
  assert_eq!(bus.apply_layout(&stray), Err(BusError::SpanOutsideRegion {
    region: "hi".into(), start: 0x0000, size: 0x100,
  }));
  let straddle = [MappedSpan { region: 0, start: 0x7F00, size: 0x200 }];
  assert!(bus.apply_layout(&straddle).is_err());
  assert_eq!(bus.apply_layout(&[MappedSpan { region: 0, start: 0xFFFF, size: 2 }]),
    Err(BusError::InvalidRange { start: 0xFFFF, size: 2 }));

  // rejected layouts leave the table alone
  assert_eq!(bus.layout(), before);
  assert_eq!(bus.peek(Address::from(0x0000)), 0);
}

#[test]
fn unclaimed_hits_are_bounded() {
  let mut bus = Bus::with_ram();
  bus.watch(AddressRange::page(0x02), Access::Any);
  for i in 0 .. MAX_HITS + 10 {
    bus.write(Address::from(0x0200 | (i as u16 & 0xFF)), i as u8);
  }
  let hits = bus.take_hits();
  assert_eq!(hits.len(), MAX_HITS);
  assert_eq!(hits[0].value, 0);
  bus.read(Address::from(0x0200));
  assert_eq!(bus.take_hits().len(), 1);
}
