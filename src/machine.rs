// A CPU wired to a bus, plus the interrupt lines of whatever peripherals got
// attached. This is the loop a front end drives: step, tick, sample lines.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::devices::{Device, IoRegion, Signal};
use crate::error::Error;
use crate::memory::{Address, AddressRange, Bus, BusError, MappedSpan, Ram, RegionId, RegionKind, Rom, WatchHit};
use crate::mos6502::disassemble::disassemble_at;
use crate::mos6502::{Breakpoint, Interrupt, RegisterSnapshot, CPU};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionConfig {
  pub name: String,
  pub kind: RegionKind,
  pub start: u16,
  pub size: u32,
  #[serde(default)]
  pub fill: u8,
}

impl RegionConfig {
  pub fn ram(name: &str, start: u16, size: u32) -> Self {
    RegionConfig { name: name.to_string(), kind: RegionKind::RAM, start, size, fill: 0 }
  }

  pub fn rom(name: &str, start: u16, size: u32) -> Self {
    RegionConfig { name: name.to_string(), kind: RegionKind::ROM, start, size, fill: 0xFF }
  }
}

// Initial memory map, mapped in order so later entries shadow earlier ones
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineConfig {
  pub regions: Vec<RegionConfig>,
  #[serde(default)]
  pub trace_instructions: bool,
}

impl Default for MachineConfig {
  fn default() -> Self {
    MachineConfig {
      regions: vec![RegionConfig::ram("ram", 0x0000, AddressRange::ADDRESS_SPACE)],
      trace_instructions: false,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSnapshot {
  pub name: String,
  pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSnapshot {
  pub registers: RegisterSnapshot,
  pub regions: Vec<RegionSnapshot>,
  #[serde(default)]
  pub layout: Vec<MappedSpan>,
}

// What a run did: cycles spent and the watchpoint hits that ended it
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
  pub cycles: u64,
  pub hits: Vec<WatchHit>,
}

impl RunReport {
  pub fn stopped_on_watchpoint(&self) -> bool {
    !self.hits.is_empty()
  }
}

pub struct Machine {
  pub cpu: CPU,
  pub bus: Bus,
  irq_lines: Vec<Rc<Signal>>,
  nmi_lines: Vec<Rc<Signal>>,
  trace: bool,
}

impl Default for Machine {
  fn default() -> Self {
    Self::new()
  }
}

impl Machine {
  // flat 64k RAM
  pub fn new() -> Self {
    Machine {
      cpu: CPU::new(),
      bus: Bus::with_ram(),
      irq_lines: Vec::new(),
      nmi_lines: Vec::new(),
      trace: false,
    }
  }

  pub fn from_config(config: &MachineConfig) -> Result<Self, Error> {
    let mut bus = Bus::new();
    for region in &config.regions {
      let range = AddressRange::new(region.start, region.size)?;
      match region.kind {
        RegionKind::RAM => bus.add(Box::new(Ram::filled(&region.name, range, region.fill))),
        RegionKind::ROM => bus.add(Box::new(Rom::filled(&region.name, range, region.fill))),
        RegionKind::IO => return Err(Error::ConfiguredIo(region.name.clone())),
      };
    }
    Ok(Machine {
      cpu: CPU::new(),
      bus,
      irq_lines: Vec::new(),
      nmi_lines: Vec::new(),
      trace: config.trace_instructions,
    })
  }

  // Map a peripheral over `range`, shadowing whatever answered there before
  pub fn attach_io<D: Device + 'static>(&mut self, name: &str, range: AddressRange, device: D) -> RegionId {
    self.bus.add(Box::new(IoRegion::new(name, range, device)))
  }

  // Lines are wire-ORed: any raised line requests an IRQ
  pub fn connect_irq(&mut self, line: Rc<Signal>) {
    self.irq_lines.push(line);
  }

  pub fn connect_nmi(&mut self, line: Rc<Signal>) {
    self.nmi_lines.push(line);
  }

  pub fn load(&mut self, address: u16, bytes: &[u8]) -> Result<(), Error> {
    self.bus.bulk_copy(Address::from(address), bytes)?;
    Ok(())
  }

  // Writes the vector through the loader path, so it lands in ROM as well
  pub fn set_reset_vector(&mut self, address: u16) -> Result<(), Error> {
    self.load(Interrupt::Reset.vector().to_u16(), &address.to_le_bytes())
  }

  pub fn reset(&mut self) -> u32 {
    let cycles = self.cpu.reset(&mut self.bus);
    self.bus.tick(cycles as u64);
    cycles
  }

  pub fn step(&mut self) -> Result<u32, Error> {
    if self.trace {
      let (text, _) = disassemble_at(&self.bus, self.cpu.registers.pc);
      log::trace!("{text}");
    }
    let cycles = self.cpu.step(&mut self.bus)?;
    self.bus.tick(cycles as u64);
    self.sample_lines();
    Ok(cycles)
  }

  fn sample_lines(&mut self) {
    // sense every line so each one gets acknowledged
    let irq = self.irq_lines.iter().fold(false, |raised, line| line.sense() | raised);
    if irq {
      self.cpu.queue_interrupt(Interrupt::Irq);
    }
    let nmi = self.nmi_lines.iter().fold(false, |raised, line| line.sense() | raised);
    if nmi {
      self.cpu.queue_interrupt(Interrupt::Nmi);
    }
  }

  // Runs until `stop` holds or a watchpoint fires. Hits left over from
  // before the run are dropped, the ones that stopped it are returned.
  pub fn run(&mut self, stop: &Breakpoint) -> Result<RunReport, Error> {
    self.drop_stale_hits();
    let mut cycles = 0;
    while !stop(&self.cpu, &self.bus) {
      cycles += self.step()? as u64;
      if self.bus.has_hits() {
        break;
      }
    }
    Ok(RunReport { cycles, hits: self.bus.take_hits() })
  }

  // Runs at least `cycles` cycles unless a watchpoint fires first
  pub fn run_for(&mut self, cycles: u64) -> Result<RunReport, Error> {
    self.drop_stale_hits();
    let mut elapsed = 0;
    while elapsed < cycles {
      elapsed += self.step()? as u64;
      if self.bus.has_hits() {
        break;
      }
    }
    Ok(RunReport { cycles: elapsed, hits: self.bus.take_hits() })
  }

  fn drop_stale_hits(&mut self) {
    let stale = self.bus.take_hits();
    if !stale.is_empty() {
      log::debug!("dropping {} watchpoint hits from before the run", stale.len());
    }
  }

  pub fn snapshot(&self) -> MachineSnapshot {
    let regions = self.bus.regions()
      .map(|(_, region)| RegionSnapshot { name: region.name().to_string(), bytes: region.snapshot() })
      .collect();
    MachineSnapshot { registers: self.cpu.snapshot(), regions, layout: self.bus.layout() }
  }

  // Regions are matched by attach order and must carry the same name.
  // Extra entries in the snapshot are skipped with a warning. Nothing is
  // touched unless the whole snapshot fits this machine.
  pub fn restore(&mut self, snapshot: &MachineSnapshot) -> Result<(), Error> {
    let mut matched: Vec<(RegionId, &RegionSnapshot)> = Vec::new();
    for (index, ((id, region), saved)) in self.bus.regions().zip(&snapshot.regions).enumerate() {
      if region.name() != saved.name {
        return Err(Error::RegionMismatch {
          index,
          name: saved.name.clone(),
          found: region.name().to_string(),
        });
      }
      let expected = region.range().size() as usize;
      if saved.bytes.len() != expected {
        return Err(BusError::SnapshotSize {
          region: saved.name.clone(), expected, actual: saved.bytes.len(),
        }.into());
      }
      matched.push((id, saved));
    }
    for (index, saved) in snapshot.regions.iter().enumerate().skip(matched.len()) {
      log::warn!("snapshot region #{index} '{}' has no counterpart, skipped", saved.name);
    }
    self.bus.check_layout(&snapshot.layout)?;

    for (id, saved) in matched {
      if let Some(region) = self.bus.region_mut(id) {
        region.restore(&saved.bytes)?;
      }
    }
    if !snapshot.layout.is_empty() {
      self.bus.apply_layout(&snapshot.layout)?;
    }
    self.cpu.restore(&snapshot.registers);
    Ok(())
  }
}

#[test]
fn config_builds_the_memory_map() {
  use crate::memory::MemoryBus;
  let config = MachineConfig {
    regions: vec![
      RegionConfig::ram("ram", 0x0000, 0x8000),
      RegionConfig::rom("os", 0x8000, 0x8000),
    ],
    trace_instructions: false,
  };
  let machine = Machine::from_config(&config).unwrap();
  assert_eq!(machine.bus.validate(), Ok(()));
  assert_eq!(machine.bus.peek(Address::from(0x7FFF)), 0x00);
  assert_eq!(machine.bus.peek(Address::from(0x8000)), 0xFF);
}

#[test]
fn config_rejects_io_and_bad_ranges() {
  let mut config = MachineConfig::default();
  config.regions.push(RegionConfig { name: "via".into(), kind: RegionKind::IO, start: 0xFE40, size: 0x10, fill: 0 });
  assert_eq!(Machine::from_config(&config).err(), Some(Error::ConfiguredIo("via".into())));

  let config = MachineConfig { regions: vec![RegionConfig::ram("huge", 0x8000, 0x10000)], trace_instructions: false };
  assert!(matches!(Machine::from_config(&config), Err(Error::Bus(_))));
}
