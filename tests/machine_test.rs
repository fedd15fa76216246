use std::rc::Rc;

use micro8::devices::{Device, Signal};
use micro8::memory::{Access, Address, AddressRange, BusError, MappedSpan, MemoryBus};
use micro8::mos6502::{stop_at, stop_when, Interrupt};
use micro8::{Error, Machine, MachineConfig, MachineSnapshot, RegionConfig};

// Free running countdown: writing register 0 arms it, reaching zero raises
// the IRQ line and sets bit 7 of register 1 until register 1 is read.
struct Countdown {
  irq: Rc<Signal>,
  counter: u64,
  status: u8,
}

impl Countdown {
  fn new() -> Self {
    Countdown { irq: Rc::new(Signal::new()), counter: 0, status: 0 }
  }
}

impl Device for Countdown {
  fn name(&self) -> &'static str { "countdown" }

  fn read(&mut self, offset: u16) -> u8 {
    let value = self.peek(offset);
    if offset == 1 {
      self.status = 0;
    }
    value
  }

  fn peek(&self, offset: u16) -> u8 {
    match offset {
      0 => self.counter.min(0xFF) as u8,
      _ => self.status,
    }
  }

  fn write(&mut self, offset: u16, value: u8) {
    if offset == 0 {
      self.counter = value as u64;
    }
  }

  fn step(&mut self, cycles: u64) {
    if self.counter == 0 {
      return;
    }
    if cycles >= self.counter {
      self.counter = 0;
      self.status = 0x80;
      self.irq.raise();
    } else {
      self.counter -= cycles;
    }
  }
}

// $C000: LDA #$40; STA $FE00; CLI; loop: JMP loop
// $D000: LDA $FE01; STA $10; INC $11; RTI
fn countdown_machine() -> (Machine, Rc<Signal>) {
  let config = MachineConfig {
    regions: vec![
      RegionConfig::ram("ram", 0x0000, 0xC000),
      RegionConfig::rom("os", 0xC000, 0x4000),
    ],
    trace_instructions: true,
  };
  let mut machine = Machine::from_config(&config).unwrap();
  let countdown = Countdown::new();
  let irq = countdown.irq.clone();
  machine.attach_io("countdown", AddressRange::new(0xFE00, 0x10).unwrap(), countdown);
  machine.connect_irq(irq.clone());

  machine.load(0xC000, &[0xA9, 0x40, 0x8D, 0x00, 0xFE, 0x58, 0x4C, 0x06, 0xC0]).unwrap();
  machine.load(0xD000, &[0xAD, 0x01, 0xFE, 0x85, 0x10, 0xE6, 0x11, 0x40]).unwrap();
  machine.load(0xFFFE, &[0x00, 0xD0]).unwrap();
  machine.set_reset_vector(0xC000).unwrap();
  (machine, irq)
}

#[test]
fn timer_interrupt_reaches_the_handler() {
  // instruction trace, visible with --nocapture
  let _ = simple_logger::init_with_level(log::Level::Trace);
  let (mut machine, irq) = countdown_machine();
  assert_eq!(machine.reset(), 7);
  assert_eq!(machine.cpu.registers.pc, Address::from(0xC000));

  const RTI: u8 = 0x40;
  machine.run(&stop_when::<RTI>).unwrap();
  assert_eq!(machine.bus.peek(Address::from(0x0010)), 0x80);
  assert_eq!(machine.bus.peek(Address::from(0x0011)), 1);
  // acknowledged by the machine and by the handler
  assert!(!irq.is_raised());
  assert_eq!(machine.bus.peek(Address::from(0xFE01)), 0x00);

  machine.step().unwrap();
  assert_eq!(machine.cpu.registers.pc, Address::from(0xC006));
  assert!(!machine.cpu.registers.p.has::<'I'>());
}

#[test]
fn masked_line_stays_pending() {
  let (mut machine, _) = countdown_machine();
  // replace CLI with NOP
  machine.load(0xC005, &[0xEA]).unwrap();
  machine.reset();
  machine.run_for(200).unwrap();
  assert!(machine.cpu.pending().contains(Interrupt::Irq));
  assert_eq!(machine.bus.peek(Address::from(0x0011)), 0);
}

#[test]
fn run_stops_on_watchpoint() {
  let (mut machine, _) = countdown_machine();
  machine.bus.watch(AddressRange::new(0x0010, 1).unwrap(), Access::Write);
  machine.reset();
  let report = machine.run(&stop_at::<0x0000>).unwrap();
  assert!(report.stopped_on_watchpoint());
  assert_eq!(report.hits.len(), 1);
  assert_eq!(report.hits[0].value, 0x80);
  assert!(report.cycles > 0);
  // stopped right after the STA $10 in the handler, hits drained
  assert_eq!(machine.cpu.registers.pc, Address::from(0xD005));
  assert!(!machine.bus.has_hits());

  // the watchpoint stays armed but nothing writes $10 again
  let report = machine.run_for(100).unwrap();
  assert!(!report.stopped_on_watchpoint());
  assert!(report.cycles >= 100);
}

#[test]
fn stale_hits_do_not_stop_the_next_run() {
  let (mut machine, _) = countdown_machine();
  machine.bus.watch(AddressRange::new(0x0020, 1).unwrap(), Access::Any);
  machine.reset();
  machine.bus.write(Address::from(0x0020), 1);
  assert!(machine.bus.has_hits());
  let report = machine.run_for(50).unwrap();
  assert!(report.hits.is_empty());
  assert!(report.cycles >= 50);
}

#[test]
fn halt_surfaces_as_machine_error() {
  let mut machine = Machine::new();
  machine.load(0x0400, &[0xEA, 0x02]).unwrap();
  machine.set_reset_vector(0x0400).unwrap();
  machine.reset();
  let error = machine.run_for(1000).unwrap_err();
  assert!(matches!(error, Error::Cpu(_)));
  assert_eq!(error.to_string(), "invalid opcode 0x02 at &0x0401");
}

#[test]
fn snapshot_round_trips_through_json() {
  let (mut machine, _) = countdown_machine();
  machine.reset();
  machine.run_for(30).unwrap();
  let snapshot = machine.snapshot();
  assert_eq!(snapshot.regions.len(), 3);
  assert_eq!(snapshot.regions[2].name, "countdown");

  let json = serde_json::to_string(&snapshot).unwrap();
  let decoded: MachineSnapshot = serde_json::from_str(&json).unwrap();
  assert_eq!(decoded, snapshot);

  // keep running, then rewind
  machine.run_for(500).unwrap();
  assert_ne!(machine.snapshot(), snapshot);
  machine.restore(&decoded).unwrap();
  assert_eq!(machine.cpu.snapshot(), snapshot.registers);
  assert_eq!(machine.bus.peek(Address::from(0x0011)), 0);
  assert_eq!(machine.bus.peek(Address::from(0xC000)), 0xA9);
}

#[test]
fn restore_rejects_other_machines() {
  let (machine, _) = countdown_machine();
  let snapshot = machine.snapshot();
  let config = MachineConfig {
    regions: vec![
      RegionConfig::ram("ram", 0x0000, 0xC000),
      RegionConfig::rom("basic", 0xC000, 0x4000),
    ],
    trace_instructions: false,
  };
  let mut other = Machine::from_config(&config).unwrap();
  assert!(matches!(other.restore(&snapshot), Err(Error::RegionMismatch { index: 1, .. })));

  let mut other = Machine::new();
  let mut small = other.snapshot();
  small.regions[0].bytes.truncate(16);
  assert!(matches!(other.restore(&small), Err(Error::Bus(_))));
}

#[test]
fn failed_restore_changes_nothing() {
  let (mut source, _) = countdown_machine();
  source.load(0x0010, &[0xAA]).unwrap();
  source.cpu.registers.a = 0x55;
  let mut truncated = source.snapshot();
  truncated.regions[1].bytes.truncate(4);

  let (mut target, _) = countdown_machine();
  let before = target.snapshot();
  assert_eq!(
    target.restore(&truncated),
    Err(Error::Bus(BusError::SnapshotSize { region: "os".into(), expected: 0x4000, actual: 4 })),
  );
  assert_eq!(target.snapshot(), before);
  assert_eq!(target.bus.peek(Address::from(0x0010)), 0x00);

  // a layout pointing low addresses at the ROM
  let mut stray = source.snapshot();
  stray.layout = vec![MappedSpan { region: 1, start: 0x0000, size: 0x100 }];
  assert!(matches!(target.restore(&stray), Err(Error::Bus(BusError::SpanOutsideRegion { .. }))));
  assert_eq!(target.snapshot(), before);
  assert_eq!(target.bus.peek(Address::from(0x0000)), 0x00);
}

#[test]
fn config_deserializes_with_defaults() {
  let json = r#"{ "regions": [
    { "name": "ram", "kind": "RAM", "start": 0, "size": 49152 },
    { "name": "os", "kind": "ROM", "start": 49152, "size": 16384, "fill": 255 }
  ] }"#;
  let config: MachineConfig = serde_json::from_str(json).unwrap();
  assert!(!config.trace_instructions);
  assert_eq!(config.regions[0].fill, 0);
  assert_eq!(config.regions[1], RegionConfig::rom("os", 0xC000, 0x4000));
  let machine = Machine::from_config(&config).unwrap();
  assert_eq!(machine.bus.validate(), Ok(()));
}
