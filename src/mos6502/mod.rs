pub mod addressing_modes;
mod alu;
pub mod disassemble;
pub mod instructions;
pub mod interrupts;
pub mod registers;

use thiserror::Error;

pub use interrupts::{Interrupt, Pending};
pub use registers::{Registers, RegisterSnapshot, StackPointer, Status};
use instructions::Instruction;

use crate::memory::{Address, MemoryBus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
  // one of the opcodes that lock up a real 6502; pc is left on the opcode
  #[error("invalid opcode {opcode:#04x} at {pc:?}")]
  InvalidOpcode { opcode: u8, pc: Address },
}

#[derive(Debug)]
pub struct CPU {
  pub registers: Registers,
  cycles: u64,
  pending: Pending,
}

pub type Breakpoint = dyn Fn(&CPU, &dyn MemoryBus) -> bool;

pub fn stop_when<const OPCODE: u8>(cpu: &CPU, mem: &dyn MemoryBus) -> bool {
  mem.peek(cpu.registers.pc) == OPCODE
}

pub fn stop_after<const CYCLES: u64>(cpu: &CPU, _: &dyn MemoryBus) -> bool {
  cpu.cycles >= CYCLES
}

pub fn stop_at<const ADDRESS: u16>(cpu: &CPU, _: &dyn MemoryBus) -> bool {
  cpu.registers.pc == Address::from(ADDRESS)
}

impl Default for CPU {
  fn default() -> Self {
    Self::new()
  }
}

impl CPU {
  pub fn new() -> Self {
    CPU { registers: Registers::new(), cycles: 0, pending: Pending::new() }
  }

  pub fn cycles(&self) -> u64 {
    self.cycles
  }

  // Power-up registers, pc from the reset vector, pending requests dropped
  pub fn reset(&mut self, memory: &mut dyn MemoryBus) -> u32 {
    self.pending = Pending::new();
    Interrupt::Reset.enter(&mut self.registers, memory);
    self.cycles += Interrupt::CYCLES as u64;
    log::debug!("reset, pc = {:?}", self.registers.pc);
    Interrupt::CYCLES
  }

  pub fn queue_interrupt(&mut self, interrupt: Interrupt) {
    log::debug!("{interrupt:?} requested at {:?}", self.registers.pc);
    self.pending.raise(interrupt);
  }

  pub fn clear_interrupt(&mut self, interrupt: Interrupt) {
    self.pending.clear(interrupt);
  }

  pub fn pending(&self) -> Pending {
    self.pending
  }

  // Execute exactly one instruction, then take the highest priority pending
  // interrupt the status allows. Returns the cycles consumed by both.
  pub fn step(&mut self, memory: &mut dyn MemoryBus) -> Result<u32, CpuError> {
    let pc = self.registers.pc;
    let opcode = memory.read(pc);
    let instruction = Instruction::lookup(opcode);
    if !instruction.is_valid() {
      log::error!("{} {opcode:#04x} at {pc:?}, processor halted", instruction.mnemonic);
      return Err(CpuError::InvalidOpcode { opcode, pc });
    }

    let mut cycles = instruction.execute(&mut self.registers, memory) as u32;
    cycles += self.service_interrupt(memory);
    self.cycles += cycles as u64;
    Ok(cycles)
  }

  fn service_interrupt(&mut self, memory: &mut dyn MemoryBus) -> u32 {
    let Some(interrupt) = self.pending.next(&self.registers.p) else {
      return 0;
    };
    if interrupt == Interrupt::Reset {
      self.pending = Pending::new();
    } else {
      self.pending.clear(interrupt);
    }
    log::debug!("servicing {interrupt:?} from {:?}", self.registers.pc);
    interrupt.enter(&mut self.registers, memory);
    Interrupt::CYCLES
  }

  pub fn run(&mut self, memory: &mut dyn MemoryBus, stop: &Breakpoint) -> Result<(), CpuError> {
    while !stop(self, memory) {
      self.step(memory)?;
    }
    Ok(())
  }

  pub fn snapshot(&self) -> RegisterSnapshot {
    let registers = &self.registers;
    RegisterSnapshot {
      a: registers.a,
      x: registers.x,
      y: registers.y,
      s: registers.s.to_u8(),
      pc: registers.pc.to_u16(),
      p: registers.p.to_u8(),
      cycles: self.cycles,
      pending: self.pending.bits(),
    }
  }

  pub fn restore(&mut self, snapshot: &RegisterSnapshot) {
    self.registers.a = snapshot.a;
    self.registers.x = snapshot.x;
    self.registers.y = snapshot.y;
    self.registers.s = StackPointer::from(snapshot.s);
    self.registers.pc = Address::from(snapshot.pc);
    self.registers.p = Status::pulled(snapshot.p);
    self.cycles = snapshot.cycles;
    self.pending = Pending::from_bits(snapshot.pending);
  }
}

pub fn stack_push(registers: &mut Registers, memory: &mut dyn MemoryBus, value: u8) {
  memory.write(registers.s.to_address(), value);
  registers.s.dec();
}

pub fn stack_pull(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  registers.s.inc();
  memory.read(registers.s.to_address())
}

#[test]
fn reset_loads_vector() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write_word(Address::from(0xFFFC), 0xC000);
  let mut cpu = CPU::new();
  cpu.registers.a = 0x55;
  cpu.queue_interrupt(Interrupt::Irq);
  assert_eq!(cpu.reset(&mut memory), 7);
  assert_eq!(cpu.registers.pc, Address::from(0xC000));
  assert_eq!(cpu.registers.a, 0);
  assert_eq!(cpu.registers.s.to_u8(), 0xFD);
  assert!(cpu.registers.p.has::<'I'>());
  assert!(cpu.pending().is_empty());
  assert_eq!(cpu.cycles(), 7);
}

#[test]
fn halt_opcode_is_reported() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x0200), 0xEA);
  memory.write(Address::from(0x0201), 0x02);
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(0x0200);
  assert_eq!(cpu.step(&mut memory), Ok(2));
  let error = cpu.step(&mut memory);
  assert_eq!(error, Err(CpuError::InvalidOpcode { opcode: 0x02, pc: Address::from(0x0201) }));
  assert_eq!(cpu.registers.pc, Address::from(0x0201));
  assert_eq!(cpu.cycles(), 2);
  // still stuck
  assert!(cpu.step(&mut memory).is_err());
}

#[test]
fn cleared_request_is_not_serviced() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x0200), 0xEA);
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(0x0200);
  cpu.queue_interrupt(Interrupt::Nmi);
  cpu.clear_interrupt(Interrupt::Nmi);
  assert_eq!(cpu.step(&mut memory), Ok(2));
  assert_eq!(cpu.registers.pc, Address::from(0x0201));
}

#[test]
fn snapshot_round_trip() {
  let mut cpu = CPU::new();
  cpu.registers.a = 1;
  cpu.registers.x = 2;
  cpu.registers.y = 3;
  cpu.registers.pc = Address::from(0x1234);
  cpu.registers.p.set::<'C'>(true);
  cpu.queue_interrupt(Interrupt::Nmi);
  let snapshot = cpu.snapshot();

  let mut other = CPU::new();
  other.restore(&snapshot);
  assert_eq!(other.registers, cpu.registers);
  assert_eq!(other.pending(), cpu.pending());
  assert_eq!(other.snapshot(), snapshot);
}
