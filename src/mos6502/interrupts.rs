use serde::{Deserialize, Serialize};

use crate::memory::{read_address, Address, MemoryBus};
use crate::mos6502::registers::{Registers, Status};
use crate::mos6502::stack_push;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interrupt {
  Reset,
  Nmi,
  Irq,
  Break, // software, same entry sequence as BRK
}

impl Interrupt {
  // highest priority first
  pub const PRIORITY: [Interrupt; 4] =
    [Interrupt::Reset, Interrupt::Nmi, Interrupt::Break, Interrupt::Irq];

  // entry sequence length, for every kind
  pub const CYCLES: u32 = 7;

  pub const fn vector(&self) -> Address {
    match self {
      Interrupt::Nmi => Address::from(0xFFFA),
      Interrupt::Reset => Address::from(0xFFFC),
      Interrupt::Irq | Interrupt::Break => Address::from(0xFFFE),
    }
  }

  // B is 0 when pushed by interrupts (NMI and IRQ) and 1 when pushed by
  // instructions (BRK and PHP).
  pub const fn pushes_break_flag(&self) -> bool {
    matches!(self, Interrupt::Break)
  }

  // only IRQ honours the I flag
  pub const fn is_maskable(&self) -> bool {
    matches!(self, Interrupt::Irq)
  }

  const fn mask(&self) -> u8 {
    match self {
      Interrupt::Reset => 0b0001,
      Interrupt::Nmi   => 0b0010,
      Interrupt::Irq   => 0b0100,
      Interrupt::Break => 0b1000,
    }
  }

  // Run the entry sequence: pc and status go on the stack, I is set and pc
  // is loaded from the vector. Reset pushes nothing and starts from the
  // power-up register state instead.
  pub fn enter(&self, registers: &mut Registers, memory: &mut dyn MemoryBus) {
    match self {
      Interrupt::Reset => {
        registers.power_up();
      },
      _ => {
        let pushed = registers.p.to_pushed(self.pushes_break_flag());
        stack_push(registers, memory, registers.pc.hi_u8());
        stack_push(registers, memory, registers.pc.lo_u8());
        stack_push(registers, memory, pushed);
        registers.p.set_flag::<'I', true>();
      },
    }
    registers.pc = read_address(memory, self.vector());
  }
}

// Latch of requested but not yet serviced interrupts. Requests of the same
// kind coalesce into one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pending(u8);

impl Pending {
  pub const fn new() -> Self {
    Pending(0)
  }

  pub const fn from_bits(bits: u8) -> Self {
    Pending(bits & 0b1111)
  }

  pub const fn bits(&self) -> u8 {
    self.0
  }

  pub fn raise(&mut self, interrupt: Interrupt) {
    self.0 |= interrupt.mask();
  }

  pub fn clear(&mut self, interrupt: Interrupt) {
    self.0 &= !interrupt.mask();
  }

  pub const fn contains(&self, interrupt: Interrupt) -> bool {
    self.0 & interrupt.mask() != 0
  }

  pub const fn is_empty(&self) -> bool {
    self.0 == 0
  }

  pub fn iter(&self) -> impl Iterator<Item = Interrupt> + '_ {
    Interrupt::PRIORITY.into_iter().filter(|i| self.contains(*i))
  }

  // Highest priority request the CPU will take given its status. A masked
  // IRQ stays latched until I is cleared.
  pub fn next(&self, status: &Status) -> Option<Interrupt> {
    let masked = status.has::<'I'>();
    self.iter().find(|i| !(masked && i.is_maskable()))
  }
}

#[test]
fn vectors() {
  assert_eq!(Interrupt::Nmi.vector(), Address::from(0xFFFA));
  assert_eq!(Interrupt::Reset.vector(), Address::from(0xFFFC));
  assert_eq!(Interrupt::Irq.vector(), Address::from(0xFFFE));
  assert_eq!(Interrupt::Break.vector(), Interrupt::Irq.vector());
}

#[test]
fn pending_requests_are_prioritised() {
  let mut pending = Pending::new();
  pending.raise(Interrupt::Irq);
  pending.raise(Interrupt::Irq);
  pending.raise(Interrupt::Nmi);
  assert_eq!(pending.iter().collect::<Vec<_>>(), vec![Interrupt::Nmi, Interrupt::Irq]);

  let mut status = Status::new();
  status.set::<'I'>(true);
  assert_eq!(pending.next(&status), Some(Interrupt::Nmi));
  pending.clear(Interrupt::Nmi);
  assert_eq!(pending.next(&status), None);
  assert!(pending.contains(Interrupt::Irq));
  status.set::<'I'>(false);
  assert_eq!(pending.next(&status), Some(Interrupt::Irq));

  pending.raise(Interrupt::Reset);
  assert_eq!(pending.next(&status), Some(Interrupt::Reset));
  assert_eq!(Pending::from_bits(pending.bits()), pending);
}

#[test]
fn irq_entry_pushes_break_clear() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write_word(Address::from(0xFFFE), 0x1234);
  let mut registers = Registers::new();
  registers.pc = Address::from(0x0456);
  registers.p.set::<'C'>(true);
  Interrupt::Irq.enter(&mut registers, &mut memory);
  assert_eq!(registers.pc, Address::from(0x1234));
  assert!(registers.p.has::<'I'>());
  assert_eq!(registers.s.to_u8(), 0xFC);
  assert_eq!(memory.peek(Address::from(0x01FF)), 0x04);
  assert_eq!(memory.peek(Address::from(0x01FE)), 0x56);
  assert_eq!(memory.peek(Address::from(0x01FD)), 0b0010_0001);
}
