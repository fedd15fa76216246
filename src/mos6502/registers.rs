use std::fmt;

use serde::{Deserialize, Serialize};

use crate::memory::Address;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Status(u8);

impl Status {
  const NEGATIVE: u8  = 0b1000_0000;
  const OVERFLOW: u8  = 0b0100_0000;
  const RESERVED: u8  = 0b0010_0000; // Always set
  const BREAK: u8     = 0b0001_0000;
  const DECIMAL: u8   = 0b0000_1000;
  const INTERRUPT: u8 = 0b0000_0100;
  const ZERO: u8      = 0b0000_0010;
  const CARRY: u8     = 0b0000_0001;

  pub const fn new() -> Self { Self::from(0) }
  pub const fn from(value: u8) -> Self {
    Status(value | Self::RESERVED) }

  // The B "flag" only exists on the stack: it tells BRK/PHP pushes apart from
  // IRQ/NMI pushes. Pulled values never keep it.
  pub const fn pulled(value: u8) -> Self {
    Status((value | Self::RESERVED) & !Self::BREAK)
  }

  pub const fn get_mask<const FLAG: char>() -> u8 {
    const {
      match FLAG {
        'b'|'B' => Status::BREAK,
        'c'|'C' => Status::CARRY,
        'd'|'D' => Status::DECIMAL,
        'i'|'I' => Status::INTERRUPT,
        'n'|'N' => Status::NEGATIVE,
        'u'|'U' => Status::RESERVED,
        'v'|'V' => Status::OVERFLOW,
        'z'|'Z' => Status::ZERO,
        _ => unreachable!(),
      }
    }
  }

  pub const fn has<const FLAG: char>(&self) -> bool {
    let mask = const { Status::get_mask::<FLAG >() };
    self.0 & mask != 0
  }

  pub fn set<const FLAG: char>(&mut self, value: bool) {
    let mask = const { Status::get_mask::<FLAG >() };
    if value {
      self.0 |= mask;
    } else {
      self.0 &= !mask;
    }
  }

  pub fn set_flag<const FLAG: char, const SET: bool>(&mut self) {
    self.set::<FLAG>(SET);
  }

  // Convenience function for loads, transfers, ALU ops..
  pub fn set_nz_from_u8(&mut self, value: u8) {
    self.set::<'Z'>(value == 0);
    self.set::<'N'>(value & 0b1000_0000 != 0);
  }

  // the byte pushed by PHP/BRK (break set) or by IRQ/NMI (break clear)
  pub const fn to_pushed(&self, break_flag: bool) -> u8 {
    if break_flag {
      self.0 | Self::BREAK | Self::RESERVED
    } else {
      (self.0 | Self::RESERVED) & !Self::BREAK
    }
  }

  pub const fn to_u8(&self) -> u8 {
    self.0
  }
}

impl Default for Status {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Debug for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    fn write_bit(v: u8, c1: char, c2: char, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}", match v { 0 => c1, _ => c2 })
    }

    write!(f, "Status(")?;
    write_bit(self.0 & Status::NEGATIVE, 'n', 'N', f)?;
    write_bit(self.0 & Status::OVERFLOW, 'v', 'V', f)?;
    write!(f, "_")?;
    write_bit(self.0 & Status::BREAK,    'b', 'B', f)?;
    write_bit(self.0 & Status::DECIMAL,  'd', 'D', f)?;
    write_bit(self.0 & Status::INTERRUPT,'i', 'I', f)?;
    write_bit(self.0 & Status::ZERO,     'z', 'Z', f)?;
    write_bit(self.0 & Status::CARRY,    'c', 'C', f)?;
    write!(f, ")")
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackPointer(u8);

impl StackPointer {
  pub const fn from(value: u8) -> Self {
    StackPointer(value)
  }

  pub const fn to_address(&self) -> Address {
    Address::from_le_bytes(self.0, 0x01)
  }

  pub const fn to_u8(&self) -> u8 {
    self.0
  }

  pub fn borrow_mut(&mut self) -> &mut u8 {
    &mut self.0
  }

  // pull: increment before read
  pub fn inc(&mut self) {
    self.0 = self.0.wrapping_add(1);
  }

  // push: decrement after write
  pub fn dec(&mut self) {
    self.0 = self.0.wrapping_sub(1);
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
  pub a: u8,           // accumulator
  pub x: u8,
  pub y: u8,
  pub p: Status,       // status
  pub pc: Address,     // program counter
  pub s: StackPointer, // page 0x01 stack pointer offset
}

impl Registers {
  pub const fn new() -> Self {
    let status = Status::new();
    let stack_pointer = StackPointer(0xFF);
    let address = Address::from(0);
    Registers { a: 0, x: 0, y: 0, p: status, pc: address, s: stack_pointer }
  }

  // Power-up state, pc still to be loaded from the reset vector
  pub fn power_up(&mut self) {
    self.a = 0;
    self.x = 0;
    self.y = 0;
    self.s = StackPointer(0xFD);
    self.p = Status::from(Status::INTERRUPT);
  }
}

impl Default for Registers {
  fn default() -> Self {
    Self::new()
  }
}

// Plain copy of the register file for save states and debugger views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterSnapshot {
  pub a: u8,
  pub x: u8,
  pub y: u8,
  pub s: u8,
  pub pc: u16,
  pub p: u8,
  pub cycles: u64,
  #[serde(default)]
  pub pending: u8, // latched interrupt requests
}

#[test]
fn status_flags() {
  let mut p = Status::new();
  assert_eq!(p.to_u8(), 0b0010_0000);
  p.set::<'C'>(true);
  p.set_flag::<'D', true>();
  assert!(p.has::<'c'>());
  assert!(p.has::<'D'>());
  p.set_nz_from_u8(0x80);
  assert!(p.has::<'N'>() && !p.has::<'Z'>());
  p.set_nz_from_u8(0);
  assert!(!p.has::<'N'>() && p.has::<'Z'>());
  assert_eq!(format!("{p:?}"), "Status(nv_bDiZC)");
}

#[test]
fn break_bit_only_lives_on_the_stack() {
  let p = Status::from(0b0000_0001);
  assert_eq!(p.to_pushed(true),  0b0011_0001);
  assert_eq!(p.to_pushed(false), 0b0010_0001);
  assert_eq!(Status::pulled(0b1101_1111).to_u8(), 0b1110_1111);
}

#[test]
fn stack_pointer_wraps() {
  let mut s = StackPointer::from(0x00);
  s.dec();
  assert_eq!(s.to_u8(), 0xFF);
  assert_eq!(s.to_address(), Address::from(0x01FF));
  s.inc();
  assert_eq!(s.to_address(), Address::from(0x0100));
}
