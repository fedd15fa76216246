use crate::mos6502::registers::Registers;
use crate::memory::Address;
use crate::memory::MemoryBus;

// Where an instruction's data lives once its operand bytes are decoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
  Accumulator, // also stands in for "no operand" in implied mode
  Memory(Address),
}

impl Operand {
  pub fn read(&self, registers: &Registers, memory: &mut dyn MemoryBus) -> u8 {
    match self {
      Operand::Accumulator => registers.a,
      Operand::Memory(address) => memory.read(*address),
    }
  }

  pub fn write(&self, registers: &mut Registers, memory: &mut dyn MemoryBus, value: u8) {
    match self {
      Operand::Accumulator => registers.a = value,
      Operand::Memory(address) => memory.write(*address, value),
    }
  }

  pub fn address(&self) -> Option<Address> {
    match self {
      Operand::Accumulator => None,
      Operand::Memory(address) => Some(*address),
    }
  }
}

// Result of decoding one operand. Local to a single instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
  pub operand: Operand,
  // indexing (or a taken branch) moved into another page
  pub page_crossed: bool,
}

impl Resolved {
  const fn at(address: Address) -> Resolved {
    Resolved { operand: Operand::Memory(address), page_crossed: false }
  }

  const fn indexed(base: Address, address: Address) -> Resolved {
    Resolved { operand: Operand::Memory(address), page_crossed: !base.same_page(address) }
  }

  pub fn address(&self) -> Option<Address> {
    self.operand.address()
  }
}

pub trait UseMode {
  fn get_size() -> u8 where Self: Sized;
  fn get_operand(_: &[u8]) -> String where Self: Sized;
  fn get_name() -> &'static str;

  // Expects pc just past the opcode and leaves it past the operand bytes
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved where Self: Sized;
}

fn fetch(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = memory.read(registers.pc);
  registers.pc = registers.pc.next();
  value
}

fn fetch_address(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Address {
  let lo = fetch(registers, memory);
  let hi = fetch(registers, memory);
  Address::from_le_bytes(lo, hi)
}

// pointer whose high byte is fetched without carrying into the next page
fn read_address_in_page(memory: &mut dyn MemoryBus, pointer: Address) -> Address {
  let lo = memory.read(pointer);
  let hi = memory.read(pointer.next_in_page());
  Address::from_le_bytes(lo, hi)
}

pub struct UseImplied;
impl UseMode for UseImplied {
  fn get_size() -> u8 { 0 }
  fn get_operand(_: &[u8]) -> String where Self: Sized { "".to_string() }
  fn get_name() -> &'static str { "implied" }
  fn resolve(_: &mut Registers, _: &mut dyn MemoryBus) -> Resolved {
    Resolved { operand: Operand::Accumulator, page_crossed: false }
  }
}

pub struct UseAccumulator;
impl UseMode for UseAccumulator {
  fn get_size() -> u8 { 0 }
  fn get_operand(_: &[u8]) -> String where Self: Sized { "A".to_string() }
  fn get_name() -> &'static str { "accumulator" }
  fn resolve(_: &mut Registers, _: &mut dyn MemoryBus) -> Resolved {
    Resolved { operand: Operand::Accumulator, page_crossed: false }
  }
}

pub struct UseImmediate;
impl UseMode for UseImmediate {
  fn get_size() -> u8 { 1 }
  fn get_operand(bytes: &[u8]) -> String {
    let value = bytes[0];
    format!("#{:#04x}", value)
  }
  fn get_name() -> &'static str { "immediate" }
  fn resolve(registers: &mut Registers, _: &mut dyn MemoryBus) -> Resolved {
    let address = registers.pc;
    registers.pc = address.next();
    Resolved::at(address)
  }
}

pub struct UseZeroPage;
impl UseMode for UseZeroPage {
  fn get_size() -> u8 { 1 }
  fn get_operand(bytes: &[u8]) -> String {
    let value = bytes[0];
    format!("&{:#04x}", value)
  }
  fn get_name() -> &'static str { "zero page" }
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let operand = fetch(registers, memory);
    Resolved::at(Address::from_le_bytes(operand, 0))
  }
}

const fn get_index_register<const XY: char>(registers: &Registers) -> u8 {
  match XY {
      'x' | 'X' => registers.x,
      'y' | 'Y' => registers.y,
      _         => unreachable!(),
  }
}

pub struct UseZeroPageWith<const XY: char>;
impl<const XY: char> UseMode for UseZeroPageWith<XY> {
  fn get_size() -> u8 { 1 }
  fn get_operand(bytes: &[u8]) -> String {
    let value = bytes[0];
    format!("&{:#04x} + {}", value, XY)
  }
  fn get_name() -> &'static str {
    match XY {
      'x'|'X' => "zero page X",
      'y'|'Y' => "zero page Y",
      _         => unreachable!(),
    }
  }
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let register = get_index_register::<XY>(registers);
    let operand = fetch(registers, memory);
    let operand = operand.wrapping_add(register); // never leaves page zero
    Resolved::at(Address::from_le_bytes(operand, 0))
  }
}

pub struct UseRelative;
impl UseMode for UseRelative {
  fn get_size() -> u8 { 1 }
  fn get_operand(bytes: &[u8]) -> String {
    let value = bytes[0];
    if value & 0b1000_0000 == 0 {
      format!("pc + {}", value)
    } else {
      let value = (!value).wrapping_add(1);
      format!("pc - {}", value)
    }
  }
  fn get_name() -> &'static str { "relative" }
  // branch target, relative to the address following the branch
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let operand = fetch(registers, memory);
    let origin = registers.pc;
    Resolved::indexed(origin, origin.offset(operand as i8))
  }
}

pub struct UseAbsolute;
impl UseMode for UseAbsolute {
  fn get_size() -> u8 { 2 }
  fn get_operand(bytes: &[u8]) -> String {
    let lo = bytes[0];
    let hi = bytes[1];
    let value = ((hi as u16) << 8) | (lo as u16);
    format!("&{:#06x}", value)
  }
  fn get_name() -> &'static str { "absolute" }
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    Resolved::at(fetch_address(registers, memory))
  }
}

pub struct UseAbsoluteWith<const XY: char>;
impl<const XY: char> UseMode for UseAbsoluteWith<XY> {
  fn get_size() -> u8 { 2 }
  fn get_operand(bytes: &[u8]) -> String {
    let lo = bytes[0];
    let hi = bytes[1];
    let value = ((hi as u16) << 8) | (lo as u16);
    format!("&{:#06x} + {}", value, XY)
  }
  fn get_name() -> &'static str {
    match XY {
      'x'|'X' => "absolute X",
      'y'|'Y' => "absolute Y",
      _       => unreachable!(),
    }
  }
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let register = get_index_register::<XY>(registers);
    let base = fetch_address(registers, memory);
    let mut address = base;
    address.inc_by(register);
    Resolved::indexed(base, address)
  }
}

pub struct UseIndirect;
impl UseMode for UseIndirect {
  fn get_size() -> u8 { 2 }
  fn get_operand(bytes: &[u8]) -> String {
    let lo = bytes[0];
    let hi = bytes[1];
    let value = ((hi as u16) << 8) | (lo as u16);
    format!("&({:#06x})", value)
  }
  fn get_name() -> &'static str { "indirect" }
  // JMP ($xxFF) takes its high byte from $xx00, not from the next page
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let pointer = fetch_address(registers, memory);
    Resolved::at(read_address_in_page(memory, pointer))
  }
}

pub struct UseIndexedIndirectX;
impl UseMode for UseIndexedIndirectX {
  fn get_size() -> u8 { 1 }
  fn get_operand(bytes: &[u8]) -> String {
    let value = bytes[0];
    format!("(&{:#04x} + X)", value)
  }
  fn get_name() -> &'static str { "indexed indirect X" }
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let operand = fetch(registers, memory);
    let zero_page_address = operand.wrapping_add(registers.x);
    let pointer = Address::from_le_bytes(zero_page_address, 0x00);
    Resolved::at(read_address_in_page(memory, pointer))
  }
}

pub struct UseIndirectIndexedY;
impl UseMode for UseIndirectIndexedY {
  fn get_size() -> u8 { 1 }
  fn get_operand(bytes: &[u8]) -> String {
    let value = bytes[0];
    format!("(&{:#04x}) + Y", value)
  }
  fn get_name() -> &'static str { "indirect indexed Y" }
  fn resolve(registers: &mut Registers, memory: &mut dyn MemoryBus) -> Resolved {
    let operand = fetch(registers, memory);
    let pointer = Address::from_le_bytes(operand, 0x00);
    let base = read_address_in_page(memory, pointer);
    let mut address = base;
    address.inc_by(registers.y);
    Resolved::indexed(base, address)
  }
}

#[cfg(test)]
fn registers_at(pc: u16) -> Registers {
  let mut registers = Registers::new();
  registers.pc = Address::from(pc);
  registers
}

#[test]
fn indirect_jump_wraps_inside_page() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x02FF), 0x34);
  memory.write(Address::from(0x0200), 0x12);
  memory.write(Address::from(0x0300), 0x56);
  memory.write(Address::from(0x1000), 0xFF);
  memory.write(Address::from(0x1001), 0x02);
  let mut registers = registers_at(0x1000);
  let resolved = UseIndirect::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x1234)));
  assert_eq!(registers.pc, Address::from(0x1002));
}

#[test]
fn zero_page_indexing_wraps() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x0400), 0xF0);
  let mut registers = registers_at(0x0400);
  registers.x = 0x20;
  let resolved = UseZeroPageWith::<'X'>::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x0010)));
  assert!(!resolved.page_crossed);

  // pointer at $FF takes its high byte from $00
  memory.write(Address::from(0x0400), 0xFE);
  memory.write(Address::from(0x00FF), 0x00);
  memory.write(Address::from(0x0000), 0x30);
  let mut registers = registers_at(0x0400);
  registers.x = 0x01;
  let resolved = UseIndexedIndirectX::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x3000)));

  let mut registers = registers_at(0x0400);
  memory.write(Address::from(0x0400), 0xFF);
  registers.y = 0x10;
  let resolved = UseIndirectIndexedY::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x3010)));
  assert!(!resolved.page_crossed);
}

#[test]
fn indexing_reports_page_crossing() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x0400), 0xF0);
  memory.write(Address::from(0x0401), 0x20);
  let mut registers = registers_at(0x0400);
  registers.y = 0x0F;
  let resolved = UseAbsoluteWith::<'Y'>::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x20FF)));
  assert!(!resolved.page_crossed);

  let mut registers = registers_at(0x0400);
  registers.y = 0x10;
  let resolved = UseAbsoluteWith::<'Y'>::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x2100)));
  assert!(resolved.page_crossed);
  assert_eq!(registers.pc, Address::from(0x0402));
}

#[test]
fn relative_is_taken_from_next_instruction() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x04FD), 0x02); // forward, crosses into $05
  let mut registers = registers_at(0x04FD);
  let resolved = UseRelative::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x0500)));
  assert!(resolved.page_crossed);

  memory.write(Address::from(0x0480), 0xFE); // branch to self
  let mut registers = registers_at(0x0480);
  let resolved = UseRelative::resolve(&mut registers, &mut memory);
  assert_eq!(resolved.address(), Some(Address::from(0x047F)));
  assert!(!resolved.page_crossed);
}
