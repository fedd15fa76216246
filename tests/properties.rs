// Property based checks of the CPU over the whole operand space.

use micro8::memory::{Address, Bus, MemoryBus};
use micro8::mos6502::CPU;
use proptest::prelude::*;

const ORIGIN: u16 = 0x0200;

fn cpu_at_origin(ram: &mut Bus, program: &[u8]) -> CPU {
  ram.bulk_copy(Address::from(ORIGIN), program).unwrap();
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(ORIGIN);
  cpu
}

fn to_bcd(value: u8) -> u8 {
  ((value / 10) << 4) | (value % 10)
}

// immediate mode opcodes with the register they leave their result in
const IMMEDIATE: [(u8, char); 8] = [
  (0xA9, 'A'), // LDA
  (0xA2, 'X'), // LDX
  (0xA0, 'Y'), // LDY
  (0x29, 'A'), // AND
  (0x09, 'A'), // ORA
  (0x49, 'A'), // EOR
  (0x69, 'A'), // ADC
  (0xE9, 'A'), // SBC
];

// single byte opcodes and the register they write
const IMPLIED: [(u8, char); 10] = [
  (0xAA, 'X'), // TAX
  (0xA8, 'Y'), // TAY
  (0x8A, 'A'), // TXA
  (0x98, 'A'), // TYA
  (0xE8, 'X'), // INX
  (0xCA, 'X'), // DEX
  (0xC8, 'Y'), // INY
  (0x88, 'Y'), // DEY
  (0x0A, 'A'), // ASL A
  (0x6A, 'A'), // ROR A
];

// zero page read-modify-write opcodes, result lands in memory
const ZERO_PAGE_RMW: [u8; 6] = [
  0x06, // ASL
  0x46, // LSR
  0x26, // ROL
  0x66, // ROR
  0xE6, // INC
  0xC6, // DEC
];

// immediate compares and the register they test
const COMPARE: [(u8, char); 3] = [
  (0xC9, 'A'), // CMP
  (0xE0, 'X'), // CPX
  (0xC0, 'Y'), // CPY
];

fn register(cpu: &CPU, name: char) -> u8 {
  match name {
    'A' => cpu.registers.a,
    'X' => cpu.registers.x,
    _ => cpu.registers.y,
  }
}

fn assert_nz(cpu: &CPU, name: char) {
  let value = register(cpu, name);
  assert_eq!(cpu.registers.p.has::<'Z'>(), value == 0, "{:?}", cpu.registers);
  assert_eq!(cpu.registers.p.has::<'N'>(), value & 0x80 != 0, "{:?}", cpu.registers);
}

proptest! {
  #[test]
  fn zero_and_negative_follow_the_result(
    index in 0 .. IMMEDIATE.len(),
    a in any::<u8>(), x in any::<u8>(), y in any::<u8>(),
    operand in any::<u8>(), carry in any::<bool>(), decimal in any::<bool>()
  ) {
    let (opcode, destination) = IMMEDIATE[index];
    let mut ram = Bus::with_ram();
    let mut cpu = cpu_at_origin(&mut ram, &[opcode, operand]);
    cpu.registers.a = a;
    cpu.registers.x = x;
    cpu.registers.y = y;
    cpu.registers.p.set::<'C'>(carry);
    cpu.registers.p.set::<'D'>(decimal);
    cpu.step(&mut ram).unwrap();
    assert_nz(&cpu, destination);
  }

  #[test]
  fn implied_ops_set_zero_and_negative(
    index in 0 .. IMPLIED.len(),
    a in any::<u8>(), x in any::<u8>(), y in any::<u8>(), carry in any::<bool>()
  ) {
    let (opcode, destination) = IMPLIED[index];
    let mut ram = Bus::with_ram();
    let mut cpu = cpu_at_origin(&mut ram, &[opcode]);
    cpu.registers.a = a;
    cpu.registers.x = x;
    cpu.registers.y = y;
    cpu.registers.p.set::<'C'>(carry);
    cpu.step(&mut ram).unwrap();
    assert_nz(&cpu, destination);
  }

  #[test]
  fn compare_flags(index in 0 .. COMPARE.len(), value in any::<u8>(), operand in any::<u8>()) {
    let (opcode, name) = COMPARE[index];
    let mut ram = Bus::with_ram();
    let mut cpu = cpu_at_origin(&mut ram, &[opcode, operand]);
    cpu.registers.a = value;
    cpu.registers.x = value;
    cpu.registers.y = value;
    cpu.step(&mut ram).unwrap();
    let difference = value.wrapping_sub(operand);
    prop_assert_eq!(cpu.registers.p.has::<'C'>(), value >= operand);
    prop_assert_eq!(cpu.registers.p.has::<'Z'>(), value == operand);
    prop_assert_eq!(cpu.registers.p.has::<'N'>(), difference & 0x80 != 0);
    prop_assert_eq!(register(&cpu, name), value);
  }

  #[test]
  fn memory_shifts_set_zero_and_negative(
    index in 0 .. ZERO_PAGE_RMW.len(),
    zp in 0x10u8 .. 0xFF, value in any::<u8>(), carry in any::<bool>()
  ) {
    let opcode = ZERO_PAGE_RMW[index];
    let mut ram = Bus::with_ram();
    ram.write(Address::from(zp as u16), value);
    let mut cpu = cpu_at_origin(&mut ram, &[opcode, zp]);
    cpu.registers.a = !value;
    cpu.registers.p.set::<'C'>(carry);
    prop_assert_eq!(cpu.step(&mut ram), Ok(5));
    let result = ram.peek(Address::from(zp as u16));
    prop_assert_eq!(cpu.registers.p.has::<'Z'>(), result == 0);
    prop_assert_eq!(cpu.registers.p.has::<'N'>(), result & 0x80 != 0);
    prop_assert_eq!(cpu.registers.a, !value);
  }

  #[test]
  fn decimal_add_then_subtract_restores(a in 0u8 .. 100, m in 0u8 .. 100, carry in any::<bool>()) {
    // SED; ADC #m; SBC #m
    let (a, m) = (to_bcd(a), to_bcd(m));
    let mut ram = Bus::with_ram();
    let mut cpu = cpu_at_origin(&mut ram, &[0xF8, 0x69, m, 0xE9, m]);
    cpu.registers.a = a;
    cpu.registers.p.set::<'C'>(carry);
    cpu.step(&mut ram).unwrap();
    cpu.step(&mut ram).unwrap();
    let sum = cpu.registers.a;
    let carry_out = cpu.registers.p.has::<'C'>();
    let expected = a / 16 * 10 + a % 16 + m / 16 * 10 + m % 16 + carry as u8;
    prop_assert_eq!(sum, to_bcd(expected % 100));
    prop_assert_eq!(carry_out, expected >= 100);

    cpu.registers.p.set::<'C'>(!carry);
    cpu.step(&mut ram).unwrap();
    prop_assert_eq!(cpu.registers.a, a);
    prop_assert_eq!(cpu.registers.p.has::<'C'>(), !carry_out);
  }

  #[test]
  fn binary_add_then_subtract_restores(a in any::<u8>(), m in any::<u8>(), carry in any::<bool>()) {
    // ADC #m; SBC #m
    let mut ram = Bus::with_ram();
    let mut cpu = cpu_at_origin(&mut ram, &[0x69, m, 0xE9, m]);
    cpu.registers.a = a;
    cpu.registers.p.set::<'C'>(carry);
    cpu.step(&mut ram).unwrap();
    let carry_out = cpu.registers.p.has::<'C'>();
    prop_assert_eq!(cpu.registers.a, a.wrapping_add(m).wrapping_add(carry as u8));
    cpu.registers.p.set::<'C'>(!carry);
    cpu.step(&mut ram).unwrap();
    prop_assert_eq!(cpu.registers.a, a);
    prop_assert_eq!(cpu.registers.p.has::<'C'>(), !carry_out);
  }

  #[test]
  fn subroutine_call_returns_for_any_stack(sp in any::<u8>()) {
    // JSR $3000 ... $3000: RTS
    let mut ram = Bus::with_ram();
    ram.write(Address::from(0x3000), 0x60);
    let mut cpu = cpu_at_origin(&mut ram, &[0x20, 0x00, 0x30]);
    *cpu.registers.s.borrow_mut() = sp;
    prop_assert_eq!(cpu.step(&mut ram), Ok(6));
    prop_assert_eq!(cpu.registers.pc, Address::from(0x3000));
    prop_assert_eq!(cpu.registers.s.to_u8(), sp.wrapping_sub(2));
    // the pushed address is the last byte of the JSR
    prop_assert_eq!(ram.peek(Address::from(0x0100 | sp as u16)), 0x02);
    prop_assert_eq!(ram.peek(Address::from(0x0100 | sp.wrapping_sub(1) as u16)), 0x02);
    prop_assert_eq!(cpu.step(&mut ram), Ok(6));
    prop_assert_eq!(cpu.registers.pc, Address::from(ORIGIN + 3));
    prop_assert_eq!(cpu.registers.s.to_u8(), sp);
  }

  #[test]
  fn stack_round_trip_keeps_flags(a in any::<u8>(), p in any::<u8>()) {
    // PHA; PHP; PLA; PLP; ... pulls swap A and the flags around
    let mut ram = Bus::with_ram();
    let mut cpu = cpu_at_origin(&mut ram, &[0x48, 0x08, 0x68, 0x28]);
    cpu.registers.a = a;
    cpu.registers.p = micro8::mos6502::Status::pulled(p);
    let before = cpu.registers.p;
    for _ in 0 .. 4 {
      cpu.step(&mut ram).unwrap();
    }
    // the status pushed by PHP has B and bit 5 set
    prop_assert_eq!(cpu.registers.a, before.to_u8() | 0x30);
    prop_assert_eq!(cpu.registers.p, micro8::mos6502::Status::pulled(a));
    prop_assert_eq!(cpu.registers.s.to_u8(), 0xFF);
  }
}
