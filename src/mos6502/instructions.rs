use std::fmt;
use crate::memory::Address;
use crate::memory::MemoryBus;

use crate::mos6502::{stack_push, stack_pull};

use crate::mos6502::registers::Status;
use crate::mos6502::alu;
use crate::mos6502::interrupts::Interrupt;
use crate::mos6502::addressing_modes::Operand;
use crate::mos6502::addressing_modes::UseMode;

use crate::mos6502::addressing_modes::UseImplied;
use crate::mos6502::addressing_modes::UseAccumulator;
use crate::mos6502::addressing_modes::UseImmediate;
use crate::mos6502::addressing_modes::UseZeroPage;
use crate::mos6502::addressing_modes::UseZeroPageWith;
use crate::mos6502::addressing_modes::UseRelative;
use crate::mos6502::addressing_modes::UseAbsolute;
use crate::mos6502::addressing_modes::UseAbsoluteWith;
use crate::mos6502::addressing_modes::UseIndirect;
use crate::mos6502::addressing_modes::UseIndexedIndirectX;
use crate::mos6502::addressing_modes::UseIndirectIndexedY;
use crate::mos6502::registers::Registers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
  ADC, // ADd with Carry
  AND, // logical AND (bitwise)
  ASL, // Arithmetic Shift Left
  BCC, // Branch if Carry Clear
  BCS, // Branch if Carry Set
  BEQ, // Branch if Equal (to zero?)
  BIT, // BIT test
  BMI, // Branch if Minus
  BNE, // Branch if Not Equal
  BPL, // Branch if Positive
  BRK, // BReaK
  BVC, // Branch if oVerflow Clear
  BVS, // Branch if oVerflow Set
  CLC, // CLear Carry flag
  CLD, // Clear Decimal Mode
  CLI, // Clear Interrupt Disable
  CLV, // Clear oVerflow flag
  CMP, // Compare
  CPX, // Compare X register
  CPY, // Compare Y register
  DEC, // DECrement memory
  DEX, // DEcrement X register
  DEY, // DEcrement Y register
  EOR, // Exclusive OR (bitwise)
  INC, // INCrement memory
  INX, // INcrement X register
  INY, // INcrement Y register
  JMP, // JuMP
  JSR, // Jump to SubRoutine
  LDA, // LoaD Accumulator
  LDX, // LoaD X register
  LDY, // LoaD Y register
  LSR, // Logical Shift Right
  NOP, // No OPeration
  ORA, // inclusive OR (bitwise)
  PHA, // PusH Accumulator
  PHP, // PusH Processor status
  PLA, // PuLl Accumulator
  PLP, // PuLl Processor status
  ROL, // ROtate Left
  ROR, // ROtate Right
  RTI, // ReTurn from Interrupt
  RTS, // ReTurn from Subroutine
  SBC, // SuBtract with Carry
  SEC, // SEt Carry flag
  SED, // SEt Decimal flag
  SEI, // SEt Interrupt disable
  STA, // STore Accumulator
  STX, // STore X register
  STY, // STore Y register
  TAX, // Transfer Accumulator to X
  TAY, // Transfer Accumulator to Y
  TSX, // Transfer Stack pointer to X
  TXA, // Transfer X to Accumulator
  TXS, // Transfer X to Stack pointer
  TYA, // Transfer Y to Accumulator

  // undocumented NMOS opcodes
  ALR, // AND then LSR A
  ANC, // AND, copy N into C
  ARR, // AND then ROR A, odd flags
  AXS, // X = (A & X) - operand
  DCP, // DEC then CMP
  ISB, // INC then SBC
  JAM, // halts the processor
  LAS, // A, X, S = memory & S
  LAX, // LDA then LDX
  LXA, // A, X = (A | magic) & operand
  RLA, // ROL then AND
  RRA, // ROR then ADC
  SAX, // store A & X
  SHA, // store A & X & (high + 1)
  SHX, // store X & (high + 1)
  SHY, // store Y & (high + 1)
  SLO, // ASL then ORA
  SRE, // LSR then EOR
  TAS, // S = A & X, store S & (high + 1)
  XAA, // A = (A | magic) & X & operand
}

impl Mnemonic {
  pub const fn to_str(&self) -> &'static str
  {
    match self {
      Self::ADC => "ADC",
      Self::AND => "AND",
      Self::ASL => "ASL",
      Self::BCC => "BCC",
      Self::BCS => "BCS",
      Self::BEQ => "BEQ",
      Self::BIT => "BIT",
      Self::BMI => "BMI",
      Self::BNE => "BNE",
      Self::BPL => "BPL",
      Self::BRK => "BRK",
      Self::BVC => "BVC",
      Self::BVS => "BVS",
      Self::CLC => "CLC",
      Self::CLD => "CLD",
      Self::CLI => "CLI",
      Self::CLV => "CLV",
      Self::CMP => "CMP",
      Self::CPX => "CPX",
      Self::CPY => "CPY",
      Self::DEC => "DEC",
      Self::DEX => "DEX",
      Self::DEY => "DEY",
      Self::EOR => "EOR",
      Self::INC => "INC",
      Self::INX => "INX",
      Self::INY => "INY",
      Self::JMP => "JMP",
      Self::JSR => "JSR",
      Self::LDA => "LDA",
      Self::LDX => "LDX",
      Self::LDY => "LDY",
      Self::LSR => "LSR",
      Self::NOP => "NOP",
      Self::ORA => "ORA",
      Self::PHA => "PHA",
      Self::PHP => "PHP",
      Self::PLA => "PLA",
      Self::PLP => "PLP",
      Self::ROL => "ROL",
      Self::ROR => "ROR",
      Self::RTI => "RTI",
      Self::RTS => "RTS",
      Self::SBC => "SBC",
      Self::SEC => "SEC",
      Self::SED => "SED",
      Self::SEI => "SEI",
      Self::STA => "STA",
      Self::STX => "STX",
      Self::STY => "STY",
      Self::TAX => "TAX",
      Self::TAY => "TAY",
      Self::TSX => "TSX",
      Self::TXA => "TXA",
      Self::TXS => "TXS",
      Self::TYA => "TYA",
      Self::ALR => "ALR",
      Self::ANC => "ANC",
      Self::ARR => "ARR",
      Self::AXS => "AXS",
      Self::DCP => "DCP",
      Self::ISB => "ISB",
      Self::JAM => "JAM",
      Self::LAS => "LAS",
      Self::LAX => "LAX",
      Self::LXA => "LXA",
      Self::RLA => "RLA",
      Self::RRA => "RRA",
      Self::SAX => "SAX",
      Self::SHA => "SHA",
      Self::SHX => "SHX",
      Self::SHY => "SHY",
      Self::SLO => "SLO",
      Self::SRE => "SRE",
      Self::TAS => "TAS",
      Self::XAA => "XAA",
    }
  }
}

impl fmt::Display for Mnemonic {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.to_str())
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
   // work directly on accumulator, e. g. `lsr a`.
  Accumulator,

  // BRK
  Implied,

  // 8-bit constant in instruction, e. g. `lda #10`.
  Immediate,

  // zero-page address, e. g. `lda $00`.
  ZeroPage,

  // address is X register + 8-bit constant, e. g. `lda $80,x`.
  ZeroPageX,

  // address is Y register + 8-bit constant, e. g. `ldx $10,y`.
  ZeroPageY,

  // branch target as signed relative offset, e. g. `bne label`.
  Relative,

  // full 16-bit address, e. g. `jmp $1000`.
  Absolute,

  // full 16-bit address plus X register, e. g. `sta $1000,X`.
  AbsoluteX,

  // full 16-bit address plus Y register, e. g. `sta $1000,Y`.
  AbsoluteY,

  // jump to address stored at address, e. g. `jmp ($1000)`.
  Indirect,

  // load from address stored at (constant zero page address plus X register), e. g. `lda ($10,X)`.
  IndexedIndirectX,

  // load from (address stored at constant zero page address) plus Y register, e. g. `lda ($10),Y`.
  IndirectIndexedY,
}


macro_rules! static_dispatch_addressing_mode {
  ( $function:ident ( $( $arg:ident : $itype:ty ),* ) $( -> $otype: ty )? ) => {
    pub fn $function (&self, $( $arg : $itype ),*) $( -> $otype )? {
      match self {
        AddressingMode::Accumulator => UseAccumulator::$function( $($arg),* ),
        AddressingMode::Implied => UseImplied::$function( $($arg),* ),
        AddressingMode::Immediate => UseImmediate::$function( $($arg),* ),
        AddressingMode::ZeroPage => UseZeroPage::$function( $($arg),* ),
        AddressingMode::ZeroPageX => UseZeroPageWith::<'X'>::$function( $($arg),* ),
        AddressingMode::ZeroPageY => UseZeroPageWith::<'Y'>::$function( $($arg),* ),
        AddressingMode::Relative => UseRelative::$function( $($arg),* ),
        AddressingMode::Absolute => UseAbsolute::$function( $($arg),* ),
        AddressingMode::AbsoluteX => UseAbsoluteWith::<'X'>::$function( $($arg),* ),
        AddressingMode::AbsoluteY => UseAbsoluteWith::<'Y'>::$function( $($arg),* ),
        AddressingMode::Indirect => UseIndirect::$function( $($arg),* ),
        AddressingMode::IndexedIndirectX => UseIndexedIndirectX::$function( $($arg),* ),
        AddressingMode::IndirectIndexedY => UseIndirectIndexedY::$function( $($arg),* ),
      }
    }
  }
}

impl AddressingMode {
  static_dispatch_addressing_mode!(get_size() -> u8);
  static_dispatch_addressing_mode!(get_operand(bytes: &[u8]) -> String);
  static_dispatch_addressing_mode!(get_name() -> &'static str);
}

// Executes with pc just past the opcode, returns cycles on top of the base
// cost (page crossings, taken branches)
type Instr = fn(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8;

trait AccOp {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8);
}

struct Adc;
impl AccOp for Adc {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8) {
    let carry = status.has::<'C'>();
    let (result, carry, overflow) = if status.has::<'D'>() {
      alu::add_decimal_with_carry(*accumulator, value, carry)
    } else {
      alu::add_with_carry(*accumulator, value, carry)
    };

    *accumulator = result;
    status.set::<'C'>(carry);
    status.set::<'V'>(overflow);
    status.set_nz_from_u8(result);
  }
}

#[test]
fn test_adc_70_plus_70() {
  let mut accumulator = 0x70;
  let mut status = Status::new();
  assert!(!status.has::<'C'>());
  Adc::call(&mut accumulator, &mut status, 0x70);
  assert_eq!(accumulator, 0xE0);
  assert!(!status.has::<'C'>());
  assert!(status.has::<'N'>());
  assert!(status.has::<'V'>());
  assert!(!status.has::<'Z'>());
}

#[test]
fn test_adc_d0_plus_90() {
  let mut accumulator = 0xD0;
  let mut status = Status::new();
  assert!(!status.has::<'C'>());
  Adc::call(&mut accumulator, &mut status, 0x90);
  assert_eq!(accumulator, 0x60);
  assert!(status.has::<'C'>());
  assert!(!status.has::<'N'>());
  assert!(status.has::<'V'>());
  assert!(!status.has::<'Z'>());
}

#[test]
fn test_adc_d1_plus_d1() {
  let mut accumulator = 0xD1;
  let mut status = Status::new();
  assert!(!status.has::<'C'>());
  Adc::call(&mut accumulator, &mut status, 0xD1);
  assert_eq!(accumulator, 0xA2);
  assert!(status.has::<'C'>());
  assert!(status.has::<'N'>());
  assert!(!status.has::<'V'>());
  assert!(!status.has::<'Z'>());
}

#[test]
fn test_adc_decimal_mode() {
  let mut accumulator = 0x58;
  let mut status = Status::new();
  status.set_flag::<'D', true>();
  Adc::call(&mut accumulator, &mut status, 0x46);
  assert_eq!(accumulator, 0x04);
  assert!(status.has::<'C'>());
  assert!(!status.has::<'Z'>());
  assert!(!status.has::<'N'>());
}

struct And;
impl AccOp for And {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8) {
    let result = alu::and(*accumulator, value);
    status.set_nz_from_u8(result);
    *accumulator = result;
  }
}

struct Eor;
impl AccOp for Eor {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8) {
    let result = alu::eor(*accumulator, value);
    status.set_nz_from_u8(result);
    *accumulator = result;
  }
}

struct Ora;
impl AccOp for Ora {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8) {
    let result = alu::ora(*accumulator, value);
    status.set_nz_from_u8(result);
    *accumulator = result;
  }
}

struct Sbc;
impl AccOp for Sbc {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8) {
    let carry = status.has::<'C'>();
    let (result, carry, overflow) = if status.has::<'D'>() {
      alu::sub_decimal_with_carry(*accumulator, value, carry)
    } else {
      alu::sub_with_carry(*accumulator, value, carry)
    };

    *accumulator = result;
    status.set::<'C'>(carry);
    status.set::<'V'>(overflow);
    status.set_nz_from_u8(result);
  }
}

#[test]
fn test_sbc_50_minus_f0() {
  let mut accumulator = 0x50;
  let mut status = Status::new();
  status.set_flag::<'Z', true>();
  status.set_flag::<'C', true>();
  Sbc::call(&mut accumulator, &mut status, 0xF0);
  assert_eq!(accumulator, 0x60);
  assert!(!status.has::<'C'>());
  assert!(!status.has::<'N'>());
  assert!(!status.has::<'V'>()); // + minus - = +, no overflow
  assert!(!status.has::<'Z'>());
}

#[test]
fn test_sbc_bf_minus_40() {
  // -65 - 64 = -129 does not fit
  let mut accumulator = 0xBF;
  let mut status = Status::new();
  status.set_flag::<'C', true>();
  Sbc::call(&mut accumulator, &mut status, 0x40);
  assert_eq!(accumulator, 0x7F);
  assert!(status.has::<'C'>()); // no borrow
  assert!(!status.has::<'N'>());
  assert!(status.has::<'V'>());
  assert!(!status.has::<'Z'>());
}

#[test]
fn test_sbc_d0_minus_70() {
  //    D0 = 208 | -48
  //    70 = 112 | 112
  //    -------------- -
  // (1)60 = 96  | -160, overflow
  let mut accumulator = 0xd0;
  let mut status = Status::new();
  status.set_flag::<'C', true>();
  Sbc::call(&mut accumulator, &mut status, 0x70);
  assert_eq!(accumulator, 0x60);
  assert!(status.has::<'C'>()); // no borrow
  assert!(!status.has::<'N'>());
  assert!(status.has::<'V'>());
  assert!(!status.has::<'Z'>());
}

// CMP as an accumulator operation that leaves the accumulator alone
struct Cmp;
impl AccOp for Cmp {
  fn call(accumulator: &mut u8, status: &mut Status, value: u8) {
    set_compare_flags(status, *accumulator, value);
  }
}

fn set_compare_flags(status: &mut Status, register: u8, value: u8) {
  let (difference, carry) = alu::compare(register, value);
  status.set::<'C'>(carry);
  status.set_nz_from_u8(difference);
}

fn by_acc<AO: AccOp, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  let value = resolved.operand.read(registers, memory);
  AO::call(&mut registers.a, &mut registers.p, value);
  resolved.page_crossed as u8
}

trait RefOp {
  fn call(data: &mut u8, status: &mut Status);
}

struct ShiftLeft<const CARRY_INTO_BIT0: bool>;
impl<const CARRY_INTO_BIT0: bool> RefOp for ShiftLeft<CARRY_INTO_BIT0> {
  fn call(data: &mut u8, status: &mut Status) {
    let (result, carry) = if CARRY_INTO_BIT0 {
      alu::rol(*data, status.has::<'C'>())
    } else {
      alu::asl(*data)
    };
    status.set::<'C'>(carry);
    status.set_nz_from_u8(result);
    *data = result;
  }
}

struct ShiftRight<const CARRY_INTO_BIT7: bool>;
impl<const CARRY_INTO_BIT7: bool> RefOp for ShiftRight<CARRY_INTO_BIT7> {
  fn call(data: &mut u8, status: &mut Status) {
    let (result, carry) = if CARRY_INTO_BIT7 {
      alu::ror(*data, status.has::<'C'>())
    } else {
      alu::lsr(*data)
    };
    status.set::<'C'>(carry);
    status.set_nz_from_u8(result);
    *data = result;
  }
}

struct Increment;
impl RefOp for Increment {
  fn call(data: &mut u8, status: &mut Status) {
    let result = alu::inc(*data);
    status.set_nz_from_u8(result);
    *data = result;
  }
}

struct Decrement;
impl RefOp for Decrement {
  fn call(data: &mut u8, status: &mut Status) {
    let result = alu::dec(*data);
    status.set_nz_from_u8(result);
    *data = result;
  }
}

// Read, write back the unmodified value, write the result. Peripherals see
// both writes. The accumulator form touches no memory at all.
fn read_modify_write<RO: RefOp>(registers: &mut Registers, memory: &mut dyn MemoryBus, operand: Operand) -> u8 {
  let mut value = operand.read(registers, memory);
  if let Operand::Memory(address) = operand {
    memory.write(address, value);
  }
  RO::call(&mut value, &mut registers.p);
  operand.write(registers, memory, value);
  value
}

fn by_ref<RO: RefOp, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let operand = AM::resolve(registers, memory).operand;
  read_modify_write::<RO>(registers, memory, operand);
  0
}

// Undocumented read-modify-write combinations (SLO, RLA, SRE, RRA, DCP, ISB):
// the memory operation, then the accumulator operation on its result.
fn by_ref_then_acc<RO: RefOp, AO: AccOp, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let operand = AM::resolve(registers, memory).operand;
  let value = read_modify_write::<RO>(registers, memory, operand);
  AO::call(&mut registers.a, &mut registers.p, value);
  0
}

const fn register_value<const REGISTER: char>(registers: &Registers) -> u8 {
  match REGISTER {
    'a'|'A' => registers.a,
    'x'|'X' => registers.x,
    'y'|'Y' => registers.y,
    's'|'S' => registers.s.to_u8(),
    _       => unimplemented!()
  }
}

fn register_ref<const REGISTER: char>(registers: &mut Registers) -> &mut u8 {
  match REGISTER {
    'a'|'A' => &mut registers.a,
    'x'|'X' => &mut registers.x,
    'y'|'Y' => &mut registers.y,
    's'|'S' => registers.s.borrow_mut(),
    _       => unimplemented!()
  }
}

fn compare<const REGISTER: char, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let lhs = register_value::<REGISTER>(registers);
  let resolved = AM::resolve(registers, memory);
  let rhs = resolved.operand.read(registers, memory);
  set_compare_flags(&mut registers.p, lhs, rhs);
  resolved.page_crossed as u8
}

fn bit<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  let value = resolved.operand.read(registers, memory);
  registers.p = alu::bit(registers.a, value, registers.p);
  0
}

fn inc_register<const XY: char>(registers: &mut Registers, _: &mut dyn MemoryBus) -> u8 {
  let register = register_ref::<XY>(registers);
  let result = alu::inc(*register);
  *register = result;
  registers.p.set_nz_from_u8(result);
  0
}

fn dec_register<const XY: char>(registers: &mut Registers, _: &mut dyn MemoryBus) -> u8 {
  let register = register_ref::<XY>(registers);
  let result = alu::dec(*register);
  *register = result;
  registers.p.set_nz_from_u8(result);
  0
}

fn jump<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  if let Some(jump_address) = AM::resolve(registers, memory).address() {
    registers.pc = jump_address;
  }
  0
}

fn jump_sub<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  let mut return_address = registers.pc; // next instruction
  return_address.dec_by(1);              // 6502 pushes last byte of instruction!
  stack_push(registers, memory, return_address.hi_u8());
  stack_push(registers, memory, return_address.lo_u8());
  if let Some(jump_address) = resolved.address() {
    registers.pc = jump_address;
  }
  0
}

fn return_sub(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let lo = stack_pull(registers, memory);
  let hi = stack_pull(registers, memory);
  let return_address = Address::from_le_bytes(lo, hi); // last byte of JSR instruction!

  registers.pc = return_address.next();
  0
}

fn return_interrupt(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let status = stack_pull(registers, memory);
  let lo = stack_pull(registers, memory);
  let hi = stack_pull(registers, memory);

  registers.p = Status::pulled(status);
  registers.pc = Address::from_le_bytes(lo, hi);
  0
}

// +1 cycle when taken, +1 more when the target is in another page
fn branch<const FLAG: char, const SET: bool>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = UseRelative::resolve(registers, memory);
  if registers.p.has::<FLAG>() != SET {
    return 0;
  }
  match resolved.address() {
    Some(target) => {
      registers.pc = target;
      1 + resolved.page_crossed as u8
    },
    None => 0,
  }
}

fn set_flag<const FLAG: char, const SET: bool>(registers: &mut Registers, _: &mut dyn MemoryBus) -> u8 {
  registers.p.set_flag::<FLAG, SET>();
  0
}

fn load_value<const REGISTER: char>(registers: &mut Registers, value: u8) {
  *register_ref::<REGISTER>(registers) = value;
  registers.p.set_nz_from_u8(value);
}

fn load<const REGISTER: char, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  let value = resolved.operand.read(registers, memory);
  load_value::<REGISTER>(registers, value);
  resolved.page_crossed as u8
}

// LDA then LDX with the same value
fn load_ax<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  let value = resolved.operand.read(registers, memory);
  load_value::<'A'>(registers, value);
  load_value::<'X'>(registers, value);
  resolved.page_crossed as u8
}

fn transfer<const FROM: char, const TO: char>(registers: &mut Registers, _: &mut dyn MemoryBus) -> u8 {
  let value = register_value::<FROM>(registers);
  *register_ref::<TO>(registers) = value;
  // TXS is the only transfer leaving the flags alone
  if !matches!(TO, 's'|'S') {
    registers.p.set_nz_from_u8(value);
  }
  0
}

fn push_accumulator(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  stack_push(registers, memory, registers.a);
  0
}

fn push_status(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  // B is 0 when pushed by interrupts (NMI and IRQ) and 1 when pushed by
  // instructions (BRK and PHP).
  let value = registers.p.to_pushed(true);
  stack_push(registers, memory, value);
  0
}

fn pull_accumulator(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = stack_pull(registers, memory);
  load_value::<'A'>(registers, value);
  0
}

fn pull_status(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = stack_pull(registers, memory);
  registers.p = Status::pulled(value);
  0
}

fn store<const REGISTER: char, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = register_value::<REGISTER>(registers);
  let operand = AM::resolve(registers, memory).operand;
  operand.write(registers, memory, value);
  0
}

fn store_ax<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = registers.a & registers.x;
  let operand = AM::resolve(registers, memory).operand;
  operand.write(registers, memory, value);
  0
}

// SHA, SHX, SHY, TAS: the stored value is ANDed with the high byte of the
// base address plus one. When indexing crosses a page that same value
// replaces the high byte of the target address.
fn store_and_high<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus, value: u8) {
  let resolved = AM::resolve(registers, memory);
  if let Some(address) = resolved.address() {
    let high = if resolved.page_crossed {
      address.hi_u8()
    } else {
      address.hi_u8().wrapping_add(1)
    };
    let value = value & high;
    let address = if resolved.page_crossed {
      Address::from_le_bytes(address.lo_u8(), value)
    } else {
      address
    };
    memory.write(address, value);
  }
}

fn store_high<const REGISTER: char, AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = match REGISTER {
    'x'|'X' => registers.x,
    'y'|'Y' => registers.y,
    _       => registers.a & registers.x,
  };
  store_and_high::<AM>(registers, memory, value);
  0
}

fn transfer_and_store_high<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = registers.a & registers.x;
  *registers.s.borrow_mut() = value;
  store_and_high::<AM>(registers, memory, value);
  0
}

fn load_and_stack<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  let value = resolved.operand.read(registers, memory) & registers.s.to_u8();
  *registers.s.borrow_mut() = value;
  load_value::<'A'>(registers, value);
  load_value::<'X'>(registers, value);
  resolved.page_crossed as u8
}

// AND #imm, then C = N
fn and_copy_carry(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  by_acc::<And, UseImmediate>(registers, memory);
  let negative = registers.p.has::<'N'>();
  registers.p.set::<'C'>(negative);
  0
}

// AND #imm, then LSR A
fn and_shift_right(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  by_acc::<And, UseImmediate>(registers, memory);
  ShiftRight::<false>::call(&mut registers.a, &mut registers.p);
  0
}

// AND #imm, then ROR A with C from bit 6 and V from bit 6 ^ bit 5. In decimal
// mode the NMOS part applies a BCD style fix-up to the rotated value.
fn and_rotate_right(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  by_acc::<And, UseImmediate>(registers, memory);
  let and = registers.a;
  let carry_in = registers.p.has::<'C'>();
  let (mut result, _) = alu::ror(and, carry_in);

  if !registers.p.has::<'D'>() {
    registers.p.set_nz_from_u8(result);
    registers.p.set::<'C'>(result & 0b0100_0000 != 0);
    registers.p.set::<'V'>((result ^ (result << 1)) & 0b0100_0000 != 0);
  } else {
    registers.p.set::<'N'>(carry_in);
    registers.p.set::<'Z'>(result == 0);
    registers.p.set::<'V'>((and ^ result) & 0b0100_0000 != 0);
    if (and & 0x0F) + (and & 0x01) > 5 {
      result = (result & 0xF0) | (result.wrapping_add(6) & 0x0F);
    }
    let fix_high = (and & 0xF0) as u16 + (and & 0x10) as u16 > 0x50;
    if fix_high {
      result = result.wrapping_add(0x60);
    }
    registers.p.set::<'C'>(fix_high);
  }
  registers.a = result;
  0
}

// Both depend on analog effects on real parts; 0xEE is the commonly
// observed constant.
const MAGIC: u8 = 0xEE;

fn and_x_immediate(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = UseImmediate::resolve(registers, memory).operand.read(registers, memory);
  let result = (registers.a | MAGIC) & registers.x & value;
  load_value::<'A'>(registers, result);
  0
}

fn load_ax_immediate(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = UseImmediate::resolve(registers, memory).operand.read(registers, memory);
  let result = (registers.a | MAGIC) & value;
  load_value::<'A'>(registers, result);
  load_value::<'X'>(registers, result);
  0
}

// X = (A & X) - imm, flags like CMP, no borrow in
fn subtract_x(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let value = UseImmediate::resolve(registers, memory).operand.read(registers, memory);
  let (result, carry) = alu::compare(registers.a & registers.x, value);
  registers.x = result;
  registers.p.set::<'C'>(carry);
  registers.p.set_nz_from_u8(result);
  0
}

// Memory forms still put the read on the bus
fn no_operation<AM: UseMode>(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  let resolved = AM::resolve(registers, memory);
  if let Operand::Memory(address) = resolved.operand {
    memory.read(address);
  }
  resolved.page_crossed as u8
}

fn handle_brk(registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
  registers.pc = registers.pc.next(); // padding byte after BRK
  Interrupt::Break.enter(registers, memory);
  0
}

// Table filler for the JAM opcodes, which `CPU::step` reports instead of
// executing
fn halt(_: &mut Registers, _: &mut dyn MemoryBus) -> u8 {
  0
}

pub struct Instruction {
  pub mnemonic: Mnemonic,
  pub addressing_mode: AddressingMode,
  pub instr: Instr,
  pub cycles: u8, // base cost
}

impl Instruction {
  pub const fn new(mnemonic: Mnemonic, addressing_mode: AddressingMode, instr: Instr, cycles: u8) -> Instruction {
    Instruction { mnemonic, addressing_mode, instr, cycles }
  }

  pub const fn lookup(byte: u8) -> &'static Instruction {
    &INSTRUCTIONS[byte as usize]
  }

  // false for the opcodes that lock up the processor
  pub const fn is_valid(&self) -> bool {
    !matches!(self.mnemonic, Mnemonic::JAM)
  }

  // Runs the instruction at pc, returns the cycles it took
  pub fn execute(&self, registers: &mut Registers, memory: &mut dyn MemoryBus) -> u8 {
    registers.pc = registers.pc.next();
    let extra = (self.instr)(registers, memory);
    self.cycles + extra
  }
}

use Mnemonic::*;
use AddressingMode::{
  Accumulator as Acc, Implied as Imp, Immediate as Imm, ZeroPage as Zp,
  ZeroPageX as ZpX, ZeroPageY as ZpY, Relative as Rel, Absolute as Abs,
  AbsoluteX as AbsX, AbsoluteY as AbsY, Indirect as Ind,
  IndexedIndirectX as IndX, IndirectIndexedY as IndY,
};
type ZeroPageX = UseZeroPageWith<'X'>;
type ZeroPageY = UseZeroPageWith<'Y'>;
type AbsoluteX = UseAbsoluteWith<'X'>;
type AbsoluteY = UseAbsoluteWith<'Y'>;

const KIL: Instruction = Instruction::new(JAM, Imp, halt, 0);
const INSTRUCTIONS: [Instruction; 256] = [
  Instruction::new(BRK, Imp, handle_brk, 7), // 0x00
  Instruction::new(ORA, IndX, by_acc::<Ora, UseIndexedIndirectX>, 6),
  KIL,
  Instruction::new(SLO, IndX, by_ref_then_acc::<ShiftLeft<false>, Ora, UseIndexedIndirectX>, 8),
  Instruction::new(NOP, Zp, no_operation::<UseZeroPage>, 3),
  Instruction::new(ORA, Zp, by_acc::<Ora, UseZeroPage>, 3),
  Instruction::new(ASL, Zp, by_ref::<ShiftLeft<false>, UseZeroPage>, 5),
  Instruction::new(SLO, Zp, by_ref_then_acc::<ShiftLeft<false>, Ora, UseZeroPage>, 5),
  Instruction::new(PHP, Imp, push_status, 3), // 0x08
  Instruction::new(ORA, Imm, by_acc::<Ora, UseImmediate>, 2),
  Instruction::new(ASL, Acc, by_ref::<ShiftLeft<false>, UseAccumulator>, 2),
  Instruction::new(ANC, Imm, and_copy_carry, 2),
  Instruction::new(NOP, Abs, no_operation::<UseAbsolute>, 4),
  Instruction::new(ORA, Abs, by_acc::<Ora, UseAbsolute>, 4),
  Instruction::new(ASL, Abs, by_ref::<ShiftLeft<false>, UseAbsolute>, 6),
  Instruction::new(SLO, Abs, by_ref_then_acc::<ShiftLeft<false>, Ora, UseAbsolute>, 6),
  Instruction::new(BPL, Rel, branch::<'N', false>, 2), // 0x10
  Instruction::new(ORA, IndY, by_acc::<Ora, UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(SLO, IndY, by_ref_then_acc::<ShiftLeft<false>, Ora, UseIndirectIndexedY>, 8),
  Instruction::new(NOP, ZpX, no_operation::<ZeroPageX>, 4),
  Instruction::new(ORA, ZpX, by_acc::<Ora, ZeroPageX>, 4),
  Instruction::new(ASL, ZpX, by_ref::<ShiftLeft<false>, ZeroPageX>, 6),
  Instruction::new(SLO, ZpX, by_ref_then_acc::<ShiftLeft<false>, Ora, ZeroPageX>, 6),
  Instruction::new(CLC, Imp, set_flag::<'C', false>, 2), // 0x18
  Instruction::new(ORA, AbsY, by_acc::<Ora, AbsoluteY>, 4),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(SLO, AbsY, by_ref_then_acc::<ShiftLeft<false>, Ora, AbsoluteY>, 7),
  Instruction::new(NOP, AbsX, no_operation::<AbsoluteX>, 4),
  Instruction::new(ORA, AbsX, by_acc::<Ora, AbsoluteX>, 4),
  Instruction::new(ASL, AbsX, by_ref::<ShiftLeft<false>, AbsoluteX>, 7),
  Instruction::new(SLO, AbsX, by_ref_then_acc::<ShiftLeft<false>, Ora, AbsoluteX>, 7),
  Instruction::new(JSR, Abs, jump_sub::<UseAbsolute>, 6), // 0x20
  Instruction::new(AND, IndX, by_acc::<And, UseIndexedIndirectX>, 6),
  KIL,
  Instruction::new(RLA, IndX, by_ref_then_acc::<ShiftLeft<true>, And, UseIndexedIndirectX>, 8),
  Instruction::new(BIT, Zp, bit::<UseZeroPage>, 3),
  Instruction::new(AND, Zp, by_acc::<And, UseZeroPage>, 3),
  Instruction::new(ROL, Zp, by_ref::<ShiftLeft<true>, UseZeroPage>, 5),
  Instruction::new(RLA, Zp, by_ref_then_acc::<ShiftLeft<true>, And, UseZeroPage>, 5),
  Instruction::new(PLP, Imp, pull_status, 4), // 0x28
  Instruction::new(AND, Imm, by_acc::<And, UseImmediate>, 2),
  Instruction::new(ROL, Acc, by_ref::<ShiftLeft<true>, UseAccumulator>, 2),
  Instruction::new(ANC, Imm, and_copy_carry, 2),
  Instruction::new(BIT, Abs, bit::<UseAbsolute>, 4),
  Instruction::new(AND, Abs, by_acc::<And, UseAbsolute>, 4),
  Instruction::new(ROL, Abs, by_ref::<ShiftLeft<true>, UseAbsolute>, 6),
  Instruction::new(RLA, Abs, by_ref_then_acc::<ShiftLeft<true>, And, UseAbsolute>, 6),
  Instruction::new(BMI, Rel, branch::<'N', true>, 2), // 0x30
  Instruction::new(AND, IndY, by_acc::<And, UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(RLA, IndY, by_ref_then_acc::<ShiftLeft<true>, And, UseIndirectIndexedY>, 8),
  Instruction::new(NOP, ZpX, no_operation::<ZeroPageX>, 4),
  Instruction::new(AND, ZpX, by_acc::<And, ZeroPageX>, 4),
  Instruction::new(ROL, ZpX, by_ref::<ShiftLeft<true>, ZeroPageX>, 6),
  Instruction::new(RLA, ZpX, by_ref_then_acc::<ShiftLeft<true>, And, ZeroPageX>, 6),
  Instruction::new(SEC, Imp, set_flag::<'C', true>, 2), // 0x38
  Instruction::new(AND, AbsY, by_acc::<And, AbsoluteY>, 4),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(RLA, AbsY, by_ref_then_acc::<ShiftLeft<true>, And, AbsoluteY>, 7),
  Instruction::new(NOP, AbsX, no_operation::<AbsoluteX>, 4),
  Instruction::new(AND, AbsX, by_acc::<And, AbsoluteX>, 4),
  Instruction::new(ROL, AbsX, by_ref::<ShiftLeft<true>, AbsoluteX>, 7),
  Instruction::new(RLA, AbsX, by_ref_then_acc::<ShiftLeft<true>, And, AbsoluteX>, 7),
  Instruction::new(RTI, Imp, return_interrupt, 6), // 0x40
  Instruction::new(EOR, IndX, by_acc::<Eor, UseIndexedIndirectX>, 6),
  KIL,
  Instruction::new(SRE, IndX, by_ref_then_acc::<ShiftRight<false>, Eor, UseIndexedIndirectX>, 8),
  Instruction::new(NOP, Zp, no_operation::<UseZeroPage>, 3),
  Instruction::new(EOR, Zp, by_acc::<Eor, UseZeroPage>, 3),
  Instruction::new(LSR, Zp, by_ref::<ShiftRight<false>, UseZeroPage>, 5),
  Instruction::new(SRE, Zp, by_ref_then_acc::<ShiftRight<false>, Eor, UseZeroPage>, 5),
  Instruction::new(PHA, Imp, push_accumulator, 3), // 0x48
  Instruction::new(EOR, Imm, by_acc::<Eor, UseImmediate>, 2),
  Instruction::new(LSR, Acc, by_ref::<ShiftRight<false>, UseAccumulator>, 2),
  Instruction::new(ALR, Imm, and_shift_right, 2),
  Instruction::new(JMP, Abs, jump::<UseAbsolute>, 3),
  Instruction::new(EOR, Abs, by_acc::<Eor, UseAbsolute>, 4),
  Instruction::new(LSR, Abs, by_ref::<ShiftRight<false>, UseAbsolute>, 6),
  Instruction::new(SRE, Abs, by_ref_then_acc::<ShiftRight<false>, Eor, UseAbsolute>, 6),
  Instruction::new(BVC, Rel, branch::<'V', false>, 2), // 0x50
  Instruction::new(EOR, IndY, by_acc::<Eor, UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(SRE, IndY, by_ref_then_acc::<ShiftRight<false>, Eor, UseIndirectIndexedY>, 8),
  Instruction::new(NOP, ZpX, no_operation::<ZeroPageX>, 4),
  Instruction::new(EOR, ZpX, by_acc::<Eor, ZeroPageX>, 4),
  Instruction::new(LSR, ZpX, by_ref::<ShiftRight<false>, ZeroPageX>, 6),
  Instruction::new(SRE, ZpX, by_ref_then_acc::<ShiftRight<false>, Eor, ZeroPageX>, 6),
  Instruction::new(CLI, Imp, set_flag::<'I', false>, 2), // 0x58
  Instruction::new(EOR, AbsY, by_acc::<Eor, AbsoluteY>, 4),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(SRE, AbsY, by_ref_then_acc::<ShiftRight<false>, Eor, AbsoluteY>, 7),
  Instruction::new(NOP, AbsX, no_operation::<AbsoluteX>, 4),
  Instruction::new(EOR, AbsX, by_acc::<Eor, AbsoluteX>, 4),
  Instruction::new(LSR, AbsX, by_ref::<ShiftRight<false>, AbsoluteX>, 7),
  Instruction::new(SRE, AbsX, by_ref_then_acc::<ShiftRight<false>, Eor, AbsoluteX>, 7),
  Instruction::new(RTS, Imp, return_sub, 6), // 0x60
  Instruction::new(ADC, IndX, by_acc::<Adc, UseIndexedIndirectX>, 6),
  KIL,
  Instruction::new(RRA, IndX, by_ref_then_acc::<ShiftRight<true>, Adc, UseIndexedIndirectX>, 8),
  Instruction::new(NOP, Zp, no_operation::<UseZeroPage>, 3),
  Instruction::new(ADC, Zp, by_acc::<Adc, UseZeroPage>, 3),
  Instruction::new(ROR, Zp, by_ref::<ShiftRight<true>, UseZeroPage>, 5),
  Instruction::new(RRA, Zp, by_ref_then_acc::<ShiftRight<true>, Adc, UseZeroPage>, 5),
  Instruction::new(PLA, Imp, pull_accumulator, 4), // 0x68
  Instruction::new(ADC, Imm, by_acc::<Adc, UseImmediate>, 2),
  Instruction::new(ROR, Acc, by_ref::<ShiftRight<true>, UseAccumulator>, 2),
  Instruction::new(ARR, Imm, and_rotate_right, 2),
  Instruction::new(JMP, Ind, jump::<UseIndirect>, 5),
  Instruction::new(ADC, Abs, by_acc::<Adc, UseAbsolute>, 4),
  Instruction::new(ROR, Abs, by_ref::<ShiftRight<true>, UseAbsolute>, 6),
  Instruction::new(RRA, Abs, by_ref_then_acc::<ShiftRight<true>, Adc, UseAbsolute>, 6),
  Instruction::new(BVS, Rel, branch::<'V', true>, 2), // 0x70
  Instruction::new(ADC, IndY, by_acc::<Adc, UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(RRA, IndY, by_ref_then_acc::<ShiftRight<true>, Adc, UseIndirectIndexedY>, 8),
  Instruction::new(NOP, ZpX, no_operation::<ZeroPageX>, 4),
  Instruction::new(ADC, ZpX, by_acc::<Adc, ZeroPageX>, 4),
  Instruction::new(ROR, ZpX, by_ref::<ShiftRight<true>, ZeroPageX>, 6),
  Instruction::new(RRA, ZpX, by_ref_then_acc::<ShiftRight<true>, Adc, ZeroPageX>, 6),
  Instruction::new(SEI, Imp, set_flag::<'I', true>, 2), // 0x78
  Instruction::new(ADC, AbsY, by_acc::<Adc, AbsoluteY>, 4),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(RRA, AbsY, by_ref_then_acc::<ShiftRight<true>, Adc, AbsoluteY>, 7),
  Instruction::new(NOP, AbsX, no_operation::<AbsoluteX>, 4),
  Instruction::new(ADC, AbsX, by_acc::<Adc, AbsoluteX>, 4),
  Instruction::new(ROR, AbsX, by_ref::<ShiftRight<true>, AbsoluteX>, 7),
  Instruction::new(RRA, AbsX, by_ref_then_acc::<ShiftRight<true>, Adc, AbsoluteX>, 7),
  Instruction::new(NOP, Imm, no_operation::<UseImmediate>, 2), // 0x80
  Instruction::new(STA, IndX, store::<'a', UseIndexedIndirectX>, 6),
  Instruction::new(NOP, Imm, no_operation::<UseImmediate>, 2),
  Instruction::new(SAX, IndX, store_ax::<UseIndexedIndirectX>, 6),
  Instruction::new(STY, Zp, store::<'y', UseZeroPage>, 3),
  Instruction::new(STA, Zp, store::<'a', UseZeroPage>, 3),
  Instruction::new(STX, Zp, store::<'x', UseZeroPage>, 3),
  Instruction::new(SAX, Zp, store_ax::<UseZeroPage>, 3),
  Instruction::new(DEY, Imp, dec_register::<'Y'>, 2), // 0x88
  Instruction::new(NOP, Imm, no_operation::<UseImmediate>, 2),
  Instruction::new(TXA, Imp, transfer::<'X', 'A'>, 2),
  Instruction::new(XAA, Imm, and_x_immediate, 2),
  Instruction::new(STY, Abs, store::<'y', UseAbsolute>, 4),
  Instruction::new(STA, Abs, store::<'a', UseAbsolute>, 4),
  Instruction::new(STX, Abs, store::<'x', UseAbsolute>, 4),
  Instruction::new(SAX, Abs, store_ax::<UseAbsolute>, 4),
  Instruction::new(BCC, Rel, branch::<'C', false>, 2), // 0x90
  Instruction::new(STA, IndY, store::<'a', UseIndirectIndexedY>, 6),
  KIL,
  Instruction::new(SHA, IndY, store_high::<'a', UseIndirectIndexedY>, 6),
  Instruction::new(STY, ZpX, store::<'y', ZeroPageX>, 4),
  Instruction::new(STA, ZpX, store::<'a', ZeroPageX>, 4),
  Instruction::new(STX, ZpY, store::<'x', ZeroPageY>, 4),
  Instruction::new(SAX, ZpY, store_ax::<ZeroPageY>, 4),
  Instruction::new(TYA, Imp, transfer::<'Y', 'A'>, 2), // 0x98
  Instruction::new(STA, AbsY, store::<'a', AbsoluteY>, 5),
  Instruction::new(TXS, Imp, transfer::<'X', 'S'>, 2),
  Instruction::new(TAS, AbsY, transfer_and_store_high::<AbsoluteY>, 5),
  Instruction::new(SHY, AbsX, store_high::<'y', AbsoluteX>, 5),
  Instruction::new(STA, AbsX, store::<'a', AbsoluteX>, 5),
  Instruction::new(SHX, AbsY, store_high::<'x', AbsoluteY>, 5),
  Instruction::new(SHA, AbsY, store_high::<'a', AbsoluteY>, 5),
  Instruction::new(LDY, Imm, load::<'y', UseImmediate>, 2), // 0xa0
  Instruction::new(LDA, IndX, load::<'a', UseIndexedIndirectX>, 6),
  Instruction::new(LDX, Imm, load::<'x', UseImmediate>, 2),
  Instruction::new(LAX, IndX, load_ax::<UseIndexedIndirectX>, 6),
  Instruction::new(LDY, Zp, load::<'y', UseZeroPage>, 3),
  Instruction::new(LDA, Zp, load::<'a', UseZeroPage>, 3),
  Instruction::new(LDX, Zp, load::<'x', UseZeroPage>, 3),
  Instruction::new(LAX, Zp, load_ax::<UseZeroPage>, 3),
  Instruction::new(TAY, Imp, transfer::<'A', 'Y'>, 2), // 0xa8
  Instruction::new(LDA, Imm, load::<'a', UseImmediate>, 2),
  Instruction::new(TAX, Imp, transfer::<'A', 'X'>, 2),
  Instruction::new(LXA, Imm, load_ax_immediate, 2),
  Instruction::new(LDY, Abs, load::<'y', UseAbsolute>, 4),
  Instruction::new(LDA, Abs, load::<'a', UseAbsolute>, 4),
  Instruction::new(LDX, Abs, load::<'x', UseAbsolute>, 4),
  Instruction::new(LAX, Abs, load_ax::<UseAbsolute>, 4),
  Instruction::new(BCS, Rel, branch::<'C', true>, 2), // 0xb0
  Instruction::new(LDA, IndY, load::<'a', UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(LAX, IndY, load_ax::<UseIndirectIndexedY>, 5),
  Instruction::new(LDY, ZpX, load::<'y', ZeroPageX>, 4),
  Instruction::new(LDA, ZpX, load::<'a', ZeroPageX>, 4),
  Instruction::new(LDX, ZpY, load::<'x', ZeroPageY>, 4),
  Instruction::new(LAX, ZpY, load_ax::<ZeroPageY>, 4),
  Instruction::new(CLV, Imp, set_flag::<'V', false>, 2), // 0xb8
  Instruction::new(LDA, AbsY, load::<'a', AbsoluteY>, 4),
  Instruction::new(TSX, Imp, transfer::<'S', 'X'>, 2),
  Instruction::new(LAS, AbsY, load_and_stack::<AbsoluteY>, 4),
  Instruction::new(LDY, AbsX, load::<'y', AbsoluteX>, 4),
  Instruction::new(LDA, AbsX, load::<'a', AbsoluteX>, 4),
  Instruction::new(LDX, AbsY, load::<'x', AbsoluteY>, 4),
  Instruction::new(LAX, AbsY, load_ax::<AbsoluteY>, 4),
  Instruction::new(CPY, Imm, compare::<'Y', UseImmediate>, 2), // 0xc0
  Instruction::new(CMP, IndX, by_acc::<Cmp, UseIndexedIndirectX>, 6),
  Instruction::new(NOP, Imm, no_operation::<UseImmediate>, 2),
  Instruction::new(DCP, IndX, by_ref_then_acc::<Decrement, Cmp, UseIndexedIndirectX>, 8),
  Instruction::new(CPY, Zp, compare::<'Y', UseZeroPage>, 3),
  Instruction::new(CMP, Zp, by_acc::<Cmp, UseZeroPage>, 3),
  Instruction::new(DEC, Zp, by_ref::<Decrement, UseZeroPage>, 5),
  Instruction::new(DCP, Zp, by_ref_then_acc::<Decrement, Cmp, UseZeroPage>, 5),
  Instruction::new(INY, Imp, inc_register::<'Y'>, 2), // 0xc8
  Instruction::new(CMP, Imm, by_acc::<Cmp, UseImmediate>, 2),
  Instruction::new(DEX, Imp, dec_register::<'X'>, 2),
  Instruction::new(AXS, Imm, subtract_x, 2),
  Instruction::new(CPY, Abs, compare::<'Y', UseAbsolute>, 4),
  Instruction::new(CMP, Abs, by_acc::<Cmp, UseAbsolute>, 4),
  Instruction::new(DEC, Abs, by_ref::<Decrement, UseAbsolute>, 6),
  Instruction::new(DCP, Abs, by_ref_then_acc::<Decrement, Cmp, UseAbsolute>, 6),
  Instruction::new(BNE, Rel, branch::<'Z', false>, 2), // 0xd0
  Instruction::new(CMP, IndY, by_acc::<Cmp, UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(DCP, IndY, by_ref_then_acc::<Decrement, Cmp, UseIndirectIndexedY>, 8),
  Instruction::new(NOP, ZpX, no_operation::<ZeroPageX>, 4),
  Instruction::new(CMP, ZpX, by_acc::<Cmp, ZeroPageX>, 4),
  Instruction::new(DEC, ZpX, by_ref::<Decrement, ZeroPageX>, 6),
  Instruction::new(DCP, ZpX, by_ref_then_acc::<Decrement, Cmp, ZeroPageX>, 6),
  Instruction::new(CLD, Imp, set_flag::<'D', false>, 2), // 0xd8
  Instruction::new(CMP, AbsY, by_acc::<Cmp, AbsoluteY>, 4),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(DCP, AbsY, by_ref_then_acc::<Decrement, Cmp, AbsoluteY>, 7),
  Instruction::new(NOP, AbsX, no_operation::<AbsoluteX>, 4),
  Instruction::new(CMP, AbsX, by_acc::<Cmp, AbsoluteX>, 4),
  Instruction::new(DEC, AbsX, by_ref::<Decrement, AbsoluteX>, 7),
  Instruction::new(DCP, AbsX, by_ref_then_acc::<Decrement, Cmp, AbsoluteX>, 7),
  Instruction::new(CPX, Imm, compare::<'X', UseImmediate>, 2), // 0xe0
  Instruction::new(SBC, IndX, by_acc::<Sbc, UseIndexedIndirectX>, 6),
  Instruction::new(NOP, Imm, no_operation::<UseImmediate>, 2),
  Instruction::new(ISB, IndX, by_ref_then_acc::<Increment, Sbc, UseIndexedIndirectX>, 8),
  Instruction::new(CPX, Zp, compare::<'X', UseZeroPage>, 3),
  Instruction::new(SBC, Zp, by_acc::<Sbc, UseZeroPage>, 3),
  Instruction::new(INC, Zp, by_ref::<Increment, UseZeroPage>, 5),
  Instruction::new(ISB, Zp, by_ref_then_acc::<Increment, Sbc, UseZeroPage>, 5),
  Instruction::new(INX, Imp, inc_register::<'X'>, 2), // 0xe8
  Instruction::new(SBC, Imm, by_acc::<Sbc, UseImmediate>, 2),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(SBC, Imm, by_acc::<Sbc, UseImmediate>, 2),
  Instruction::new(CPX, Abs, compare::<'X', UseAbsolute>, 4),
  Instruction::new(SBC, Abs, by_acc::<Sbc, UseAbsolute>, 4),
  Instruction::new(INC, Abs, by_ref::<Increment, UseAbsolute>, 6),
  Instruction::new(ISB, Abs, by_ref_then_acc::<Increment, Sbc, UseAbsolute>, 6),
  Instruction::new(BEQ, Rel, branch::<'Z', true>, 2), // 0xf0
  Instruction::new(SBC, IndY, by_acc::<Sbc, UseIndirectIndexedY>, 5),
  KIL,
  Instruction::new(ISB, IndY, by_ref_then_acc::<Increment, Sbc, UseIndirectIndexedY>, 8),
  Instruction::new(NOP, ZpX, no_operation::<ZeroPageX>, 4),
  Instruction::new(SBC, ZpX, by_acc::<Sbc, ZeroPageX>, 4),
  Instruction::new(INC, ZpX, by_ref::<Increment, ZeroPageX>, 6),
  Instruction::new(ISB, ZpX, by_ref_then_acc::<Increment, Sbc, ZeroPageX>, 6),
  Instruction::new(SED, Imp, set_flag::<'D', true>, 2), // 0xf8
  Instruction::new(SBC, AbsY, by_acc::<Sbc, AbsoluteY>, 4),
  Instruction::new(NOP, Imp, no_operation::<UseImplied>, 2),
  Instruction::new(ISB, AbsY, by_ref_then_acc::<Increment, Sbc, AbsoluteY>, 7),
  Instruction::new(NOP, AbsX, no_operation::<AbsoluteX>, 4),
  Instruction::new(SBC, AbsX, by_acc::<Sbc, AbsoluteX>, 4),
  Instruction::new(INC, AbsX, by_ref::<Increment, AbsoluteX>, 7),
  Instruction::new(ISB, AbsX, by_ref_then_acc::<Increment, Sbc, AbsoluteX>, 7),
];

#[test]
fn halting_opcodes() {
  let halting: Vec<u8> = (0 ..= 255u8).filter(|op| !Instruction::lookup(*op).is_valid()).collect();
  assert_eq!(halting, vec![0x02, 0x12, 0x22, 0x32, 0x42, 0x52, 0x62, 0x72, 0x92, 0xB2, 0xD2, 0xF2]);
}

#[test]
fn operand_sizes_match_modes() {
  assert_eq!(Instruction::lookup(0x20).addressing_mode.get_size(), 2); // JSR
  assert_eq!(Instruction::lookup(0x6C).addressing_mode.get_name(), "indirect");
  assert_eq!(Instruction::lookup(0xB3).mnemonic, LAX);
  assert_eq!(Instruction::lookup(0xB3).addressing_mode, IndY);
  for op in 0 ..= 255u8 {
    let instruction = Instruction::lookup(op);
    if instruction.is_valid() {
      assert!(instruction.cycles >= 2, "{op:#04x} {}", instruction.mnemonic);
    }
  }
}

#[test]
fn step_by_step() {
  use crate::memory::Bus;

  let mut registers = Registers::new();
  let mut mem = Bus::with_ram();
  let addr = Address::from(0);

  mem.write(addr, 0x69); // ADC #0xFF
  mem.write(addr.next(), 0xFF);
  mem.write(addr.next().next(), 0x65); // ADC &0x00 (=0x69)

  assert_eq!(registers.a, 0);
  assert!(!registers.p.has::<'C'>());
  assert_eq!(registers.pc.to_u16(), 0);
  let inst = Instruction::lookup(mem.read(addr));
  assert_eq!(inst.execute(&mut registers, &mut mem), 2);
  assert_eq!(registers.a, 0xFF);
  assert!(!registers.p.has::<'C'>());
  assert_eq!(registers.pc.to_u16(), 2);

  let inst = Instruction::lookup(mem.read(registers.pc));
  assert_eq!(inst.execute(&mut registers, &mut mem), 3);
  assert_eq!(registers.a, 0x68);
  assert!(registers.p.has::<'C'>());
  assert_eq!(registers.pc.to_u16(), 4);

  registers.pc = addr; // reset; add 0xFF + carry
  let inst = Instruction::lookup(mem.read(registers.pc));
  inst.execute(&mut registers, &mut mem);
  assert_eq!(registers.a, 0x68);
  assert!(registers.p.has::<'C'>());
  assert_eq!(registers.pc.to_u16(), 2);

  registers.pc = addr; // reset; add 0xFF without carry
  registers.p.set::<'C'>(false);
  let inst = Instruction::lookup(mem.read(registers.pc));
  inst.execute(&mut registers, &mut mem);
  assert_eq!(registers.a, 0x67); // 0x68 - 1
  assert!(registers.p.has::<'C'>());
  assert_eq!(registers.pc.to_u16(), 2);
}

#[test]
fn transfer_to_stack_keeps_flags() {
  use crate::memory::Bus;

  let mut registers = Registers::new();
  let mut mem = Bus::with_ram();
  registers.x = 0x00;
  registers.p.set_nz_from_u8(0x80);
  mem.write(Address::from(0), 0x9A); // TXS
  Instruction::lookup(0x9A).execute(&mut registers, &mut mem);
  assert_eq!(registers.s.to_u8(), 0x00);
  assert!(registers.p.has::<'N'>());
  assert!(!registers.p.has::<'Z'>());
}
