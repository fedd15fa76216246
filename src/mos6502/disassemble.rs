use super::instructions::{Instruction, AddressingMode};
use crate::memory::{slice, Address, MemoryBus};

// iterate over variable size &[u8] chunks, where each 1, 2 or 3 byte chunk is
// a 6502 instruction
pub struct Chunks<'a> {
  bytes: &'a [u8],
  index: usize,
}

impl<'a> Chunks<'a> {
  pub fn new(bytes: &'a [u8]) -> Self {
    Chunks { bytes, index: 0 }
  }
}

impl<'a> Iterator for Chunks<'a> {
  type Item = &'a [u8];
  fn next(&mut self) -> Option<Self::Item> {
    if self.index < self.bytes.len() {
      let start = self.index;
      let operation = Instruction::lookup(self.bytes[start]);
      let end = start + 1 + operation.addressing_mode.get_size() as usize;
      let end = end.min(self.bytes.len()); // truncated last instruction
      self.index = end;
      Some(&self.bytes[start .. end])
    } else {
      None
    }
  }
}

fn hexdump(bytes: &[u8], size: usize) -> String {
  // trucate if byte slice is too large
  let bytes = if size < bytes.len() {
    &bytes[.. size]
  } else {
    bytes
  };

  let mut hexs: Vec<String> =
    bytes.iter().map(|b: &u8| format!("{b:02x}")).collect();

  // add filler is slice is too short
  while hexs.len() < size {
    hexs.push("??".to_string());
  }

  // add padding to align with max instruction size (3 bytes, for 6502)
  while hexs.len() < 3 {
    hexs.push("  ".to_string());
  }
  hexs.join(" ")
}

fn do_disassemble(bytes: &[u8], get_operand: impl Fn(&AddressingMode, &[u8]) -> String) -> String {
  let Some(opcode) = bytes.first() else {
    return String::new();
  };
  let operation = Instruction::lookup(*opcode);
  let operand_size = operation.addressing_mode.get_size() as usize;
  let hexdump = hexdump(bytes, 1 + operand_size);
  let mnemonic = operation.mnemonic.to_str();
  let result = if bytes.len() < 1 + operand_size {
    let addressing_mode = operation.addressing_mode.get_name();
    format!("{hexdump} {mnemonic} {addressing_mode}")
  } else if operand_size > 0 {
    let operand = &bytes[1 .. 1 + operand_size];
    let addressing_mode = get_operand(&operation.addressing_mode, operand);
    format!("{hexdump} {mnemonic} {addressing_mode}")
  } else {
    format!("{hexdump} {mnemonic}")
  };
  if !operation.is_valid() {
    format!("{result} <-- invalid opcode")
  } else {
    result
  }
}

pub fn disassemble(bytes: &[u8]) -> String {
  let get_operand = |addressing_mode: &AddressingMode, bytes: &[u8]| -> String {
    addressing_mode.get_operand(bytes)
  };
  do_disassemble(bytes, get_operand)
}

pub fn disassemble_with_address(address: Address, bytes: &[u8]) -> String {
  let get_operand = |addressing_mode: &AddressingMode, bytes: &[u8]| -> String {
    match (addressing_mode, bytes) {
      // operand is pc-relative offset (1 x i8)
      (AddressingMode::Relative, [operand]) => {
        let mut origin = address;
        origin.inc_by(2);
        format!("{:?}", origin.offset(*operand as i8))
      },
      _ => {
        addressing_mode.get_operand(bytes)
      }
    }
  };
  do_disassemble(bytes, get_operand)
}

// Disassemble the instruction at `address` using side effect free reads.
// Returns the text and the instruction size.
pub fn disassemble_at(memory: &dyn MemoryBus, address: Address) -> (String, usize) {
  let opcode = memory.peek(address);
  let size = 1 + Instruction::lookup(opcode).addressing_mode.get_size() as usize;
  let bytes = slice(memory, address, size);
  (format!("{address:?} {}", disassemble_with_address(address, &bytes)), size)
}

#[test]
fn display_instructions()
{
  // bunch of interesting looking opcodes
  for opcode in 0xb4..0xc1 {
    println!("ADDR  {:}", disassemble(&[opcode, 0x12, 0x34]));
  }
  assert_eq!(disassemble(&[0xA9, 0x05]), "a9 05    LDA #0x05");
  assert_eq!(disassemble(&[0x6C, 0xFF, 0x02]), "6c ff 02 JMP &(0x02ff)");
  assert_eq!(disassemble(&[0x02]), "02       JAM <-- invalid opcode");
  assert_eq!(disassemble(&[0xAD, 0x00]), "ad 00 ?? LDA absolute");
  assert_eq!(disassemble(&[]), "");
}

#[test]
fn branch_targets_are_absolute() {
  let text = disassemble_with_address(Address::from(0x0FFE), &[0xD0, 0xFC]);
  assert_eq!(text, "d0 fc    BNE &0x0ffc");
}

#[test]
fn disassemble_at_only_peeks() {
  let mut memory = crate::memory::Bus::with_ram();
  memory.write(Address::from(0x0800), 0x20);
  memory.write_word(Address::from(0x0801), 0xFFD2);
  memory.watch(crate::memory::AddressRange::page(0x08), crate::memory::Access::Any);
  let (text, size) = disassemble_at(&memory, Address::from(0x0800));
  assert_eq!(text, "&0x0800 20 d2 ff JSR &0xffd2");
  assert_eq!(size, 3);
  assert!(!memory.has_hits());
}
