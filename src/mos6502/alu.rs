use crate::mos6502::registers::Status;

pub const fn add_with_carry(register: u8, value: u8, carry: bool)
          -> (u8, bool, bool) {
  let mut result = register as u16;
  result += value as u16;
  if carry {
    result += 1;
  }

  let carry: bool    =  result & 0b_1_0000_0000 != 0;
  let result: u8     = (result & 0b_0_1111_1111) as u8;
  let overflow: bool = (result ^ register)
                     & (result ^ value)
                     & 0b1000_0000 != 0;

  (result, carry, overflow)
}

// Subtraction is addition of the one's complement; carry means "no borrow"
pub const fn sub_with_carry(register: u8, value: u8, carry: bool)
          -> (u8, bool, bool) {
  add_with_carry(register, !value, carry)
}

// NMOS behaviour: V comes from the high nibble before its decimal
// correction, C from the corrected one. Valid for any input, BCD or not.
pub const fn add_decimal_with_carry(register: u8, value: u8, carry: bool)
          -> (u8, bool, bool) {
  const fn lo(value: u8) -> u16 { (value & 0b0000_1111) as u16 }
  const fn hi(value: u8) -> u16 { (value >> 4) as u16 }

  let mut lo_nibble = lo(register) + lo(value) + carry as u16;
  if lo_nibble > 9 {
    lo_nibble += 6;
  }
  let mut hi_nibble = hi(register) + hi(value) + (lo_nibble > 0xF) as u16;
  let intermediate   = (hi_nibble << 4) as u8;
  let overflow: bool = !(register ^ value)
                     & (register ^ intermediate)
                     & 0b1000_0000 != 0;
  if hi_nibble > 9 {
    hi_nibble += 6;
  }
  let carry: bool = hi_nibble > 0xF;
  let result: u8  = ((hi_nibble << 4) as u8) | (lo_nibble as u8 & 0b0000_1111);

  (result, carry, overflow)
}

// NMOS behaviour: C and V are those of the binary subtraction, only the
// result is decimal corrected.
pub const fn sub_decimal_with_carry(register: u8, value: u8, carry: bool)
          -> (u8, bool, bool) {
  const fn lo(value: u8) -> i16 { (value & 0b0000_1111) as i16 }
  const fn hi(value: u8) -> i16 { (value >> 4) as i16 }

  let (_, out_carry, overflow) = sub_with_carry(register, value, carry);

  let borrow = !carry as i16;
  let mut lo_nibble = lo(register) - lo(value) - borrow;
  let mut hi_nibble = hi(register) - hi(value);
  if lo_nibble < 0 {
    lo_nibble -= 6;
    hi_nibble -= 1;
  }
  if hi_nibble < 0 {
    hi_nibble -= 6;
  }
  let result = ((hi_nibble << 4) | (lo_nibble & 0b0000_1111)) as u8;

  (result, out_carry, overflow)
}

// register - value without borrow: (difference, carry = register >= value)
pub const fn compare(register: u8, value: u8) -> (u8, bool) {
  (register.wrapping_sub(value), register >= value)
}

pub const fn and(accumulator: u8, value: u8) -> u8 {
  accumulator & value
}

pub const fn eor(accumulator: u8, value: u8) -> u8 {
  accumulator ^ value
}

pub const fn ora(accumulator: u8, value: u8) -> u8 {
  accumulator | value
}

pub fn bit(accumulator: u8, value: u8, mut status: Status) -> Status {
  // A is ANDed with the value in memory to set or clear the zero flag
  status.set::<'Z'>(accumulator & value == 0);
   // Overflow is set to bit 6 of the memory value
  status.set::<'V'>(0b0100_0000 & value != 0);
  // Negative is set to bit 7 of the memory value
  status.set::<'N'>(0b1000_0000 & value != 0);
  status
}

pub const fn inc(register: u8) -> u8 {
  register.wrapping_add(1)
}

pub const fn dec(register: u8) -> u8 {
  register.wrapping_sub(1)
}

pub const fn asl(value: u8) -> (u8, bool) {
  let out_carry: bool = value & 0b1000_0000 != 0; // new carry is bit 7
  let result = (value & 0b0111_1111) << 1;
  (result, out_carry)
}

pub const fn rol(value: u8, in_carry: bool) -> (u8, bool) {
  let (mut result, out_carry) = asl(value);
  if in_carry {
    result |= 0b0000_0001; // shift old carry into bit 0
  }
  (result, out_carry)
}

pub const fn lsr(value: u8) -> (u8, bool) {
  let out_carry: bool = value & 0b0000_0001 != 0; // new carry is bit 0
  let result = (value & 0b1111_1110) >> 1;
  (result, out_carry)
}

pub const fn ror(value: u8, in_carry: bool) -> (u8, bool) {
  let (mut result, out_carry) = lsr(value);
  if in_carry {
    result |= 0b1000_0000; // shift old carry into bit 7
  }
  (result, out_carry)
}

#[test]
fn adc_binary() {
  assert_eq!(add_with_carry(0x01, 0x01, false), (0x02, false, false));
  assert_eq!(add_with_carry(0x01, 0xFF, false), (0x00, true, false));
  assert_eq!(add_with_carry(0x7F, 0x01, false), (0x80, false, true));
  assert_eq!(add_with_carry(0x80, 0xFF, false), (0x7F, true, true));
  assert_eq!(add_with_carry(0xFF, 0xFF, true),  (0xFF, true, false));
}

#[test]
fn test_sbc() {
  assert_eq!(sub_with_carry(0, 0, true), (0, true, false));
  assert_eq!(sub_with_carry(1, 0, true), (1, true, false));
  assert_eq!(sub_with_carry(0, 1, true), (255, false, false));
  assert_eq!(sub_with_carry(1, 1, true), (0, true, false));
  assert_eq!(sub_with_carry(5, 3, false), (1, true, false));
  assert_eq!(sub_with_carry(0x80, 0x01, true), (0x7F, true, true));
  assert_eq!(sub_with_carry(0x7F, 0xFF, true), (0x80, false, true));
}

#[test]
fn adc_decimal() {
  assert_eq!(add_decimal_with_carry(0x09, 0x09, true),  (0x19, false, false));
  assert_eq!(add_decimal_with_carry(0x98, 0x01, true),  (0x00, true, false));
  assert_eq!(add_decimal_with_carry(0x79, 0x00, true),  (0x80, false, true));
  assert_eq!(add_decimal_with_carry(0x24, 0x56, false), (0x80, false, true));
  assert_eq!(add_decimal_with_carry(0x82, 0x93, false), (0x75, true, true));
  assert_eq!(add_decimal_with_carry(0x99, 0x01, false), (0x00, true, false));
  // overflow first nibble carries 1, not 2, into high byte
  assert_eq!(add_decimal_with_carry(0x0f, 0x0f, true),  (0x15, false, false));
}

#[test]
fn sbc_decimal() {
  assert_eq!(sub_decimal_with_carry(0, 0, true), (0x00, true, false));
  assert_eq!(sub_decimal_with_carry(1, 0, true), (0x01, true, false));
  assert_eq!(sub_decimal_with_carry(0, 1, true), (0x99, false, false));
  assert_eq!(sub_decimal_with_carry(1, 1, true), (0x00, true, false));
  assert_eq!(sub_decimal_with_carry(0x46, 0x12, true),  (0x34, true, false));
  assert_eq!(sub_decimal_with_carry(0x40, 0x13, true),  (0x27, true, false));
  assert_eq!(sub_decimal_with_carry(0x32, 0x02, false), (0x29, true, false));
  assert_eq!(sub_decimal_with_carry(0x80, 0x80, true),  (0x00, true, false));
  // out of bound / invalid input
  assert_eq!(sub_decimal_with_carry(0x80, 0xf0, false), (0x29, false, false));
}

#[test]
fn compare_sets_carry_on_greater_or_equal() {
  assert_eq!(compare(0xFF, 0xFF), (0x00, true));
  assert_eq!(compare(0x10, 0x20), (0xF0, false));
  assert_eq!(compare(0x20, 0x10), (0x10, true));
}

#[test]
fn shift_left() {
  assert_eq!(asl(0b1000_0000),                 (0, true));
  assert_eq!(asl(0b0000_0000),                 (0, false));
  assert_eq!(asl(0b0000_0001),        (0b000_0010, false));
  assert_eq!(rol(0b1000_0000, false),          (0, true));
  assert_eq!(rol(0b1000_0000, true),           (1, true));
  assert_eq!(rol(0b0000_0001, false),          (2, false));
  assert_eq!(rol(0b0000_0001, true), (0b0000_0011, false));
  assert_eq!(rol(0b0100_0000, false),(0b1000_0000, false));
}

#[test]
fn shift_right() {
  assert_eq!(lsr(0b0000_0001),                 (0, true));
  assert_eq!(lsr(0b0000_0000),                 (0, false));
  assert_eq!(lsr(0b1000_0000),       (0b0100_0000, false));
  assert_eq!(lsr(0b1000_0001),       (0b0100_0000, true));
  assert_eq!(ror(0b0000_0001, false),          (0, true));
  assert_eq!(ror(0b0000_0001, true), (0b1000_0000, true));
  assert_eq!(ror(0b0000_0010, false),(0b0000_0001, false));
  assert_eq!(ror(0b1000_0000, false),(0b0100_0000, false));
  assert_eq!(ror(0b1000_0000, true), (0b1100_0000, false));
}
