use micro8::mos6502::{CPU, Interrupt, stop_after, stop_when};
use micro8::memory::{Address, Bus, MemoryBus};

fn load_program() -> (Bus, Address, Address, Address) {
  // Shortly after CPU enters START, it will spin in a loop waiting for mem[0]
  // to become 0. This never happens unless the INTERRUPT routine is executed.
  // The spin loop either exits after 255 tries with accumulator = 0 (failure)
  // or after the semaphore is freed with accumulator = 1 (success).  Execution
  // must stop when reaching BRK and this must be the fine BRK. So, on exit, pc
  // should point at end of program

  const PROGRAM: [u8; 40] = [
                      //  .ORG $FF00
    0xa2, 0xff,       // START:    ldx #$FF
    0x86, 0x00,       //           stx $00     ; initialize semafore
    0x20, 0x0d, 0xff, //           jsr loop
    0x4c, 0x27, 0xff, //           jmp END     ; we're done
    0x00,             //           brk
    0x00,             //           brk
    0x00,             //           brk
    0xca,             // loop:     dex
    0xf0, 0x07,       //           beq timeout ; stop, failed
    0xa5, 0x00,       //           lda $00     ; read semafore
    0xd0, 0xf9,       //           bne loop    ; spin back
    0xa9, 0x01,       //           lda #1      ; OK
    0x60,             //           rts
    0xa9, 0x00,       // timeout:  lda #0      ; Failed
    0x60,             //           rts
    0x00,             //           brk
    0x00,             //           brk
    0x00,             //           brk
    0xe6, 0x00,       // INTERRUPT:inc $00     ; 0xFF1D <- release semafore
    0x40,             //           rti
    0x00,             //           brk
    0x00,             //           brk
    0x00,             //           brk
    0x78,             // dummy:    sei         ; don't use this jump
    0x20, 0x1d, 0xff, // jsr INTERRUPT
    0x00,             // END:      brk         ; 0xFF27
  ];

  let start = Address::from(0xFF00);
  let end = Address::from(0xFF27);
  let irq_entry = Address::from(0xFF1D);
  let mut ram = Bus::with_ram();
  ram.bulk_copy(start, &PROGRAM).unwrap();
  // setup IRQ vector
  const IRQ_VECTOR: Address = Address::from(0xFFFE);
  ram.write(IRQ_VECTOR,        irq_entry.lo_u8());
  ram.write(IRQ_VECTOR.next(), irq_entry.hi_u8());

  (ram, start, end, irq_entry)
}

#[test]
fn test_no_interrupt() {
  let (mut ram, start, end, _) = load_program();

  // Run without interruption
  // - stopped at END label (pc = 0xFF27)
  // - accumulator == 0 on exit -> failure
  // - X == 0 -> watchdog depleted
  let mut cpu = CPU::new();
  cpu.registers.pc = start;

  const BRK: u8 = 0x0;
  cpu.run(&mut ram, &stop_when::<BRK>).unwrap();
  let regs = &mut cpu.registers;
  assert_eq!(regs.pc, end);
  assert_eq!(regs.a, 0); // FAIL
  assert_eq!(regs.x, 0);
  assert_eq!(regs.s.to_u8(), 0xFF); // Initial value
  assert!(!regs.p.has::<'I'>());
}

#[test]
fn test_interrupt() {
  let (mut ram, start, end, irq_entry) = load_program();

  // Interrupt after 100 cycles
  // - stopped at END label (pc = 0xFF27)
  // - accumulator == 1 on exit -> success
  // - X != 0 -> watchdog not depleted
  let mut cpu = CPU::new();
  cpu.registers.pc = start;

  const BRK: u8 = 0x0;
  cpu.run(&mut ram, &stop_after::<100>).unwrap();

  // 11 cycles to get into the loop, then 10 per spin: stopped at the top of
  // the loop after the 9th spin
  assert_eq!(cpu.cycles(), 101);
  assert_eq!(cpu.registers.pc, Address::from(0xFF0D));
  assert_eq!(cpu.registers.a, 0xFF);
  assert_eq!(cpu.registers.x, 0xF6);

  // taken once the DEX in flight completes
  cpu.queue_interrupt(Interrupt::Irq);
  assert_eq!(cpu.step(&mut ram), Ok(2 + 7));
  assert_eq!(cpu.registers.pc, irq_entry);
  assert!(cpu.registers.p.has::<'I'>());
  assert!(cpu.pending().is_empty());
  // return address and status pushed below the JSR return address
  assert_eq!(ram.peek(Address::from(0x01FD)), 0xFF);
  assert_eq!(ram.peek(Address::from(0x01FC)), 0x0E);
  assert_eq!(ram.peek(Address::from(0x01FB)) & 0x10, 0);

  cpu.step(&mut ram).unwrap(); // 1
  assert_eq!(cpu.registers.pc, irq_entry.next().next()); // @ RTI, now
  assert!(cpu.registers.p.has::<'I'>());
  cpu.step(&mut ram).unwrap(); // 2

  assert_eq!(cpu.registers.pc, Address::from(0xFF0E)); // back spin loop
  assert!(!cpu.registers.p.has::<'I'>());

  // run till END
  cpu.run(&mut ram, &stop_when::<BRK>).unwrap();

  assert_eq!(cpu.registers.pc, end);
  assert_eq!(cpu.registers.a, 1); // SUCCESS
  assert_eq!(cpu.registers.x, 0xF5); // not depleted
  assert_eq!(cpu.registers.s.to_u8(), 0xFF); // Initial value
  assert!(!cpu.registers.p.has::<'I'>());
}

#[test]
fn masked_irq_waits_for_cli() {
  let (mut ram, _, _, irq_entry) = load_program();
  // SEI; NOP; CLI; NOP
  ram.bulk_copy(Address::from(0x0300), &[0x78, 0xEA, 0x58, 0xEA]).unwrap();
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(0x0300);

  cpu.step(&mut ram).unwrap(); // SEI
  cpu.queue_interrupt(Interrupt::Irq);
  assert_eq!(cpu.step(&mut ram), Ok(2)); // NOP, masked
  assert!(cpu.pending().contains(Interrupt::Irq));
  assert_eq!(cpu.step(&mut ram), Ok(2 + 7)); // CLI, then taken
  assert_eq!(cpu.registers.pc, irq_entry);
}

#[test]
fn nmi_ignores_mask_and_wins() {
  let (mut ram, _, _, _) = load_program();
  ram.write_word(Address::from(0xFFFA), 0x0400);
  ram.bulk_copy(Address::from(0x0300), &[0x78, 0xEA, 0xEA]).unwrap();
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(0x0300);
  cpu.step(&mut ram).unwrap(); // SEI

  cpu.queue_interrupt(Interrupt::Irq);
  cpu.queue_interrupt(Interrupt::Nmi);
  cpu.step(&mut ram).unwrap();
  assert_eq!(cpu.registers.pc, Address::from(0x0400));
  assert!(cpu.pending().contains(Interrupt::Irq));
}

#[test]
fn queued_reset_drops_everything() {
  let (mut ram, start, _, _) = load_program();
  ram.write_word(Address::from(0xFFFC), start.to_u16());
  ram.bulk_copy(Address::from(0x0300), &[0xEA]).unwrap();
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(0x0300);
  cpu.registers.x = 0x42;
  cpu.queue_interrupt(Interrupt::Irq);
  cpu.queue_interrupt(Interrupt::Reset);
  assert_eq!(cpu.step(&mut ram), Ok(2 + 7));
  assert_eq!(cpu.registers.pc, start);
  assert_eq!(cpu.registers.x, 0);
  assert_eq!(cpu.registers.s.to_u8(), 0xFD);
  assert!(cpu.pending().is_empty());
}

#[test]
fn queued_break_pushes_b_and_next_pc() {
  let (mut ram, _, _, irq_entry) = load_program();
  // SEI; NOP
  ram.bulk_copy(Address::from(0x0300), &[0x78, 0xEA]).unwrap();
  let mut cpu = CPU::new();
  cpu.registers.pc = Address::from(0x0300);
  cpu.step(&mut ram).unwrap(); // SEI

  // not maskable, and unlike the opcode there is no padding byte to skip
  cpu.queue_interrupt(Interrupt::Break);
  assert_eq!(cpu.step(&mut ram), Ok(2 + 7));
  assert_eq!(cpu.registers.pc, irq_entry);
  assert!(cpu.pending().is_empty());
  assert_eq!(ram.peek(Address::from(0x01FF)), 0x03);
  assert_eq!(ram.peek(Address::from(0x01FE)), 0x02);
  let pushed = ram.peek(Address::from(0x01FD));
  assert_ne!(pushed & 0x10, 0); // B
  assert_ne!(pushed & 0x04, 0); // I, as it was
  assert_eq!(cpu.registers.s.to_u8(), 0xFC);
}
