use log::{debug, error, trace};
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::display::{Display, PixelChange};
use crate::error::Result;
use crate::instruction::{DecodedInstruction, decode, lookup};
use crate::state::{Address, Chip8State, Key, Register};

/// A CHIP-8 machine. Owns all guest state; callers drive it through
/// [`Chip8::step`], [`Chip8::tick_timers`], [`Chip8::set_key`] and
/// [`Chip8::load_program`], and observe it through the read-only accessors.
pub struct Chip8 {
    state: Chip8State,
    cycles: u64,
    last_instruction: Option<DecodedInstruction>,
}

impl Chip8 {
    /// A machine whose `RND` instruction draws from an OS-seeded generator.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// A machine whose `RND` sequence is fixed by `seed`.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Chip8 {
            state: Chip8State::new(rng),
            cycles: 0,
            last_instruction: None,
        }
    }

    /// Back to power-on state: font loaded, program memory zeroed, PC at the
    /// program start.
    pub fn reset(&mut self) {
        debug!("Resetting machine after {} cycles", self.cycles);
        self.state.reset();
        self.cycles = 0;
        self.last_instruction = None;
    }

    /// Copies `rom` to the program region. The caller reads the file.
    pub fn load_program(&mut self, rom: &[u8]) -> Result<()> {
        self.state.memory.load_rom(rom)?;
        debug!("Loaded {} byte program", rom.len());
        Ok(())
    }

    /// Runs exactly one fetch-decode-execute cycle.
    pub fn step(&mut self) -> Result<()> {
        self.state.drawn = false;

        let pc = self.state.pc;
        let high_byte = u16::from(self.state.memory.read(pc));
        let low_byte = u16::from(self.state.memory.read(pc + 1));
        let op = decode((high_byte << 8) | low_byte);

        // Move the program counter to next instruction
        self.state.advance_pc();
        self.cycles += 1;

        let instruction = lookup(&op).inspect_err(|e| error!("{pc:#05X}: {e}"))?;
        trace!("{pc:#05X}: {:#06X} {}", op.raw, instruction.mnemonic(&op));

        instruction
            .execute(&op, &mut self.state)
            .inspect_err(|e| error!("{pc:#05X}: {e}"))?;
        self.last_instruction = Some(op);
        Ok(())
    }

    /// Decrements both timers by one, stopping at zero. Meant to be called
    /// at 60 Hz regardless of the instruction clock.
    pub fn tick_timers(&mut self) {
        self.state.timers.tick();
    }

    pub fn set_key(&mut self, index: usize, pressed: bool) -> Result<()> {
        let key = Key::from_index(index)?;
        self.state.keypad.set(key, pressed);
        Ok(())
    }

    pub fn pc(&self) -> Address {
        self.state.pc
    }

    /// 0xFF when the stack is empty, otherwise depth - 1.
    pub fn sp(&self) -> u8 {
        self.state.stack.sp()
    }

    /// Return addresses, oldest first.
    pub fn stack(&self) -> &[Address] {
        self.state.stack.frames()
    }

    pub fn v(&self, index: usize) -> Result<u8> {
        Ok(self.state.registers.read(Register::from_index(index)?))
    }

    pub fn registers(&self) -> &[u8; 16] {
        self.state.registers.as_array()
    }

    pub fn i(&self) -> Address {
        self.state.index
    }

    pub fn key(&self, index: usize) -> Result<bool> {
        Ok(self.state.keypad.is_pressed(Key::from_index(index)?))
    }

    pub fn delay_timer(&self) -> u8 {
        self.state.timers.delay
    }

    pub fn sound_timer(&self) -> u8 {
        self.state.timers.sound
    }

    /// Copy of memory `start..=end`.
    pub fn read_memory(&self, start: Address, end: Address) -> Result<Vec<u8>> {
        self.state.memory.dump(start, end)
    }

    pub fn display(&self) -> &Display {
        &self.state.display
    }

    pub fn updated_pixels(&self) -> &[PixelChange] {
        self.state.display.updated_pixels()
    }

    /// True only for the cycle in which the screen was drawn to or cleared.
    pub fn is_drawn(&self) -> bool {
        self.state.drawn
    }

    pub fn last_random(&self) -> u8 {
        self.state.last_random
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    /// Mnemonic of the last instruction that completed.
    pub fn last_mnemonic(&self) -> Option<String> {
        let op = self.last_instruction?;
        lookup(&op).ok().map(|instruction| instruction.mnemonic(&op))
    }
}

impl Default for Chip8 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Chip8Error;
    use crate::font::{FONT_ADDR, FONT_END_ADDR, FONT_SPRITES};
    use crate::state::{PROGRAM_START_ADDR, SP_EMPTY};
    use rand::Rng;

    fn with_program(ops: &[u16]) -> Chip8 {
        let rom: Vec<u8> = ops.iter().flat_map(|op| op.to_be_bytes()).collect();
        let mut chip8 = Chip8::with_seed(7);
        chip8.load_program(&rom).unwrap();
        chip8
    }

    fn assert_power_on_state(chip8: &Chip8) {
        assert_eq!(chip8.pc(), PROGRAM_START_ADDR);
        assert_eq!(chip8.registers(), &[0; 16]);
        assert_eq!(chip8.i(), 0);
        assert!(chip8.stack().is_empty());
        assert_eq!(chip8.sp(), SP_EMPTY);
        assert_eq!(chip8.delay_timer(), 0);
        assert_eq!(chip8.sound_timer(), 0);
        assert_eq!(chip8.display().lit_pixels(), 0);
        assert_eq!(
            chip8.read_memory(FONT_ADDR, FONT_END_ADDR).unwrap(),
            FONT_SPRITES.concat()
        );
        for key in 0..16 {
            assert!(!chip8.key(key).unwrap());
        }
    }

    #[test]
    fn new_machine_is_in_power_on_state() {
        assert_power_on_state(&Chip8::with_seed(0));
    }

    #[test]
    fn reset_restores_power_on_state() {
        let mut chip8 = with_program(&[
            0x6A12, // LD VA, 0x12
            0xA300, // LD I, 0x300
            0xF015, // LD DT, V0
            0x2208, // CALL 0x208
            0xD005, // DRW V0, V0, 5
        ]);
        chip8.set_key(4, true).unwrap();
        for _ in 0..5 {
            chip8.step().unwrap();
        }
        assert_eq!(chip8.cycle_count(), 5);

        chip8.reset();
        assert_power_on_state(&chip8);
        assert_eq!(chip8.cycle_count(), 0);
        assert_eq!(chip8.read_memory(0x200, 0x201).unwrap(), vec![0, 0]);
        assert_eq!(chip8.last_mnemonic(), None);
    }

    #[test]
    fn call_then_return_resumes_after_call() {
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..100 {
            let target: u16 = rng.random_range(0x202..0xFFE) & !1;
            let mut chip8 = with_program(&[0x2000 | target]);
            chip8
                .state
                .memory
                .write_range(usize::from(target), &[0x00, 0xEE], 0)
                .unwrap();

            chip8.step().unwrap();
            assert_eq!(chip8.pc(), usize::from(target));
            assert_eq!(chip8.stack(), &[0x202]);
            assert_eq!(chip8.sp(), 0);

            chip8.step().unwrap();
            assert_eq!(chip8.pc(), 0x202);
            assert!(chip8.stack().is_empty());
            assert_eq!(chip8.sp(), SP_EMPTY);
        }
    }

    #[test]
    fn skips_advance_by_one_extra_instruction() {
        let cases: [(&[u16], bool); 8] = [
            (&[0x6005, 0x3005], true),
            (&[0x6005, 0x3006], false),
            (&[0x6005, 0x4006], true),
            (&[0x6005, 0x4005], false),
            (&[0x6005, 0x6105, 0x5010], true),
            (&[0x6005, 0x6106, 0x5010], false),
            (&[0x6005, 0x6106, 0x9010], true),
            (&[0x6005, 0x6105, 0x9010], false),
        ];
        for (ops, skipped) in cases {
            let mut chip8 = with_program(ops);
            for _ in 0..ops.len() - 1 {
                chip8.step().unwrap();
            }
            let before = chip8.pc();
            chip8.step().unwrap();
            let expected = if skipped { 4 } else { 2 };
            assert_eq!(chip8.pc() - before, expected, "{ops:04X?}");
        }
    }

    #[test]
    fn key_skips_follow_keypad() {
        for pressed in [false, true] {
            let mut chip8 = with_program(&[0x6E0C, 0xEE9E, 0x0000, 0xEEA1]);
            chip8.set_key(0xC, pressed).unwrap();
            chip8.step().unwrap();

            let before = chip8.pc();
            chip8.step().unwrap();
            assert_eq!(chip8.pc() - before, if pressed { 4 } else { 2 });

            chip8.state.jump(0x206);
            chip8.step().unwrap();
            assert_eq!(chip8.pc() - 0x206, if pressed { 2 } else { 4 });
        }
    }

    #[test]
    fn key_wait_blocks_until_release() {
        let mut chip8 = with_program(&[0xF20A, 0x1202]);
        for _ in 0..10 {
            chip8.step().unwrap();
            assert_eq!(chip8.pc(), 0x200);
        }
        chip8.set_key(7, true).unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.pc(), 0x200);

        chip8.set_key(7, false).unwrap();
        chip8.step().unwrap();
        assert_eq!(chip8.pc(), 0x202);
        assert_eq!(chip8.v(2).unwrap(), 7);
    }

    #[test]
    fn draw_flag_lasts_one_cycle() {
        let mut chip8 = with_program(&[0xF029, 0xD005, 0x6000, 0x00E0, 0x6000]);
        chip8.step().unwrap();
        assert!(!chip8.is_drawn());
        chip8.step().unwrap();
        assert!(chip8.is_drawn());
        assert_eq!(chip8.updated_pixels().len(), 14);
        chip8.step().unwrap();
        assert!(!chip8.is_drawn());
        chip8.step().unwrap();
        assert!(chip8.is_drawn());
        assert_eq!(chip8.display().lit_pixels(), 0);
        chip8.step().unwrap();
        assert!(!chip8.is_drawn());
    }

    #[test]
    fn timers_only_move_on_tick() {
        let mut chip8 = with_program(&[0x6203, 0xF215, 0xF218, 0xF307, 0x1208]);
        for _ in 0..3 {
            chip8.step().unwrap();
        }
        for _ in 0..50 {
            chip8.step().unwrap();
        }
        assert_eq!(chip8.delay_timer(), 3);
        for _ in 0..5 {
            chip8.tick_timers();
        }
        assert_eq!(chip8.delay_timer(), 0);
        assert_eq!(chip8.sound_timer(), 0);
    }

    #[test]
    fn unsupported_opcode_aborts_step() {
        let mut chip8 = with_program(&[0x6001, 0xE0FF]);
        chip8.step().unwrap();
        assert_eq!(
            chip8.step(),
            Err(Chip8Error::UnsupportedOpcode { opcode: 0xE0FF })
        );
        assert_eq!(chip8.last_mnemonic().as_deref(), Some("LD V0, 0x01"));
    }

    #[test]
    fn accessors_are_strict() {
        let mut chip8 = Chip8::with_seed(0);
        assert_eq!(chip8.v(16), Err(Chip8Error::InvalidRegister(16)));
        assert_eq!(chip8.key(16), Err(Chip8Error::InvalidKey(16)));
        assert_eq!(chip8.set_key(16, true), Err(Chip8Error::InvalidKey(16)));
        assert!(chip8.read_memory(0x000, 0x1000).is_err());
        assert_eq!(chip8.read_memory(0x000, 0xFFF).unwrap().len(), 4096);
    }

    #[test]
    fn fetch_wraps_at_end_of_memory() {
        let mut chip8 = Chip8::with_seed(0);
        chip8.load_program(&vec![0; 0xDFF]).unwrap();
        chip8.state.memory.write_range(0xFFF, &[0x12], 0).unwrap();
        // 0xFFF holds the high byte, 0x000 (zero) the low byte: JP 0x200.
        chip8.state.jump(0xFFF);
        chip8.step().unwrap();
        assert_eq!(chip8.pc(), 0x200);
    }

    #[test]
    fn random_is_seeded() {
        let mut a = with_program(&[0xC0FF, 0xC0FF]);
        let mut b = with_program(&[0xC0FF, 0xC0FF]);
        for _ in 0..2 {
            a.step().unwrap();
            b.step().unwrap();
            assert_eq!(a.last_random(), b.last_random());
            assert_eq!(a.v(0).unwrap(), a.last_random());
        }
    }
}
