use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::display::Display;
use crate::error::{Chip8Error, Result};
use crate::font::{FONT_ADDR, font_bytes};

pub type Address = usize;

pub const MEM_SIZE: usize = 4096;
pub const ADDRESS_MASK: Address = 0x0FFF;
pub const PROGRAM_START_ADDR: Address = 0x200;
pub const PROGRAM_END_ADDR: Address = 0xFFF;
pub const MAX_PROGRAM_SIZE: usize = MEM_SIZE - PROGRAM_START_ADDR;
pub const INSTRUCTION_SIZE: Address = 2;
pub const NUM_REGISTERS: usize = 16;
pub const NUM_KEYS: usize = 16;
pub const STACK_DEPTH: usize = 16;
/// Stack pointer value while the call stack is empty.
pub const SP_EMPTY: u8 = 0xFF;

pub struct Memory {
    data: [u8; MEM_SIZE],
}
impl Memory {
    pub fn new() -> Self {
        let data = {
            let mut data = [0; MEM_SIZE];
            for (slot, byte) in data[FONT_ADDR..].iter_mut().zip(font_bytes()) {
                *slot = byte;
            }
            data
        };

        Memory { data }
    }

    /// Reads one byte; the address wraps within the 12-bit address space.
    pub fn read(&self, addr: Address) -> u8 {
        self.data[addr & ADDRESS_MASK]
    }

    pub fn load_rom(&mut self, rom: &[u8]) -> Result<()> {
        if rom.len() > MAX_PROGRAM_SIZE {
            return Err(Chip8Error::RomTooLarge {
                size: rom.len(),
                max: MAX_PROGRAM_SIZE,
            });
        }
        self.data[PROGRAM_START_ADDR..PROGRAM_START_ADDR + rom.len()].copy_from_slice(rom);
        Ok(())
    }

    /// Borrows `len` bytes starting at `start`, failing if any of them lies
    /// beyond the end of the address space.
    pub fn read_range(&self, start: Address, len: usize, opcode: u16) -> Result<&[u8]> {
        let end = start + len.max(1) - 1;
        if end > PROGRAM_END_ADDR {
            return Err(Chip8Error::MemoryOutOfRange { opcode, start, end });
        }
        Ok(&self.data[start..start + len])
    }

    /// Copies `bytes` to `start`. The whole range must sit inside the program
    /// region; nothing is written otherwise.
    pub fn write_range(&mut self, start: Address, bytes: &[u8], opcode: u16) -> Result<()> {
        let end = start + bytes.len().max(1) - 1;
        if start < PROGRAM_START_ADDR || end > PROGRAM_END_ADDR {
            return Err(Chip8Error::MemoryOutOfRange { opcode, start, end });
        }
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Copies out `start..=end` for diagnostics.
    pub fn dump(&self, start: Address, end: Address) -> Result<Vec<u8>> {
        if start > end || end > PROGRAM_END_ADDR {
            return Err(Chip8Error::InvalidAddressRange { start, end });
        }
        Ok(self.data[start..=end].to_vec())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    V0,
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
    V7,
    V8,
    V9,
    VA,
    VB,
    VC,
    VD,
    VE,
    VF,
}
impl Register {
    const ALL: [Register; NUM_REGISTERS] = [
        Register::V0,
        Register::V1,
        Register::V2,
        Register::V3,
        Register::V4,
        Register::V5,
        Register::V6,
        Register::V7,
        Register::V8,
        Register::V9,
        Register::VA,
        Register::VB,
        Register::VC,
        Register::VD,
        Register::VE,
        Register::VF,
    ];

    pub fn from_index(value: usize) -> Result<Self> {
        Self::ALL
            .get(value)
            .copied()
            .ok_or(Chip8Error::InvalidRegister(value))
    }

    /// Register named by the low nibble of `value`.
    pub fn from_nibble(value: u8) -> Self {
        Self::ALL[usize::from(value & 0x0F)]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl std::fmt::Display for Register {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "V{:X}", self.index())
    }
}

pub struct RegisterBank {
    registers: [u8; NUM_REGISTERS],
}
impl RegisterBank {
    pub fn new() -> Self {
        RegisterBank {
            registers: [0; NUM_REGISTERS],
        }
    }

    pub fn read(&self, reg: Register) -> u8 {
        self.registers[reg.index()]
    }

    pub fn write(&mut self, reg: Register, value: u8) {
        self.registers[reg.index()] = value;
    }

    pub fn set_flag(&mut self, flag: bool) {
        self.write(Register::VF, u8::from(flag));
    }

    /// Registers V0 through `last`, inclusive.
    pub fn up_to(&self, last: Register) -> &[u8] {
        &self.registers[..=last.index()]
    }

    pub fn up_to_mut(&mut self, last: Register) -> &mut [u8] {
        &mut self.registers[..=last.index()]
    }

    pub fn as_array(&self) -> &[u8; NUM_REGISTERS] {
        &self.registers
    }
}

pub struct CallStack {
    frames: Vec<Address>,
    sp: u8,
}
impl CallStack {
    pub fn new() -> Self {
        CallStack {
            frames: Vec::with_capacity(STACK_DEPTH),
            sp: SP_EMPTY,
        }
    }

    pub fn push(&mut self, return_address: Address) -> Result<()> {
        if self.frames.len() >= STACK_DEPTH {
            return Err(Chip8Error::StackOverflow { depth: STACK_DEPTH });
        }
        self.frames.push(return_address);
        self.sp = self.sp.wrapping_add(1);
        Ok(())
    }

    pub fn pop(&mut self) -> Result<Address> {
        let return_address = self.frames.pop().ok_or(Chip8Error::StackUnderflow)?;
        self.sp = self.sp.wrapping_sub(1);
        Ok(return_address)
    }

    pub fn sp(&self) -> u8 {
        self.sp
    }

    /// Return addresses, oldest first.
    pub fn frames(&self) -> &[Address] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Key {
    Key0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF,
}
impl Key {
    const ALL: [Key; NUM_KEYS] = [
        Key::Key0,
        Key::Key1,
        Key::Key2,
        Key::Key3,
        Key::Key4,
        Key::Key5,
        Key::Key6,
        Key::Key7,
        Key::Key8,
        Key::Key9,
        Key::KeyA,
        Key::KeyB,
        Key::KeyC,
        Key::KeyD,
        Key::KeyE,
        Key::KeyF,
    ];

    pub fn from_index(index: usize) -> Result<Key> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(Chip8Error::InvalidKey(index))
    }

    /// Key named by `value mod 16`. Used on the execution path, where a
    /// malformed register value must not abort playback.
    pub fn wrapping(value: u8) -> Key {
        Self::ALL[usize::from(value) % NUM_KEYS]
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

pub struct Keypad {
    pressed: [bool; NUM_KEYS],
    previous: [bool; NUM_KEYS],
}
impl Keypad {
    pub fn new() -> Self {
        Keypad {
            pressed: [false; NUM_KEYS],
            previous: [false; NUM_KEYS],
        }
    }

    pub fn set(&mut self, key: Key, pressed: bool) {
        let i = key.index();
        if self.pressed[i] != pressed {
            self.previous[i] = self.pressed[i];
            self.pressed[i] = pressed;
        }
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed[key.index()]
    }

    pub fn was_pressed(&self, key: Key) -> bool {
        self.previous[key.index()]
    }

    /// Lowest key that went from pressed to released. The edge is consumed so
    /// one release satisfies one key wait.
    pub fn take_release(&mut self) -> Option<Key> {
        let key = Key::ALL
            .into_iter()
            .find(|&key| self.was_pressed(key) && !self.is_pressed(key))?;
        self.previous[key.index()] = false;
        Some(key)
    }
}

pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}
impl Timers {
    pub fn new() -> Self {
        Timers { delay: 0, sound: 0 }
    }

    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }
}

/// Everything an instruction may read or mutate.
pub struct Chip8State {
    pub memory: Memory,
    pub registers: RegisterBank,
    pub pc: Address,
    pub index: Address,
    pub stack: CallStack,
    pub timers: Timers,
    pub display: Display,
    pub keypad: Keypad,
    pub rng: StdRng,
    pub last_random: u8,
    pub drawn: bool,
}
impl Chip8State {
    pub fn new(rng: StdRng) -> Self {
        Chip8State {
            memory: Memory::new(),
            registers: RegisterBank::new(),
            pc: PROGRAM_START_ADDR,
            index: 0,
            stack: CallStack::new(),
            timers: Timers::new(),
            display: Display::new(),
            keypad: Keypad::new(),
            rng,
            last_random: 0,
            drawn: false,
        }
    }

    /// Restores power-on state. The random source keeps its position.
    pub fn reset(&mut self) {
        let rng = std::mem::replace(&mut self.rng, StdRng::seed_from_u64(0));
        *self = Chip8State::new(rng);
    }

    pub fn advance_pc(&mut self) {
        self.pc = (self.pc + INSTRUCTION_SIZE) & ADDRESS_MASK;
    }

    pub fn rewind_pc(&mut self) {
        self.pc = self.pc.wrapping_sub(INSTRUCTION_SIZE) & ADDRESS_MASK;
    }

    pub fn jump(&mut self, addr: Address) {
        self.pc = addr & ADDRESS_MASK;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::font::{FONT_END_ADDR, FONT_SPRITES};

    #[test]
    fn memory_starts_with_font() {
        let memory = Memory::new();
        let font = memory.dump(FONT_ADDR, FONT_END_ADDR).unwrap();
        assert_eq!(font, FONT_SPRITES.concat());
        assert_eq!(memory.read(0x200), 0);
    }

    #[test]
    fn memory_read_wraps_address() {
        let mut memory = Memory::new();
        memory.load_rom(&[0xAB]).unwrap();
        assert_eq!(memory.read(0x1200), 0xAB);
    }

    #[test]
    fn load_rom_rejects_oversized_image() {
        let mut memory = Memory::new();
        let rom = vec![0xFF; MAX_PROGRAM_SIZE + 1];
        assert_eq!(
            memory.load_rom(&rom),
            Err(Chip8Error::RomTooLarge {
                size: MAX_PROGRAM_SIZE + 1,
                max: MAX_PROGRAM_SIZE
            })
        );
        assert_eq!(memory.read(PROGRAM_START_ADDR), 0);

        let rom = vec![0xFF; MAX_PROGRAM_SIZE];
        assert!(memory.load_rom(&rom).is_ok());
        assert_eq!(memory.read(PROGRAM_END_ADDR), 0xFF);
    }

    #[test]
    fn write_range_is_all_or_nothing() {
        let mut memory = Memory::new();
        let err = memory.write_range(0xFFE, &[1, 2, 3], 0xF233).unwrap_err();
        assert_eq!(
            err,
            Chip8Error::MemoryOutOfRange {
                opcode: 0xF233,
                start: 0xFFE,
                end: 0x1000
            }
        );
        assert_eq!(memory.read(0xFFE), 0);
        assert_eq!(memory.read(0xFFF), 0);

        assert!(memory.write_range(0x1FF, &[1], 0xF055).is_err());
        assert!(memory.write_range(0xFFD, &[1, 2, 3], 0xF233).is_ok());
        assert_eq!(memory.dump(0xFFD, 0xFFF).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn read_range_allows_interpreter_region() {
        let memory = Memory::new();
        assert_eq!(memory.read_range(FONT_ADDR, 5, 0xF465).unwrap(), &FONT_SPRITES[0]);
        assert!(memory.read_range(0xFFC, 5, 0xD005).is_err());
    }

    #[test]
    fn dump_validates_bounds() {
        let memory = Memory::new();
        assert!(memory.dump(0x300, 0x200).is_err());
        assert!(memory.dump(0x200, 0x1000).is_err());
        assert_eq!(memory.dump(0xFFF, 0xFFF).unwrap().len(), 1);
    }

    #[test]
    fn register_lookup_is_strict() {
        assert_eq!(Register::from_index(15).unwrap(), Register::VF);
        assert_eq!(Register::from_index(16), Err(Chip8Error::InvalidRegister(16)));
        assert_eq!(Register::from_nibble(0x3A), Register::VA);
    }

    #[test]
    fn call_stack_bounds() {
        let mut stack = CallStack::new();
        assert_eq!(stack.sp(), SP_EMPTY);
        assert_eq!(stack.pop(), Err(Chip8Error::StackUnderflow));

        for i in 0..STACK_DEPTH {
            stack.push(0x200 + 2 * i).unwrap();
        }
        assert_eq!(stack.sp(), 15);
        assert_eq!(
            stack.push(0x300),
            Err(Chip8Error::StackOverflow { depth: STACK_DEPTH })
        );
        assert_eq!(stack.depth(), STACK_DEPTH);
        assert_eq!(stack.pop(), Ok(0x200 + 2 * (STACK_DEPTH - 1)));
    }

    #[test]
    fn keypad_tracks_previous_state_on_change() {
        let mut keypad = Keypad::new();
        keypad.set(Key::Key5, true);
        assert!(keypad.is_pressed(Key::Key5));
        assert!(!keypad.was_pressed(Key::Key5));

        // Repeated press events leave the snapshot alone.
        keypad.set(Key::Key5, true);
        assert!(!keypad.was_pressed(Key::Key5));
        assert_eq!(keypad.take_release(), None);

        keypad.set(Key::Key5, false);
        assert!(keypad.was_pressed(Key::Key5));
        assert_eq!(keypad.take_release(), Some(Key::Key5));
        assert_eq!(keypad.take_release(), None);
    }

    #[test]
    fn key_wrapping_masks_index() {
        assert_eq!(Key::wrapping(0x13), Key::Key3);
        assert_eq!(Key::from_index(16), Err(Chip8Error::InvalidKey(16)));
    }

    #[test]
    fn timers_floor_at_zero() {
        let mut timers = Timers::new();
        timers.delay = 1;
        timers.sound = 3;
        timers.tick();
        timers.tick();
        assert_eq!(timers.delay, 0);
        assert_eq!(timers.sound, 1);
    }

    #[test]
    fn pc_wraps_in_address_space() {
        let mut state = Chip8State::new(StdRng::seed_from_u64(1));
        state.jump(0xFFE);
        state.advance_pc();
        assert_eq!(state.pc, 0x000);
        state.rewind_pc();
        assert_eq!(state.pc, 0xFFE);
    }
}
