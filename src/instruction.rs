use rand::Rng;

use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::error::{Chip8Error, Result};
use crate::font::glyph_address;
use crate::state::{ADDRESS_MASK, Address, Chip8State, Key, Register};

pub trait Instruction: Sync {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()>;

    /// Assembler-style rendering, e.g. `ADD V1, V2`.
    fn mnemonic(&self, op: &DecodedInstruction) -> String;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecodedInstruction {
    /// The raw 16-bit instruction word.
    pub raw: u16,
    /// First nibble. Represents the operation code.
    pub opcode: u8,
    /// Second nibble. Used to look up one of the 16 registers.
    pub x: Register,
    /// Third nibble. Used to look up one of the 16 registers.
    pub y: Register,
    /// Fourth nibble. A 4-bit number.
    pub n: u8,
    /// The second byte (third and fourth nibbles). An 8-bit immediate number.
    pub kk: u8,
    /// The second, third, and fourth nibbles. A 12-bit immediate address.
    pub nnn: Address,
}

pub fn decode(raw: u16) -> DecodedInstruction {
    DecodedInstruction {
        raw,
        opcode: (raw >> 12) as u8,
        x: Register::from_nibble((raw >> 8) as u8),
        y: Register::from_nibble((raw >> 4) as u8),
        n: (raw & 0x0F) as u8,
        kk: (raw & 0x00FF) as u8,
        nnn: usize::from(raw) & ADDRESS_MASK,
    }
}

/// Selects the handler for `op`: first by opcode nibble, then for the
/// overloaded nibbles by `kk` (0x0, 0xE, 0xF) or `n` (0x8).
pub fn lookup(op: &DecodedInstruction) -> Result<&'static dyn Instruction> {
    match op.opcode {
        0x0 => lookup_system(op),
        0x1 => Ok(&Jump),
        0x2 => Ok(&SubroutineCall),
        0x3 => Ok(&SkipEqImmediate),
        0x4 => Ok(&SkipNeqImmediate),
        0x5 => Ok(&SkipXEqY),
        0x6 => Ok(&SetImmediate),
        0x7 => Ok(&AddImmediate),
        0x8 => lookup_alu(op),
        0x9 => Ok(&SkipXNeqY),
        0xA => Ok(&SetIndex),
        0xB => Ok(&JumpWithOffset),
        0xC => Ok(&Random),
        0xD => Ok(&Draw),
        0xE => lookup_keys(op),
        0xF => lookup_misc(op),
        _ => Err(unsupported(op)),
    }
}

fn lookup_system(op: &DecodedInstruction) -> Result<&'static dyn Instruction> {
    match op.kk {
        0xE0 => Ok(&ClearScreen),
        0xEE => Ok(&SubroutineReturn),
        _ => Err(unsupported(op)),
    }
}

fn lookup_alu(op: &DecodedInstruction) -> Result<&'static dyn Instruction> {
    match op.n {
        0x0 => Ok(&SetXToY),
        0x1 => Ok(&BinaryOr),
        0x2 => Ok(&BinaryAnd),
        0x3 => Ok(&BinaryXor),
        0x4 => Ok(&AddWithCarry),
        0x5 => Ok(&SubtractYFromX),
        0x6 => Ok(&RightShift),
        0x7 => Ok(&SubtractXFromY),
        0xE => Ok(&LeftShift),
        _ => Err(unsupported(op)),
    }
}

fn lookup_keys(op: &DecodedInstruction) -> Result<&'static dyn Instruction> {
    match op.kk {
        0x9E => Ok(&SkipIfKeyPressed),
        0xA1 => Ok(&SkipIfKeyNotPressed),
        _ => Err(unsupported(op)),
    }
}

fn lookup_misc(op: &DecodedInstruction) -> Result<&'static dyn Instruction> {
    match op.kk {
        0x07 => Ok(&SetVxFromTimer),
        0x0A => Ok(&WaitForKey),
        0x15 => Ok(&SetDelayTimer),
        0x18 => Ok(&SetSoundTimer),
        0x1E => Ok(&AddToIndex),
        0x29 => Ok(&FontChar),
        0x33 => Ok(&BinaryCodedDecimal),
        0x55 => Ok(&Store),
        0x65 => Ok(&Load),
        _ => Err(unsupported(op)),
    }
}

fn unsupported(op: &DecodedInstruction) -> Chip8Error {
    Chip8Error::UnsupportedOpcode { opcode: op.raw }
}

struct ClearScreen;
impl Instruction for ClearScreen {
    fn execute(&self, _op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.display.clear();
        state.drawn = true;
        Ok(())
    }

    fn mnemonic(&self, _op: &DecodedInstruction) -> String {
        "CLS".to_string()
    }
}

struct SubroutineReturn;
impl Instruction for SubroutineReturn {
    fn execute(&self, _op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let return_address = state.stack.pop()?;
        state.jump(return_address);
        Ok(())
    }

    fn mnemonic(&self, _op: &DecodedInstruction) -> String {
        "RET".to_string()
    }
}

struct Jump;
impl Instruction for Jump {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.jump(op.nnn);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("JP {:#05X}", op.nnn)
    }
}

struct SubroutineCall;
impl Instruction for SubroutineCall {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        // PC already points past the CALL.
        state.stack.push(state.pc)?;
        state.jump(op.nnn);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("CALL {:#05X}", op.nnn)
    }
}

struct SkipEqImmediate;
impl Instruction for SkipEqImmediate {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        if state.registers.read(op.x) == op.kk {
            state.advance_pc();
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SE {}, {:#04X}", op.x, op.kk)
    }
}

struct SkipNeqImmediate;
impl Instruction for SkipNeqImmediate {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        if state.registers.read(op.x) != op.kk {
            state.advance_pc();
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SNE {}, {:#04X}", op.x, op.kk)
    }
}

struct SkipXEqY;
impl Instruction for SkipXEqY {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        if state.registers.read(op.x) == state.registers.read(op.y) {
            state.advance_pc();
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SE {}, {}", op.x, op.y)
    }
}

struct SkipXNeqY;
impl Instruction for SkipXNeqY {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        if state.registers.read(op.x) != state.registers.read(op.y) {
            state.advance_pc();
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SNE {}, {}", op.x, op.y)
    }
}

struct SetImmediate;
impl Instruction for SetImmediate {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.registers.write(op.x, op.kk);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD {}, {:#04X}", op.x, op.kk)
    }
}

struct AddImmediate;
impl Instruction for AddImmediate {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        state.registers.write(op.x, value_x.wrapping_add(op.kk));
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("ADD {}, {:#04X}", op.x, op.kk)
    }
}

struct SetXToY;
impl Instruction for SetXToY {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_y = state.registers.read(op.y);
        state.registers.write(op.x, value_y);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD {}, {}", op.x, op.y)
    }
}

struct BinaryOr;
impl Instruction for BinaryOr {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let value_y = state.registers.read(op.y);
        state.registers.write(op.x, value_x | value_y);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("OR {}, {}", op.x, op.y)
    }
}

struct BinaryAnd;
impl Instruction for BinaryAnd {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let value_y = state.registers.read(op.y);
        state.registers.write(op.x, value_x & value_y);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("AND {}, {}", op.x, op.y)
    }
}

struct BinaryXor;
impl Instruction for BinaryXor {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let value_y = state.registers.read(op.y);
        state.registers.write(op.x, value_x ^ value_y);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("XOR {}, {}", op.x, op.y)
    }
}

// The flag-producing ALU ops below write VF before the result, so with x == F
// the result is what remains in VF.

struct AddWithCarry;
impl Instruction for AddWithCarry {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let value_y = state.registers.read(op.y);
        let (sum, carry) = value_x.overflowing_add(value_y);

        state.registers.set_flag(carry);
        state.registers.write(op.x, sum);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("ADD {}, {}", op.x, op.y)
    }
}

struct SubtractYFromX;
impl Instruction for SubtractYFromX {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let value_y = state.registers.read(op.y);

        state.registers.set_flag(value_x > value_y);
        state.registers.write(op.x, value_x.wrapping_sub(value_y));
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SUB {}, {}", op.x, op.y)
    }
}

struct SubtractXFromY;
impl Instruction for SubtractXFromY {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let value_y = state.registers.read(op.y);

        state.registers.set_flag(value_y > value_x);
        state.registers.write(op.x, value_y.wrapping_sub(value_x));
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SUBN {}, {}", op.x, op.y)
    }
}

struct RightShift;
impl Instruction for RightShift {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);

        state.registers.set_flag(value_x & 0x01 != 0);
        state.registers.write(op.x, value_x >> 1);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SHR {}", op.x)
    }
}

struct LeftShift;
impl Instruction for LeftShift {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);

        state.registers.set_flag(value_x & 0x80 != 0);
        state.registers.write(op.x, value_x << 1);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SHL {}", op.x)
    }
}

struct SetIndex;
impl Instruction for SetIndex {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.index = op.nnn;
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD I, {:#05X}", op.nnn)
    }
}

struct JumpWithOffset;
impl Instruction for JumpWithOffset {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let offset = usize::from(state.registers.read(Register::V0));
        state.jump(op.nnn + offset);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("JP V0, {:#05X}", op.nnn)
    }
}

struct Random;
impl Instruction for Random {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let random_value: u8 = state.rng.random();
        state.last_random = random_value;
        state.registers.write(op.x, random_value & op.kk);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("RND {}, {:#04X}", op.x, op.kk)
    }
}

struct Draw;
impl Instruction for Draw {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let x = usize::from(state.registers.read(op.x)) % DISPLAY_WIDTH;
        let y = usize::from(state.registers.read(op.y)) % DISPLAY_HEIGHT;

        let sprite = state
            .memory
            .read_range(state.index, usize::from(op.n), op.raw)?;
        let collision = state.display.draw_sprite(x, y, sprite);

        state.registers.set_flag(collision);
        state.drawn = true;
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("DRW {}, {}, {}", op.x, op.y, op.n)
    }
}

struct SkipIfKeyPressed;
impl Instruction for SkipIfKeyPressed {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let key = Key::wrapping(state.registers.read(op.x));
        if state.keypad.is_pressed(key) {
            state.advance_pc();
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SKP {}", op.x)
    }
}

struct SkipIfKeyNotPressed;
impl Instruction for SkipIfKeyNotPressed {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let key = Key::wrapping(state.registers.read(op.x));
        if !state.keypad.is_pressed(key) {
            state.advance_pc();
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("SKNP {}", op.x)
    }
}

struct SetVxFromTimer;
impl Instruction for SetVxFromTimer {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.registers.write(op.x, state.timers.delay);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD {}, DT", op.x)
    }
}

struct WaitForKey;
impl Instruction for WaitForKey {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        match state.keypad.take_release() {
            Some(key) => state.registers.write(op.x, key.index() as u8),
            // Re-run this instruction next cycle until a key is released.
            None => state.rewind_pc(),
        }
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD {}, K", op.x)
    }
}

struct SetDelayTimer;
impl Instruction for SetDelayTimer {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.timers.delay = state.registers.read(op.x);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD DT, {}", op.x)
    }
}

struct SetSoundTimer;
impl Instruction for SetSoundTimer {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.timers.sound = state.registers.read(op.x);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD ST, {}", op.x)
    }
}

struct AddToIndex;
impl Instruction for AddToIndex {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = usize::from(state.registers.read(op.x));
        state.index = (state.index + value_x) & ADDRESS_MASK;
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("ADD I, {}", op.x)
    }
}

struct FontChar;
impl Instruction for FontChar {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        state.index = glyph_address(state.registers.read(op.x));
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD F, {}", op.x)
    }
}

struct BinaryCodedDecimal;
impl Instruction for BinaryCodedDecimal {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let value_x = state.registers.read(op.x);
        let bcd = [value_x / 100, (value_x / 10) % 10, value_x % 10];
        state.memory.write_range(state.index, &bcd, op.raw)
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD B, {}", op.x)
    }
}

struct Store;
impl Instruction for Store {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let values = state.registers.up_to(op.x);
        state.memory.write_range(state.index, values, op.raw)
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD [I], {}", op.x)
    }
}

struct Load;
impl Instruction for Load {
    fn execute(&self, op: &DecodedInstruction, state: &mut Chip8State) -> Result<()> {
        let bytes = state
            .memory
            .read_range(state.index, op.x.index() + 1, op.raw)?;
        state.registers.up_to_mut(op.x).copy_from_slice(bytes);
        Ok(())
    }

    fn mnemonic(&self, op: &DecodedInstruction) -> String {
        format!("LD {}, [I]", op.x)
    }
}
