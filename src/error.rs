use thiserror::Error;

pub type Result<T> = std::result::Result<T, Chip8Error>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Chip8Error {
    #[error("Unsupported opcode: {opcode:#06X}")]
    UnsupportedOpcode { opcode: u16 },

    #[error("Opcode {opcode:#06X} accesses {start:#05X}..={end:#05X}, outside of valid memory")]
    MemoryOutOfRange { opcode: u16, start: usize, end: usize },

    #[error("Stack overflow: call depth would exceed {depth}")]
    StackOverflow { depth: usize },

    #[error("Stack underflow: no return address available")]
    StackUnderflow,

    #[error("Invalid register index: {0:#X}, valid range is [0x0, 0xF]")]
    InvalidRegister(usize),

    #[error("Invalid key index: {0:#X}, valid range is [0x0, 0xF]")]
    InvalidKey(usize),

    #[error("Invalid pixel ({row}, {col}), display is 32 rows by 64 columns")]
    InvalidPixel { row: usize, col: usize },

    #[error("Invalid address range {start:#05X}..={end:#05X}")]
    InvalidAddressRange { start: usize, end: usize },

    #[error("ROM too large to fit in memory: {size} bytes, max is {max} bytes")]
    RomTooLarge { size: usize, max: usize },
}
