use crate::state::Address;

pub const FONT_ADDR: Address = 0x50;
pub const FONT_HEIGHT: usize = 5;
pub const GLYPH_COUNT: usize = 16;

/// Hex digit glyphs 0-F, one byte per row, MSB is the leftmost pixel.
pub const FONT_SPRITES: [[u8; FONT_HEIGHT]; GLYPH_COUNT] = [
    [0xF0, 0x90, 0x90, 0x90, 0xF0], // 0
    [0x20, 0x60, 0x20, 0x20, 0x70], // 1
    [0xF0, 0x10, 0xF0, 0x80, 0xF0], // 2
    [0xF0, 0x10, 0xF0, 0x10, 0xF0], // 3
    [0x90, 0x90, 0xF0, 0x10, 0x10], // 4
    [0xF0, 0x80, 0xF0, 0x10, 0xF0], // 5
    [0xF0, 0x80, 0xF0, 0x90, 0xF0], // 6
    [0xF0, 0x10, 0x20, 0x40, 0x40], // 7
    [0xF0, 0x90, 0xF0, 0x90, 0xF0], // 8
    [0xF0, 0x90, 0xF0, 0x10, 0xF0], // 9
    [0xF0, 0x90, 0xF0, 0x90, 0x90], // A
    [0xE0, 0x90, 0xE0, 0x90, 0xE0], // B
    [0xF0, 0x80, 0x80, 0x80, 0xF0], // C
    [0xE0, 0x90, 0x90, 0x90, 0xE0], // D
    [0xF0, 0x80, 0xF0, 0x80, 0xF0], // E
    [0xF0, 0x80, 0xF0, 0x80, 0x80], // F
];

/// Last address of the font region, inclusive.
pub const FONT_END_ADDR: Address = FONT_ADDR + FONT_HEIGHT * GLYPH_COUNT - 1;

/// Address of the glyph for the low nibble of `digit`.
pub fn glyph_address(digit: u8) -> Address {
    FONT_ADDR + FONT_HEIGHT * usize::from(digit & 0x0F)
}

pub fn font_bytes() -> impl Iterator<Item = u8> {
    FONT_SPRITES.iter().flatten().copied()
}
