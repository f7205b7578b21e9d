use bitvec::{BitArr, array::BitArray};

use crate::error::{Chip8Error, Result};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const SPRITE_WIDTH: usize = 8;

/// A pixel whose value was flipped by the most recent sprite draw.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PixelChange {
    pub row: usize,
    pub col: usize,
    pub is_on: bool,
}

pub struct Display {
    pixels: BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT),
    updated: Vec<PixelChange>,
}

impl Display {
    pub fn new() -> Self {
        Display {
            pixels: BitArray::ZERO,
            updated: Vec::new(),
        }
    }

    /// Turns every pixel off. The change list is emptied too, so a renderer
    /// has to repaint the whole grid after a clear.
    pub fn clear(&mut self) {
        self.pixels.fill(false);
        self.updated.clear();
    }

    pub fn pixel(&self, row: usize, col: usize) -> Result<bool> {
        if row >= DISPLAY_HEIGHT || col >= DISPLAY_WIDTH {
            return Err(Chip8Error::InvalidPixel { row, col });
        }
        Ok(self.is_lit(row, col))
    }

    fn is_lit(&self, row: usize, col: usize) -> bool {
        self.pixels[row * DISPLAY_WIDTH + col]
    }

    /// Pixels flipped by the last call to [`Display::draw_sprite`], in
    /// row-major sprite order. Empty after [`Display::clear`].
    pub fn updated_pixels(&self) -> &[PixelChange] {
        &self.updated
    }

    pub fn lit_pixels(&self) -> usize {
        self.pixels.count_ones()
    }

    /// XORs `sprite` onto the grid with its top-left corner at (`x`, `y`),
    /// wrapping around both edges. Returns true if any lit pixel was turned
    /// off.
    pub fn draw_sprite(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let mut collision = false;
        self.updated.clear();

        for (row, &byte) in sprite.iter().enumerate() {
            let pixel_y = (y + row) % DISPLAY_HEIGHT;
            for bit in 0..SPRITE_WIDTH {
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let pixel_x = (x + bit) % DISPLAY_WIDTH;

                let index = pixel_y * DISPLAY_WIDTH + pixel_x;
                let current_pixel = self.pixels[index];
                collision |= current_pixel;

                self.pixels.set(index, !current_pixel);
                self.updated.push(PixelChange {
                    row: pixel_y,
                    col: pixel_x,
                    is_on: !current_pixel,
                });
            }
        }
        collision
    }
}

impl std::fmt::Display for Display {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in 0..DISPLAY_HEIGHT {
            for col in 0..DISPLAY_WIDTH {
                f.write_str(if self.is_lit(row, col) { "█" } else { " " })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
