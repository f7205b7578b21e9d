//! A CHIP-8 virtual machine.
//!
//! [`Chip8`] is the interpreter core. It runs one instruction per
//! [`Chip8::step`] and leaves real-time pacing, rendering and input to the
//! caller; [`emulator::Emulator`] is a terminal frontend built on top of it.

pub mod chip8;
pub mod clock;
pub mod config;
pub mod display;
pub mod emulator;
pub mod error;
pub mod font;
pub mod instruction;
pub mod keymap;
pub mod state;

pub use chip8::Chip8;
pub use error::{Chip8Error, Result};
