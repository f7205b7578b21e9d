use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{info, warn};
use ratatui::{
    Frame, Terminal,
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
};
use rdev::{EventType, Key as HostKey};

use crate::chip8::Chip8;
use crate::clock::Pacer;
use crate::config::Settings;
use crate::display::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use crate::keymap::{KEYPAD_LEGEND, map_key};
use crate::state::Key;

enum HostEvent {
    Key(Key, bool),
    Quit,
}

/// Forwards global key presses and releases to the scheduler thread, which
/// is the only writer of the keypad.
fn spawn_key_listener(tx: Sender<HostEvent>) {
    thread::spawn(move || {
        let result = rdev::listen(move |event| {
            let message = match event.event_type {
                EventType::KeyPress(HostKey::Escape) => Some(HostEvent::Quit),
                EventType::KeyPress(key) => map_key(key).map(|k| HostEvent::Key(k, true)),
                EventType::KeyRelease(key) => map_key(key).map(|k| HostEvent::Key(k, false)),
                _ => None,
            };
            if let Some(message) = message {
                // The receiver is gone once the emulator has quit.
                let _ = tx.send(message);
            }
        });
        if let Err(e) = result {
            warn!("Key listener stopped: {e:?}");
        }
    });
}

/// Keeps the terminal in raw mode for as long as it is alive. Dropping it
/// restores cooked mode, including on early returns and panics.
struct RawModeGuard;

impl RawModeGuard {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(RawModeGuard)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("Unable to restore terminal: {e}");
        }
    }
}

pub struct Emulator {
    chip8: Chip8,
    settings: Settings,
}

impl Emulator {
    pub fn new(settings: Settings) -> Self {
        let chip8 = match settings.seed {
            Some(seed) => Chip8::with_seed(seed),
            None => Chip8::new(),
        };
        Emulator { chip8, settings }
    }

    pub fn run(&mut self) -> anyhow::Result<()> {
        let rom_data = std::fs::read(&self.settings.rom)
            .with_context(|| format!("Unable to read ROM {}", self.settings.rom.display()))?;
        self.chip8.load_program(&rom_data)?;

        let rom_stem: String = self
            .settings
            .rom
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Unknown ROM".to_string());

        let (tx, rx) = mpsc::channel();
        spawn_key_listener(tx);

        let _raw_mode = RawModeGuard::enable()?;
        let backend = CrosstermBackend::new(std::io::stdout());
        let mut terminal = Terminal::new(backend)?;
        terminal.clear()?;

        info!("Running {rom_stem} at {} Hz", self.settings.clock_hz);
        let result = self.main_loop(&mut terminal, &rx, &rom_stem);
        info!("Stopped after {} cycles", self.chip8.cycle_count());

        terminal.clear()?;
        result
    }

    fn main_loop<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        rx: &Receiver<HostEvent>,
        rom_name: &str,
    ) -> anyhow::Result<()> {
        let frame_duration = Duration::from_secs_f64(1.0 / self.settings.frame_rate as f64);
        let batch_sleep = Duration::from_millis(self.settings.sleep_ms);
        let mut pacer = Pacer::new(self.settings.clock_hz);
        let mut last_batch = Instant::now();
        let mut last_frame: Option<Instant> = None;
        let mut dirty = true;

        loop {
            for host_event in rx.try_iter() {
                match host_event {
                    HostEvent::Quit => return Ok(()),
                    HostEvent::Key(key, pressed) => self.chip8.set_key(key.index(), pressed)?,
                }
            }

            // Consume crossterm events to prevent echoing; Esc and Ctrl-C
            // still quit if the global listener is unavailable.
            while event::poll(Duration::ZERO)? {
                if let Event::Key(key) = event::read()? {
                    let ctrl_c = key.code == KeyCode::Char('c')
                        && key.modifiers.contains(KeyModifiers::CONTROL);
                    if key.code == KeyCode::Esc || ctrl_c {
                        return Ok(());
                    }
                }
            }

            let now = Instant::now();
            let (cycles, ticks) = pacer.advance(now - last_batch);
            last_batch = now;

            for _ in 0..cycles {
                self.chip8.step()?;
                dirty |= self.chip8.is_drawn();
            }
            for _ in 0..ticks {
                self.chip8.tick_timers();
            }

            let frame_due = last_frame.is_none_or(|t| now - t >= frame_duration);
            if frame_due && (dirty || cycles > 0) {
                terminal.draw(|frame| draw(&self.chip8, frame, rom_name))?;
                last_frame = Some(now);
                dirty = false;
            }

            thread::sleep(batch_sleep);
        }
    }
}

fn draw(chip8: &Chip8, frame: &mut Frame, rom_name: &str) {
    let area = frame.area();

    // Exact size of the 64x32 display plus borders
    let game_width = (DISPLAY_WIDTH as u16) + 2;
    let game_height = (DISPLAY_HEIGHT as u16) + 2;

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(game_height),
            Constraint::Length(6),
            Constraint::Min(0),
        ])
        .split(area);

    let game_area = if chunks[0].width > game_width {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Min(0),
                Constraint::Length(game_width),
                Constraint::Min(0),
            ])
            .split(chunks[0])[1]
    } else {
        chunks[0]
    };

    let game_paragraph = Paragraph::new(chip8.display().to_string())
        .block(Block::default().borders(Borders::ALL).title(rom_name))
        .style(Style::default().fg(Color::White));
    frame.render_widget(game_paragraph, game_area);

    let bottom = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(chunks[1]);

    let status = Paragraph::new(status_text(chip8))
        .block(Block::default().borders(Borders::ALL).title("Machine"))
        .style(Style::default().fg(Color::Cyan));
    frame.render_widget(status, bottom[0]);

    let keypad = Paragraph::new(KEYPAD_LEGEND)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title("Keypad"))
        .style(Style::default().fg(Color::Yellow));
    frame.render_widget(keypad, bottom[1]);
}

fn status_text(chip8: &Chip8) -> String {
    let registers: Vec<String> = chip8
        .registers()
        .iter()
        .enumerate()
        .map(|(i, v)| format!("V{i:X}={v:02X}"))
        .collect();
    format!(
        "PC={:03X} I={:03X} SP={:02X} DT={:02X} ST={:02X} {}\n{}\n{}",
        chip8.pc(),
        chip8.i(),
        chip8.sp(),
        chip8.delay_timer(),
        chip8.sound_timer(),
        chip8.last_mnemonic().unwrap_or_default(),
        registers[..8].join(" "),
        registers[8..].join(" "),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::backend::TestBackend;

    #[test]
    fn renders_display_and_status() {
        // LD I, 0x050; DRW V0, V0, 5
        let mut chip8 = Chip8::with_seed(1);
        chip8.load_program(&[0xA0, 0x50, 0xD0, 0x05]).unwrap();
        chip8.step().unwrap();
        chip8.step().unwrap();

        let mut terminal = Terminal::new(TestBackend::new(100, 45)).unwrap();
        terminal.draw(|frame| draw(&chip8, frame, "test")).unwrap();

        let buffer = terminal.backend().buffer();
        let lit = buffer.content.iter().filter(|c| c.symbol() == "█").count();
        assert_eq!(lit, 14);
    }

    #[test]
    fn status_lists_registers() {
        let mut chip8 = Chip8::with_seed(1);
        chip8.load_program(&[0x6A, 0x2C]).unwrap();
        chip8.step().unwrap();

        let text = status_text(&chip8);
        assert!(text.starts_with("PC=202 I=000 SP=FF"));
        assert!(text.contains("LD VA, 0x2C"));
        assert!(text.contains("VA=2C"));
    }
}
