//! App: terminal init, frame loop, key handling.

use crate::GameConfig;
use crate::game::{Command, GameState, POINTS_PER_ROW};
use crate::input::{Action, key_to_action};
use crate::theme::Theme;
use crate::ui::{self, Effects};
use anyhow::Result;
use crossterm::event::{self, Event};
use ratatui::DefaultTerminal;
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Without release events, accelerate counts as held this long after the last
/// press or OS repeat. Longer than the usual key-repeat delay.
const ACCEL_HOLD: Duration = Duration::from_millis(650);
/// Frames the "+N" clear popup stays up.
const CLEAR_POPUP_FRAMES: u32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct App {
    theme: Theme,
    state: GameState,
    effects: Effects,
    frame_interval: Duration,
    /// Terminal reports key releases (keyboard enhancement enabled).
    release_events: bool,
    /// [`ACCEL_HOLD`] in frames at the configured rate.
    accel_hold_frames: u32,
    /// Frames left before an emulated accelerate release.
    accel_hold: Option<u32>,
    popup_frames: u32,
}

impl App {
    pub fn new(config: GameConfig, theme: Theme, no_animation: bool) -> Self {
        let state = GameState::new(&config, config.rng());
        Self {
            theme,
            state,
            effects: Effects {
                no_animation,
                ..Effects::default()
            },
            frame_interval: Duration::from_secs_f64(1.0 / config.fps),
            release_events: false,
            accel_hold_frames: hold_frames(ACCEL_HOLD, config.fps),
            accel_hold: None,
            popup_frames: 0,
        }
    }

    pub fn run(&mut self) -> Result<()> {
        use crossterm::{
            event::{KeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
            execute,
            terminal::{
                EnterAlternateScreen, disable_raw_mode, enable_raw_mode,
                supports_keyboard_enhancement,
            },
        };

        enable_raw_mode()?;
        let mut stdout = std::io::stdout();
        if let Err(err) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(err.into());
        }

        // Release events let accelerate follow the key exactly.
        self.release_events = supports_keyboard_enhancement().unwrap_or(false)
            && execute!(
                stdout,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )
            .is_ok();
        if !self.release_events {
            warn!("terminal does not report key releases; accelerate auto-releases");
        }

        let result = ratatui::DefaultTerminal::new(ratatui::backend::CrosstermBackend::new(stdout))
            .map_err(anyhow::Error::from)
            .and_then(|mut terminal| self.run_loop(&mut terminal));

        let restored =
            restore_terminal(&mut std::io::stdout(), self.release_events, disable_raw_mode);

        info!(score = self.state.score(), "quit");
        println!("Final score: {}", self.state.score());
        result?;
        restored?;
        Ok(())
    }

    fn run_loop(&mut self, terminal: &mut DefaultTerminal) -> Result<()> {
        loop {
            let frame_start = Instant::now();
            let snapshot = self.state.snapshot();
            terminal.draw(|f| ui::draw(f, &snapshot, &self.theme, &mut self.effects, frame_start))?;

            // Drain input until the frame boundary.
            let deadline = frame_start + self.frame_interval;
            loop {
                let timeout = deadline.saturating_duration_since(Instant::now());
                if !event::poll(timeout)? {
                    break;
                }
                if let Event::Key(key) = event::read()? {
                    if self.handle_action(key_to_action(key)) == Flow::Quit {
                        return Ok(());
                    }
                }
            }

            self.end_frame();
        }
    }

    fn handle_action(&mut self, action: Action) -> Flow {
        match action {
            Action::Quit => return Flow::Quit,
            Action::MoveLeft => self.state.push_command(Command::MoveLeft),
            Action::MoveRight => self.state.push_command(Command::MoveRight),
            Action::Rotate => self.state.push_command(Command::Rotate),
            Action::AccelerateOn => {
                self.state.set_accelerate(true);
                if !self.release_events {
                    self.accel_hold = Some(self.accel_hold_frames);
                }
            }
            Action::AccelerateOff => {
                self.state.set_accelerate(false);
                self.accel_hold = None;
            }
            Action::Restart => {
                if self.state.is_game_over() {
                    self.state.reset();
                    self.effects.reset();
                    self.popup_frames = 0;
                }
            }
            Action::None => {}
        }
        Flow::Continue
    }

    /// Emulated accelerate release, one simulation tick, popup countdown.
    fn end_frame(&mut self) {
        if let Some(frames) = self.accel_hold {
            if frames <= 1 {
                self.accel_hold = None;
                self.state.set_accelerate(false);
            } else {
                self.accel_hold = Some(frames - 1);
            }
        }

        if self.popup_frames > 0 {
            self.popup_frames -= 1;
            if self.popup_frames == 0 {
                self.effects.clear_popup = None;
            }
        }

        if let Some(landing) = self.state.tick() {
            if landing.rows_cleared > 0 {
                self.effects.clear_popup = Some(landing.rows_cleared as u32 * POINTS_PER_ROW);
                self.popup_frames = CLEAR_POPUP_FRAMES;
            }
            if landing.game_over {
                debug!("starting game-over fade");
            }
        }
    }
}

/// Frames covering `hold` at `fps`, at least one.
fn hold_frames(hold: Duration, fps: f64) -> u32 {
    (hold.as_millis() as f64 * fps / 1000.0).ceil().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Leaves the alternate screen and raw mode. Every step runs even if an earlier
/// one fails; the first error is returned.
fn restore_terminal<W: Write>(
    out: &mut W,
    release_events: bool,
    disable_raw_mode: impl FnOnce() -> io::Result<()>,
) -> io::Result<()> {
    use crossterm::event::PopKeyboardEnhancementFlags;
    use crossterm::execute;
    use crossterm::terminal::LeaveAlternateScreen;

    let pop = if release_events {
        execute!(out, PopKeyboardEnhancementFlags)
    } else {
        Ok(())
    };
    let leave = execute!(out, LeaveAlternateScreen);
    let raw = disable_raw_mode();
    pop.and(leave).and(raw)
}
