//! Sirtet: upside-down falling-block puzzle in the terminal. Pieces rise from the floor.

mod app;
mod game;
mod input;
mod theme;
mod ui;

use anyhow::{Context, Result};
use app::App;
use clap::{Parser, ValueEnum};
use game::Rgb;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use theme::Theme;
use thiserror::Error;

/// Smallest grid side: every orientation of the I piece has to fit.
const MIN_GRID_SIDE: usize = 4;
/// Largest grid side; keeps the drawn layout inside u16 terminal coordinates.
const MAX_GRID_SIDE: usize = 100;

/// Validated options the game runs with.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub width: usize,
    pub height: usize,
    /// Ticks between rises while the accelerate key is up.
    pub slow_interval: u32,
    /// Ticks between rises while the accelerate key is held.
    pub fast_interval: u32,
    pub fps: f64,
    pub seed: Option<u64>,
    pub palette: [Rgb; 7],
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("grid {width}x{height} is too small (minimum {}x{})", MIN_GRID_SIDE, MIN_GRID_SIDE)]
    GridTooSmall { width: usize, height: usize },
    #[error("grid {width}x{height} is too large (maximum {}x{})", MAX_GRID_SIDE, MAX_GRID_SIDE)]
    GridTooLarge { width: usize, height: usize },
    #[error("tick intervals must be at least 1")]
    ZeroInterval,
    #[error("fast interval {fast} is slower than slow interval {slow}")]
    FastSlowerThanSlow { fast: u32, slow: u32 },
    #[error("frame rate {0} is out of range (0, 1000]")]
    FrameRate(f64),
}

impl GameConfig {
    pub fn from_args(args: &Args, palette: [Rgb; 7]) -> Result<Self, ConfigError> {
        if args.width < MIN_GRID_SIDE || args.height < MIN_GRID_SIDE {
            return Err(ConfigError::GridTooSmall {
                width: args.width,
                height: args.height,
            });
        }
        if args.width > MAX_GRID_SIDE || args.height > MAX_GRID_SIDE {
            return Err(ConfigError::GridTooLarge {
                width: args.width,
                height: args.height,
            });
        }
        if args.slow_interval == 0 || args.fast_interval == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        if args.fast_interval > args.slow_interval {
            return Err(ConfigError::FastSlowerThanSlow {
                fast: args.fast_interval,
                slow: args.slow_interval,
            });
        }
        if !(args.fps > 0.0 && args.fps <= 1000.0) {
            return Err(ConfigError::FrameRate(args.fps));
        }
        Ok(Self {
            width: args.width,
            height: args.height,
            slow_interval: args.slow_interval,
            fast_interval: args.fast_interval,
            fps: args.fps,
            seed: args.seed,
            palette,
        })
    }

    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if let Some(path) = args.log_file.as_deref() {
        init_logging(path, args.log_level)?;
    }
    let theme = load_theme(&args)?;
    let config = GameConfig::from_args(&args, theme.blocks)?;
    let mut app = App::new(config, theme, args.no_animation);
    app.run()?;
    Ok(())
}

fn load_theme(args: &Args) -> Result<Theme> {
    let path = args.theme.as_deref();
    Theme::load(path, args.palette).with_context(|| match path {
        Some(p) => format!("loading theme {}", p.display()),
        None => "loading theme".to_string(),
    })
}

/// The TUI owns stdout, so events only go to a file.
fn init_logging(path: &Path, level: LogLevel) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("creating log file {}", path.display()))?;
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(level))
        .with_target(false)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

/// Upside-down falling-block puzzle in the terminal.
#[derive(Debug, Parser)]
#[command(
    name = "sirtet",
    version,
    about = "Upside-down falling-block puzzle in the terminal. \
        Pieces rise from the floor; fill rows to clear them.",
    long_about = "Sirtet is Tetris turned upside down: pieces spawn at the bottom of the well \
        and rise until they hit the ceiling or the stack. Complete rows are cleared for \
        100 points each. The game ends when a new piece has no room to spawn.\n\n\
        CONTROLS:\n\
        \x20 A / Left    Move left     D / Right   Move right\n\
        \x20 S / Down    Rotate        W / Up      Rise faster (hold)\n\
        \x20 R           Restart after game over\n\
        \x20 Q / Esc     Quit"
)]
pub struct Args {
    /// Grid width in cells.
    #[arg(long, default_value = "10", value_name = "COLS")]
    pub width: usize,

    /// Grid height in cells.
    #[arg(long, default_value = "20", value_name = "ROWS")]
    pub height: usize,

    /// Frames between rises at normal speed.
    #[arg(long, default_value = "30", value_name = "TICKS")]
    pub slow_interval: u32,

    /// Frames between rises while W / Up is held.
    #[arg(long, default_value = "5", value_name = "TICKS")]
    pub fast_interval: u32,

    /// Frames (simulation ticks) per second.
    #[arg(long, default_value = "60.0", value_name = "RATE")]
    pub fps: f64,

    /// Seed for the piece generator; same seed and same keys give the same game.
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    /// Path to theme file (btop-style theme[key]=\"value\").
    #[arg(short, long, value_name = "FILE")]
    pub theme: Option<PathBuf>,

    /// Block palette: classic, high-contrast, or colorblind.
    #[arg(long, default_value = "classic")]
    pub palette: Palette,

    /// Disable the game-over fade.
    #[arg(long)]
    pub no_animation: bool,

    /// Write log events to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Log verbosity when --log-file is set.
    #[arg(long, default_value = "info")]
    pub log_level: LogLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Palette {
    #[default]
    Classic,

    #[value(alias = "highcontrast", alias = "contrast")]
    HighContrast,

    #[value(alias = "colourblind")]
    Colorblind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Self::ERROR,
            LogLevel::Warn => Self::WARN,
            LogLevel::Info => Self::INFO,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Trace => Self::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use game::CLASSIC_PALETTE;

    fn config_from(argv: &[&str]) -> Result<GameConfig, ConfigError> {
        let args = Args::try_parse_from(argv).unwrap();
        GameConfig::from_args(&args, CLASSIC_PALETTE)
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&["sirtet"]).unwrap();
        assert_eq!((config.width, config.height), (10, 20));
        assert_eq!((config.slow_interval, config.fast_interval), (30, 5));
        assert!((config.fps - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn test_custom_grid_and_seed() {
        let config =
            config_from(&["sirtet", "--width", "6", "--height", "12", "--seed", "7"]).unwrap();
        assert_eq!((config.width, config.height), (6, 12));
        assert_eq!(config.seed, Some(7));
    }

    #[test]
    fn test_rejects_small_grid() {
        assert_eq!(
            config_from(&["sirtet", "--width", "3"]).unwrap_err(),
            ConfigError::GridTooSmall {
                width: 3,
                height: 20
            }
        );
    }

    #[test]
    fn test_rejects_large_grid() {
        assert_eq!(
            config_from(&["sirtet", "--width", "40000"]).unwrap_err(),
            ConfigError::GridTooLarge {
                width: 40000,
                height: 20
            }
        );
        assert!(matches!(
            config_from(&["sirtet", "--height", "101"]),
            Err(ConfigError::GridTooLarge { .. })
        ));
        let config = config_from(&["sirtet", "--width", "100", "--height", "100"]).unwrap();
        assert_eq!((config.width, config.height), (100, 100));
    }

    #[test]
    fn test_theme_error_names_the_path() {
        let args =
            Args::try_parse_from(["sirtet", "--theme", "/nonexistent/sirtet.theme"]).unwrap();
        let err = load_theme(&args).unwrap_err();
        let msg = err.to_string();
        assert_eq!(msg, "loading theme /nonexistent/sirtet.theme");
        assert!(!msg.contains("Some("));
    }

    #[test]
    fn test_rejects_bad_intervals() {
        assert_eq!(
            config_from(&["sirtet", "--fast-interval", "0"]).unwrap_err(),
            ConfigError::ZeroInterval
        );
        assert_eq!(
            config_from(&["sirtet", "--slow-interval", "4"]).unwrap_err(),
            ConfigError::FastSlowerThanSlow { fast: 5, slow: 4 }
        );
    }

    #[test]
    fn test_rejects_bad_fps() {
        assert!(matches!(
            config_from(&["sirtet", "--fps", "0"]),
            Err(ConfigError::FrameRate(_))
        ));
    }

    #[test]
    fn test_seeded_rng_is_reproducible() {
        use rand::Rng;
        let config = config_from(&["sirtet", "--seed", "123"]).unwrap();
        let (mut a, mut b) = (config.rng(), config.rng());
        let xs: Vec<u32> = (0..8).map(|_| a.gen_range(0..1000)).collect();
        let ys: Vec<u32> = (0..8).map(|_| b.gen_range(0..1000)).collect();
        assert_eq!(xs, ys);
    }

    #[test]
    fn test_palette_aliases() {
        let args = Args::try_parse_from(["sirtet", "--palette", "contrast"]).unwrap();
        assert_eq!(args.palette, Palette::HighContrast);
        let args = Args::try_parse_from(["sirtet", "--palette", "colourblind"]).unwrap();
        assert_eq!(args.palette, Palette::Colorblind);
    }
}
