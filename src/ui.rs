//! Layout and drawing: next-piece column, board, sidebar, game-over fade.

use crate::game::{Grid, Piece, Snapshot};
use crate::theme::{Theme, to_color};
use ratatui::Frame;
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Widget};
use std::time::Instant;
use tachyonfx::{Duration as TfxDuration, Effect, EffectRenderer, Interpolation, fx};

/// Each grid cell is two terminal columns wide so blocks look square.
const CELL_WIDTH: u16 = 2;
const BLOCK: &str = "██";

/// Next-piece column: four cells wide plus border.
const PREVIEW_WIDTH: u16 = 4 * CELL_WIDTH + 2;
/// Rows per preview slot (two shape rows plus spacing).
const PREVIEW_SLOT_ROWS: u16 = 3;
const SIDEBAR_WIDTH: u16 = 24;

/// Duration of the game-over fade in ms.
const GAME_OVER_FADE_MS: u32 = 800;

const CONTROLS: [(&str, &str); 5] = [
    ("W / ↑", "Rise faster"),
    ("A / ←", "Move left"),
    ("D / →", "Move right"),
    ("S / ↓", "Rotate"),
    ("Q", "Quit"),
];

/// Frame-to-frame UI state the app owns.
#[derive(Default)]
pub struct Effects {
    /// Fade applied over the board once the game is over.
    pub game_over: Option<Effect>,
    /// Last time the effect was processed (for delta).
    pub process_time: Option<Instant>,
    /// Points from the latest clear, shown for a short while.
    pub clear_popup: Option<u32>,
    /// Skip the fade and dim the board immediately.
    pub no_animation: bool,
}

impl Effects {
    pub fn reset(&mut self) {
        self.game_over = None;
        self.process_time = None;
        self.clear_popup = None;
    }
}

/// Board size in terminal cells, border included.
fn board_outer_size(grid: &Grid) -> (u16, u16) {
    (
        grid.width() as u16 * CELL_WIDTH + 2,
        grid.height() as u16 + 2,
    )
}

/// Smallest terminal (cols, rows) that fits the whole layout.
pub fn required_size(grid: &Grid) -> (u16, u16) {
    let (bw, bh) = board_outer_size(grid);
    (PREVIEW_WIDTH + bw + SIDEBAR_WIDTH, bh.max(CONTROLS.len() as u16 + 12))
}

/// Draw one frame from a snapshot.
pub fn draw(
    frame: &mut Frame,
    snapshot: &Snapshot<'_>,
    theme: &Theme,
    effects: &mut Effects,
    now: Instant,
) {
    let area = frame.area();
    Block::default()
        .style(Style::default().bg(theme.bg))
        .render(area, frame.buffer_mut());

    let (need_w, need_h) = required_size(snapshot.grid);
    if area.width < need_w || area.height < need_h {
        draw_too_small(frame, theme, area, need_w, need_h);
        return;
    }

    let (bw, bh) = board_outer_size(snapshot.grid);
    let total_w = PREVIEW_WIDTH + bw + SIDEBAR_WIDTH;

    // Center horizontally
    let horiz = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(total_w),
            Constraint::Fill(1),
        ])
        .split(area);
    // Center vertically
    let vert = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(need_h),
            Constraint::Fill(1),
        ])
        .split(horiz[1]);
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(PREVIEW_WIDTH),
            Constraint::Length(bw),
            Constraint::Length(SIDEBAR_WIDTH),
        ])
        .split(vert[1]);

    // Board keeps its own height so the floor sits right under the last grid row.
    let board_area = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(bh), Constraint::Fill(1)])
        .split(columns[1])[0];

    draw_preview(frame.buffer_mut(), snapshot, theme, columns[0]);

    let dimmed = snapshot.game_over
        && (effects.no_animation || effects.game_over.as_ref().is_some_and(Effect::done));
    let board_rect = draw_board(frame.buffer_mut(), snapshot, theme, board_area, dimmed);
    if snapshot.game_over && !dimmed {
        apply_game_over_effect(frame, theme, board_rect, effects, now);
    }

    draw_sidebar(frame.buffer_mut(), snapshot, theme, columns[2], effects.clear_popup);
}

fn draw_too_small(frame: &mut Frame, theme: &Theme, area: Rect, need_w: u16, need_h: u16) {
    let lines = vec![
        Line::from(Span::styled(
            " Terminal too small ",
            Style::default().fg(Color::Black).bg(Color::Yellow),
        )),
        Line::from(Span::styled(
            format!(" need {}×{}, have {}×{} ", need_w, need_h, area.width, area.height),
            Style::default().fg(theme.main_fg),
        )),
    ];
    let y = area.y + area.height.saturating_sub(2) / 2;
    let rect = Rect {
        x: area.x,
        y,
        width: area.width,
        height: area.height.min(2),
    };
    Paragraph::new(lines)
        .alignment(Alignment::Center)
        .render(rect, frame.buffer_mut());
}

/// Bordered board with settled blocks and, while running, the active piece.
/// Returns the inner rect (cells only).
fn draw_board(
    buf: &mut Buffer,
    snapshot: &Snapshot<'_>,
    theme: &Theme,
    area: Rect,
    dimmed: bool,
) -> Rect {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg));
    let inner = block.inner(area);
    block.render(area, buf);

    for (y, row) in snapshot.grid.rows().enumerate() {
        for (x, cell) in row.iter().enumerate() {
            if let Some(rgb) = cell {
                let color = if dimmed { theme.inactive_fg } else { to_color(*rgb) };
                put_block(buf, inner, x as i32, y as i32, color, theme.bg);
            }
        }
    }

    if !snapshot.game_over {
        draw_piece(buf, inner, snapshot.active, theme.bg);
    }
    inner
}

fn draw_piece(buf: &mut Buffer, inner: Rect, piece: &Piece, bg: Color) {
    let color = to_color(piece.color);
    for (x, y) in piece.cells() {
        put_block(buf, inner, x, y, color, bg);
    }
}

/// Paints grid cell (x, y) of `inner`; anything outside is skipped.
fn put_block(buf: &mut Buffer, inner: Rect, x: i32, y: i32, color: Color, bg: Color) {
    if x < 0 || y < 0 {
        return;
    }
    let rx = inner.x + x as u16 * CELL_WIDTH;
    let ry = inner.y + y as u16;
    if rx + CELL_WIDTH <= inner.x + inner.width && ry < inner.y + inner.height {
        buf.set_string(rx, ry, BLOCK, Style::default().fg(color).bg(bg));
    }
}

/// Create or update the game-over fade (TachyonFX: board fades to the inactive colour).
fn apply_game_over_effect(
    frame: &mut Frame,
    theme: &Theme,
    board_rect: Rect,
    effects: &mut Effects,
    now: Instant,
) {
    let delta = effects
        .process_time
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(std::time::Duration::ZERO);
    let delta_ms = delta.as_millis().min(u32::MAX as u128) as u32;
    effects.process_time = Some(now);

    let effect = effects.game_over.get_or_insert_with(|| {
        fx::fade_to(
            theme.inactive_fg,
            theme.bg,
            (GAME_OVER_FADE_MS, Interpolation::Linear),
        )
        .with_area(board_rect)
    });
    frame.render_effect(effect, board_rect, TfxDuration::from_millis(delta_ms));
}

/// Next pieces, head of the queue on top.
fn draw_preview(buf: &mut Buffer, snapshot: &Snapshot<'_>, theme: &Theme, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
        .title(Span::styled("Next", Style::default().fg(theme.title)));
    let inner = block.inner(area);
    block.render(area, buf);

    for (i, piece) in snapshot.upcoming.iter().enumerate() {
        let slot_y = inner.y + 1 + i as u16 * PREVIEW_SLOT_ROWS;
        let shape = piece.shape;
        if slot_y + shape.height() as u16 > inner.y + inner.height {
            break;
        }
        let shape_w = shape.width() as u16 * CELL_WIDTH;
        let slot = Rect {
            x: inner.x + inner.width.saturating_sub(shape_w) / 2,
            y: slot_y,
            width: shape_w,
            height: shape.height() as u16,
        };
        let at_origin = Piece { x: 0, y: 0, ..*piece };
        draw_piece(buf, slot, &at_origin, theme.bg);
    }
}

fn draw_sidebar(
    buf: &mut Buffer,
    snapshot: &Snapshot<'_>,
    theme: &Theme,
    area: Rect,
    clear_popup: Option<u32>,
) {
    let title_style = Style::default().fg(theme.title).add_modifier(Modifier::BOLD);
    let fg_style = Style::default().fg(theme.main_fg);
    let dim_style = Style::default().fg(theme.div_line);

    let stat = |label: &'static str, value: String| {
        Line::from(vec![Span::styled(label, title_style), Span::styled(value, fg_style)])
    };
    let speed = if snapshot.accelerated { "fast" } else { "normal" };
    let mut lines = vec![
        stat("Score: ", snapshot.score.to_string()),
        stat("Lines: ", snapshot.lines_cleared.to_string()),
        stat("Pieces: ", snapshot.pieces_placed.to_string()),
        stat("Speed: ", speed.to_string()),
    ];
    lines.push(match clear_popup {
        Some(points) => Line::from(Span::styled(
            format!("+{points}"),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        )),
        None => Line::from(""),
    });

    if snapshot.game_over {
        lines.push(Line::from(Span::styled(
            " GAME OVER ",
            Style::default().fg(Color::White).bg(Color::Red).add_modifier(Modifier::BOLD),
        )));
        lines.push(Line::from(Span::styled("R: restart  Q: quit", fg_style)));
    } else {
        lines.push(Line::from(""));
        lines.push(Line::from(""));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("Controls:", title_style)));
    for (keys, what) in CONTROLS {
        lines.push(Line::from(vec![
            Span::styled(format!("{keys:<6}"), fg_style),
            Span::styled(what, dim_style),
        ]));
    }

    Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(theme.div_line).bg(theme.bg))
                .title(Span::styled(" Sirtet ", title_style)),
        )
        .style(Style::default().bg(theme.bg))
        .render(area, buf);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{CLASSIC_PALETTE, GameState, Rgb};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn state(width: usize, height: usize) -> GameState {
        let config = crate::GameConfig {
            width,
            height,
            slow_interval: 30,
            fast_interval: 5,
            fps: 60.0,
            seed: Some(1),
            palette: CLASSIC_PALETTE,
        };
        GameState::new(&config, StdRng::seed_from_u64(1))
    }

    fn render(game: &GameState, cols: u16, rows: u16) -> Buffer {
        let mut terminal = Terminal::new(TestBackend::new(cols, rows)).unwrap();
        let theme = Theme::classic();
        let mut effects = Effects {
            no_animation: true,
            ..Effects::default()
        };
        let snapshot = game.snapshot();
        terminal
            .draw(|f| draw(f, &snapshot, &theme, &mut effects, Instant::now()))
            .unwrap();
        terminal.backend().buffer().clone()
    }

    fn text(buf: &Buffer) -> String {
        let area = buf.area;
        let mut s = String::new();
        for y in area.y..area.y + area.height {
            for x in area.x..area.x + area.width {
                s.push_str(buf[(x, y)].symbol());
            }
            s.push('\n');
        }
        s
    }

    #[test]
    fn test_required_size_default_grid() {
        let grid = Grid::new(10, 20);
        assert_eq!(required_size(&grid), (10 + 22 + 24, 22));
    }

    #[test]
    fn test_too_small_message() {
        let game = state(10, 20);
        let out = text(&render(&game, 30, 10));
        assert!(out.contains("Terminal too small"));
    }

    #[test]
    fn test_renders_sidebar_and_active_piece() {
        let game = state(10, 20);
        let (w, h) = required_size(game.snapshot().grid);
        let buf = render(&game, w, h);
        let out = text(&buf);
        assert!(out.contains("Score: 0"));
        assert!(out.contains("Next"));
        assert!(!out.contains("GAME OVER"));

        // Active piece sits on the bottom row of the board.
        let active = *game.snapshot().active;
        let color = to_color(active.color);
        let bottom = (active.y + active.shape.height() as i32 - 1) as u16;
        let board_x = PREVIEW_WIDTH + 1;
        let row_y = 1 + bottom;
        let painted = (0..game.snapshot().grid.width() as u16)
            .any(|x| buf[(board_x + x * CELL_WIDTH, row_y)].fg == color);
        assert!(painted);
    }

    #[test]
    fn test_short_grid_floor_under_last_row() {
        let game = state(10, 6);
        let (w, h) = required_size(game.snapshot().grid);
        assert!(h > 8);
        let buf = render(&game, w, h);

        // Border on row 0, grid rows 1..=6, floor on row 7.
        assert_eq!(buf[(PREVIEW_WIDTH, 7)].symbol(), "└");
        assert_eq!(buf[(PREVIEW_WIDTH + 1, 7)].symbol(), "─");
        assert_eq!(buf[(PREVIEW_WIDTH, 8)].symbol(), " ");

        // The active piece spawns resting on the floor.
        let active = *game.snapshot().active;
        let bottom = (active.y + active.shape.height() as i32 - 1) as u16;
        assert_eq!(bottom, 5);
        let color = to_color(active.color);
        let board_x = PREVIEW_WIDTH + 1;
        let painted = (0..10u16).any(|x| buf[(board_x + x * CELL_WIDTH, 6)].fg == color);
        assert!(painted);
    }

    #[test]
    fn test_game_over_dims_board_and_hides_piece() {
        let mut game = state(4, 4);
        game.set_accelerate(true);
        let mut ticks = 0;
        while !game.is_game_over() && ticks < 100_000 {
            game.tick();
            ticks += 1;
        }
        assert!(game.is_game_over());

        let (w, h) = required_size(game.snapshot().grid);
        let buf = render(&game, w, h);
        assert!(text(&buf).contains("GAME OVER"));

        // Every block on the board is a settled one drawn in the inactive colour.
        let theme = Theme::classic();
        let board_x = PREVIEW_WIDTH + 1;
        let mut blocks = 0;
        for y in 1..=4u16 {
            for x in board_x..board_x + 4 * CELL_WIDTH {
                let cell = &buf[(x, y)];
                if cell.symbol() == "█" {
                    assert_eq!(cell.fg, theme.inactive_fg);
                    blocks += 1;
                }
            }
        }
        assert!(blocks > 0);
    }

    #[test]
    fn test_to_color() {
        assert_eq!(to_color(Rgb(1, 2, 3)), Color::Rgb(1, 2, 3));
    }
}
