//! Game state: grid, pieces, piece queue, rotation, line clear and the rising clock.
//!
//! Nothing in here knows about the terminal. The app feeds [`Command`]s in and
//! reads a [`Snapshot`] back out once per frame.

use rand::Rng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use tracing::{debug, info};

/// Number of upcoming pieces kept in the queue.
pub const QUEUE_LEN: usize = 3;

/// Points per cleared row.
pub const POINTS_PER_ROW: u32 = 100;

/// Largest side of any shape in any orientation.
const MAX_SHAPE_SIDE: usize = 4;

/// Opaque block colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

/// Block colours of the classic game: red, green, blue, yellow, magenta, cyan, purple.
pub const CLASSIC_PALETTE: [Rgb; 7] = [
    Rgb(255, 0, 0),
    Rgb(0, 255, 0),
    Rgb(0, 0, 255),
    Rgb(255, 255, 0),
    Rgb(255, 0, 255),
    Rgb(0, 255, 255),
    Rgb(128, 0, 128),
];

/// Shape kinds (I, O, T, L, J, S, Z).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    I,
    O,
    T,
    L,
    J,
    S,
    Z,
}

impl ShapeKind {
    pub const ALL: [Self; 7] = [Self::I, Self::O, Self::T, Self::L, Self::J, Self::S, Self::Z];

    /// Spawn orientation, rows top to bottom.
    fn layout(self) -> &'static [&'static [u8]] {
        match self {
            Self::I => &[&[1, 1, 1, 1]],
            Self::O => &[&[1, 1], &[1, 1]],
            Self::T => &[&[1, 1, 1], &[0, 1, 0]],
            Self::L => &[&[1, 1, 1], &[1, 0, 0]],
            Self::J => &[&[1, 1, 1], &[0, 0, 1]],
            Self::S => &[&[1, 1, 0], &[0, 1, 1]],
            Self::Z => &[&[0, 1, 1], &[1, 1, 0]],
        }
    }
}

/// Boolean occupancy matrix of at most 4x4 cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    width: usize,
    height: usize,
    filled: [[bool; MAX_SHAPE_SIDE]; MAX_SHAPE_SIDE],
}

impl Shape {
    pub fn of(kind: ShapeKind) -> Self {
        let rows = kind.layout();
        let mut filled = [[false; MAX_SHAPE_SIDE]; MAX_SHAPE_SIDE];
        for (r, row) in rows.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                filled[r][c] = v != 0;
            }
        }
        Self {
            width: rows[0].len(),
            height: rows.len(),
            filled,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Occupied cells as (row, col).
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.height)
            .flat_map(move |r| (0..self.width).map(move |c| (r, c)))
            .filter(move |&(r, c)| self.filled[r][c])
    }

    /// Quarter turn clockwise: `new[i][j] = old[h-1-j][i]`, width and height swap.
    pub fn rotated(&self) -> Self {
        let mut filled = [[false; MAX_SHAPE_SIDE]; MAX_SHAPE_SIDE];
        for (i, row) in filled.iter_mut().enumerate().take(self.width) {
            for (j, cell) in row.iter_mut().enumerate().take(self.height) {
                *cell = self.filled[self.height - 1 - j][i];
            }
        }
        Self {
            width: self.height,
            height: self.width,
            filled,
        }
    }
}

/// A shape placed on the grid. (x, y) is the grid position of the shape's top-left cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Piece {
    pub shape: Shape,
    pub x: i32,
    pub y: i32,
    pub color: Rgb,
}

impl Piece {
    /// Piece at its spawn point: centred horizontally, bottom edge on the floor.
    pub fn spawn(shape: Shape, color: Rgb, grid_width: usize, grid_height: usize) -> Self {
        Self {
            shape,
            x: (grid_width / 2) as i32 - (shape.width() / 2) as i32,
            y: grid_height as i32 - shape.height() as i32,
            color,
        }
    }

    /// Absolute (x, y) of every occupied cell.
    pub fn cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.shape
            .cells()
            .map(move |(r, c)| (self.x + c as i32, self.y + r as i32))
    }
}

/// Single grid cell.
pub type Cell = Option<Rgb>;

/// Settled blocks. rows[0] is the top row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    rows: VecDeque<Vec<Cell>>,
}

impl Grid {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            rows: (0..height).map(|_| vec![None; width]).collect(),
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// None when out of bounds.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if let Some(slot) = self.rows.get_mut(y).and_then(|row| row.get_mut(x)) {
            *slot = cell;
        }
    }

    pub fn rows(&self) -> impl Iterator<Item = &[Cell]> {
        self.rows.iter().map(Vec::as_slice)
    }

    /// True if every occupied cell of `shape` at (x, y) is inside the grid and empty.
    pub fn is_valid_placement(&self, shape: &Shape, x: i32, y: i32) -> bool {
        shape.cells().all(|(r, c)| {
            let gx = x + c as i32;
            let gy = y + r as i32;
            gx >= 0
                && gy >= 0
                && matches!(self.get(gx as usize, gy as usize), Some(None))
        })
    }

    /// Writes the piece's colour into its cells. The placement must already be valid.
    pub fn merge(&mut self, piece: &Piece) {
        debug_assert!(
            self.is_valid_placement(&piece.shape, piece.x, piece.y),
            "merge on invalid placement at ({}, {})",
            piece.x,
            piece.y
        );
        for (x, y) in piece.cells() {
            self.set(x as usize, y as usize, Some(piece.color));
        }
    }

    /// Removes every full row and pushes an empty row on top for each one.
    /// Returns how many rows were removed.
    pub fn clear_full_rows(&mut self) -> usize {
        let full: Vec<usize> = self
            .rows
            .iter()
            .enumerate()
            .filter(|(_, row)| row.iter().all(Option::is_some))
            .map(|(y, _)| y)
            .collect();
        // Bottom-up so the remaining indices stay valid.
        for &y in full.iter().rev() {
            self.rows.remove(y);
        }
        for _ in 0..full.len() {
            self.rows.push_front(vec![None; self.width]);
        }
        full.len()
    }
}

/// Upcoming pieces; always holds [`QUEUE_LEN`] of them.
#[derive(Debug, Clone)]
pub struct PieceQueue {
    pieces: VecDeque<Piece>,
    rng: StdRng,
    palette: [Rgb; 7],
    grid_width: usize,
    grid_height: usize,
}

impl PieceQueue {
    pub fn new(rng: StdRng, palette: [Rgb; 7], grid_width: usize, grid_height: usize) -> Self {
        let mut queue = Self {
            pieces: VecDeque::with_capacity(QUEUE_LEN + 1),
            rng,
            palette,
            grid_width,
            grid_height,
        };
        queue.refill();
        queue
    }

    fn refill(&mut self) {
        while self.pieces.len() < QUEUE_LEN {
            let piece = self.generate();
            self.pieces.push_back(piece);
        }
    }

    /// Random shape and colour at the spawn point.
    pub fn generate(&mut self) -> Piece {
        let kind = ShapeKind::ALL[self.rng.gen_range(0..ShapeKind::ALL.len())];
        let color = self.palette[self.rng.gen_range(0..self.palette.len())];
        Piece::spawn(Shape::of(kind), color, self.grid_width, self.grid_height)
    }

    pub fn dequeue_and_refill(&mut self) -> Piece {
        let next = self.pieces.pop_front();
        let fresh = self.generate();
        self.pieces.push_back(fresh);
        match next {
            Some(piece) => piece,
            // Unreachable while the length invariant holds; fall back to a new piece.
            None => {
                self.refill();
                self.dequeue_and_refill()
            }
        }
    }

    /// Drops the queued pieces and deals three new ones from the same RNG stream.
    pub fn reset(&mut self) {
        self.pieces.clear();
        self.refill();
    }

    pub fn upcoming(&self) -> &VecDeque<Piece> {
        &self.pieces
    }
}

/// Queued player command, applied at the start of the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    MoveLeft,
    MoveRight,
    Rotate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Running,
    GameOver,
}

/// Rising cadence in ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Intervals {
    pub slow: u32,
    pub fast: u32,
}

/// What happened when the active piece could not rise any further.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Landing {
    pub rows_cleared: usize,
    pub game_over: bool,
}

/// Read-only view handed to the renderer every frame.
#[derive(Debug, Clone, Copy)]
pub struct Snapshot<'a> {
    pub grid: &'a Grid,
    pub active: &'a Piece,
    pub upcoming: &'a VecDeque<Piece>,
    pub score: u32,
    pub lines_cleared: u32,
    pub pieces_placed: u32,
    pub accelerated: bool,
    pub game_over: bool,
}

/// Game state: grid, active piece, queue, score and the tick clock.
#[derive(Debug)]
pub struct GameState {
    grid: Grid,
    active: Piece,
    queue: PieceQueue,
    pending: VecDeque<Command>,
    intervals: Intervals,
    /// Current tick interval; `intervals.fast` while accelerating.
    speed: u32,
    accelerating: bool,
    counter: u32,
    score: u32,
    lines_cleared: u32,
    pieces_placed: u32,
    status: Status,
}

impl GameState {
    pub fn new(config: &crate::GameConfig, rng: StdRng) -> Self {
        let intervals = Intervals {
            slow: config.slow_interval,
            fast: config.fast_interval,
        };
        let mut queue = PieceQueue::new(rng, config.palette, config.width, config.height);
        let active = queue.dequeue_and_refill();
        info!(
            width = config.width,
            height = config.height,
            seed = ?config.seed,
            "new game"
        );
        Self {
            grid: Grid::new(config.width, config.height),
            active,
            queue,
            pending: VecDeque::new(),
            intervals,
            speed: intervals.slow,
            accelerating: false,
            counter: 0,
            score: 0,
            lines_cleared: 0,
            pieces_placed: 0,
            status: Status::Running,
        }
    }

    /// Fresh grid, queue and score; keeps the RNG stream and the accelerate state.
    pub fn reset(&mut self) {
        self.grid = Grid::new(self.grid.width(), self.grid.height());
        self.queue.reset();
        self.active = self.queue.dequeue_and_refill();
        self.pending.clear();
        self.counter = 0;
        self.score = 0;
        self.lines_cleared = 0;
        self.pieces_placed = 0;
        self.status = Status::Running;
        info!("game restarted");
    }

    #[inline]
    pub fn is_game_over(&self) -> bool {
        self.status == Status::GameOver
    }

    #[inline]
    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn snapshot(&self) -> Snapshot<'_> {
        Snapshot {
            grid: &self.grid,
            active: &self.active,
            upcoming: self.queue.upcoming(),
            score: self.score,
            lines_cleared: self.lines_cleared,
            pieces_placed: self.pieces_placed,
            accelerated: self.accelerating,
            game_over: self.is_game_over(),
        }
    }

    /// Queue a command for the next tick. Ignored once the game is over.
    pub fn push_command(&mut self, command: Command) {
        if self.status == Status::Running {
            self.pending.push_back(command);
        }
    }

    /// Held accelerate key: switches between the fast and slow interval.
    pub fn set_accelerate(&mut self, on: bool) {
        self.accelerating = on;
        self.speed = if on {
            self.intervals.fast
        } else {
            self.intervals.slow
        };
    }

    /// One frame of simulation. Returns the landing, if the piece landed this tick.
    pub fn tick(&mut self) -> Option<Landing> {
        if self.status == Status::GameOver {
            return None;
        }
        while let Some(command) = self.pending.pop_front() {
            self.apply(command);
        }

        self.counter += 1;
        if self.counter < self.speed {
            return None;
        }
        self.counter = 0;

        let piece = self.active;
        if self.grid.is_valid_placement(&piece.shape, piece.x, piece.y - 1) {
            self.active.y -= 1;
            None
        } else {
            Some(self.land())
        }
    }

    /// Applies one command; returns false if it was rejected.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::MoveLeft => self.shift(-1),
            Command::MoveRight => self.shift(1),
            Command::Rotate => self.rotate(),
        }
    }

    fn shift(&mut self, dx: i32) -> bool {
        let piece = self.active;
        if self.grid.is_valid_placement(&piece.shape, piece.x + dx, piece.y) {
            self.active.x += dx;
            true
        } else {
            false
        }
    }

    /// Rotates in place; no kicks, so a blocked rotation is a no-op.
    fn rotate(&mut self) -> bool {
        let rotated = self.active.shape.rotated();
        if self
            .grid
            .is_valid_placement(&rotated, self.active.x, self.active.y)
        {
            self.active.shape = rotated;
            true
        } else {
            false
        }
    }

    fn land(&mut self) -> Landing {
        self.grid.merge(&self.active);
        self.pieces_placed += 1;
        let rows_cleared = self.grid.clear_full_rows();
        self.lines_cleared += rows_cleared as u32;
        self.score += rows_cleared as u32 * POINTS_PER_ROW;
        debug!(rows_cleared, score = self.score, "piece landed");

        self.active = self.queue.dequeue_and_refill();
        let next = self.active;
        let game_over = !self.grid.is_valid_placement(&next.shape, next.x, next.y);
        if game_over {
            self.status = Status::GameOver;
            self.pending.clear();
            info!(
                score = self.score,
                lines = self.lines_cleared,
                pieces = self.pieces_placed,
                "game over"
            );
        }
        Landing {
            rows_cleared,
            game_over,
        }
    }
}
