//! Core data types shared by the engine and its clients.
//!
//! Everything in this module can travel on the wire: identities, the
//! game and card records, and the small enums that describe a game's
//! lifecycle and the kind of win a card achieved.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A stable player identity, as supplied by the identity service.
///
/// Newtype over `u64` so a `PlayerId` can never be passed where a
/// `GameId` or `CardId` is expected. `#[serde(transparent)]` keeps the
/// JSON form a plain number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A unique identifier for a game (one room).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "G-{}", self.0)
    }
}

/// A unique identifier for a purchased card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CardId(pub u64);

impl fmt::Display for CardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "C-{}", self.0)
    }
}

/// A single viewer connection. One player may have several viewers
/// (two browser tabs), and a viewer watches at most one game at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewerId(pub u64);

impl fmt::Display for ViewerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V-{}", self.0)
    }
}

/// Account currency in minor units.
pub type Credits = u64;

// ---------------------------------------------------------------------------
// Card grid
// ---------------------------------------------------------------------------

/// Width and height of a card.
pub const GRID_SIZE: usize = 5;

/// Number of cells on a card.
pub const CELL_COUNT: usize = GRID_SIZE * GRID_SIZE;

/// Sentinel value of the free cell. Always counts as marked.
pub const FREE_CELL: u8 = 0;

/// Row-major index of the free cell (row 2, column 2).
pub const FREE_CELL_INDEX: usize = 12;

/// Highest number in the draw pool. The pool is `1..=MAX_NUMBER`.
pub const MAX_NUMBER: u8 = 75;

/// A 5×5 card, row-major. `grid[row][col]`.
pub type Grid = [[u8; GRID_SIZE]; GRID_SIZE];

// ---------------------------------------------------------------------------
// GameStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a game.
///
/// ```text
/// Open ──→ Ready ──→ Running ──→ Finished
///   │        │
///   └────────┴──→ Cancelled
/// ```
///
/// Transitions only ever move forward. `Finished` and `Cancelled` are
/// terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    /// Accepting purchases, minimum not yet reached.
    Open,
    /// Minimum reached; still accepting purchases, may be started.
    Ready,
    /// Numbers are being drawn and claims are accepted.
    Running,
    /// A winner was paid.
    Finished,
    /// Called off before it ran; every card was refunded.
    Cancelled,
}

impl GameStatus {
    /// Returns `true` if cards can be bought in this state.
    pub fn accepts_purchases(self) -> bool {
        matches!(self, Self::Open | Self::Ready)
    }

    /// Returns `true` if no further mutation is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Cancelled)
    }

    /// Returns `true` if moving to `target` follows the state graph.
    pub fn can_transition_to(self, target: Self) -> bool {
        matches!(
            (self, target),
            (Self::Open, Self::Ready)
                | (Self::Open, Self::Cancelled)
                | (Self::Ready, Self::Running)
                | (Self::Ready, Self::Cancelled)
                | (Self::Running, Self::Finished)
        )
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Ready => write!(f, "READY"),
            Self::Running => write!(f, "RUNNING"),
            Self::Finished => write!(f, "FINISHED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

// ---------------------------------------------------------------------------
// WinCategory
// ---------------------------------------------------------------------------

/// The kind of pattern a winning card completed. Drives the prize tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WinCategory {
    /// Any full row or column.
    Line,
    /// Either main diagonal.
    Diagonal,
    /// The four corner cells.
    FourCorners,
    /// Both diagonals' ends plus the centre (an "X").
    Cross,
    /// Every cell on the card.
    FullCard,
}

impl WinCategory {
    /// All categories in pattern-priority order.
    pub const ALL: [WinCategory; 5] = [
        Self::Line,
        Self::Diagonal,
        Self::FourCorners,
        Self::Cross,
        Self::FullCard,
    ];
}

impl fmt::Display for WinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::Diagonal => write!(f, "diagonal"),
            Self::FourCorners => write!(f, "four_corners"),
            Self::Cross => write!(f, "cross"),
            Self::FullCard => write!(f, "full_card"),
        }
    }
}

// ---------------------------------------------------------------------------
// Game and Card records
// ---------------------------------------------------------------------------

/// A game record. Owned by the game's state machine; clients only ever
/// see copies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub creator: PlayerId,
    pub status: GameStatus,
    /// Price of one card.
    pub card_price: Credits,
    /// Sum of every sold card's price.
    pub pot: Credits,
    pub sold_cards: u32,
    /// Numbers in the order they were drawn. Unique, at most 75.
    pub drawn_numbers: Vec<u8>,
    /// The single winning card, once the game is decided.
    pub winner: Option<CardId>,
    /// Unix milliseconds.
    pub created_at: u64,
    pub started_at: Option<u64>,
    pub ended_at: Option<u64>,
}

/// A card owned by one player in one game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub game_id: GameId,
    pub owner: PlayerId,
    pub grid: Grid,
    /// Price paid at purchase.
    pub price: Credits,
    pub is_winner: bool,
    /// Set when the game was cancelled and the price returned.
    #[serde(default)]
    pub refunded: bool,
    /// Amount credited for a win (0 otherwise).
    #[serde(default)]
    pub payout: Credits,
}

impl Card {
    /// The grid flattened row-major into 25 cells.
    pub fn cells(&self) -> [u8; CELL_COUNT] {
        flatten(&self.grid)
    }
}

/// Flattens a grid row-major.
pub fn flatten(grid: &Grid) -> [u8; CELL_COUNT] {
    let mut cells = [0u8; CELL_COUNT];
    for (row, values) in grid.iter().enumerate() {
        for (col, value) in values.iter().enumerate() {
            cells[row * GRID_SIZE + col] = *value;
        }
    }
    cells
}

/// The result of an accepted win claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutResult {
    pub game_id: GameId,
    pub card_id: CardId,
    pub claimant: PlayerId,
    /// The category the prize was computed for.
    pub category: WinCategory,
    /// Every category the card satisfied, in priority order.
    pub categories: Vec<WinCategory>,
    pub amount: Credits,
}

// =========================================================================
// Tests
// =========================================================================
