//! Win-pattern evaluation.
//!
//! A card is flattened row-major into 25 cells. Cell `i` is marked when
//! it holds the free cell or a drawn number, and a pattern wins when all
//! of its cells are marked. Patterns and marks are both 25-bit masks, so
//! a pattern check is a single AND.

use bingo_protocol::{CELL_COUNT, FREE_CELL, Grid, MAX_NUMBER, WinCategory, flatten};

// ---------------------------------------------------------------------------
// DrawnNumbers
// ---------------------------------------------------------------------------

/// The set of numbers drawn so far, as a bitset over `1..=75`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrawnNumbers(u128);

impl DrawnNumbers {
    pub fn new() -> Self {
        Self(0)
    }

    /// Adds a number. Values outside `1..=75` are ignored.
    pub fn insert(&mut self, number: u8) {
        if (1..=MAX_NUMBER).contains(&number) {
            self.0 |= 1u128 << number;
        }
    }

    /// Whether a cell holding `value` is marked. The free cell always is.
    pub fn marks(&self, value: u8) -> bool {
        value == FREE_CELL || (value <= MAX_NUMBER && self.0 & (1u128 << value) != 0)
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl FromIterator<u8> for DrawnNumbers {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut drawn = Self::new();
        for number in iter {
            drawn.insert(number);
        }
        drawn
    }
}

impl From<&[u8]> for DrawnNumbers {
    fn from(numbers: &[u8]) -> Self {
        numbers.iter().copied().collect()
    }
}

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

/// A set of cell indices that wins when fully marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pattern {
    pub category: WinCategory,
    mask: u32,
}

impl Pattern {
    fn new(category: WinCategory, cells: &[usize]) -> Self {
        let mask = cells.iter().fold(0u32, |mask, &cell| mask | (1 << cell));
        Self { category, mask }
    }

    /// The cell indices of this pattern, ascending.
    pub fn cells(&self) -> Vec<usize> {
        (0..CELL_COUNT).filter(|i| self.mask & (1 << i) != 0).collect()
    }

    fn is_complete(&self, marked: u32) -> bool {
        marked & self.mask == self.mask
    }
}

/// Decides whether a card wins, and which categories it satisfies.
///
/// Evaluation is pure: the same card and drawn set always give the same
/// answer.
#[derive(Debug, Clone)]
pub struct PatternValidator {
    patterns: Vec<Pattern>,
}

impl PatternValidator {
    /// The standard pattern list, in priority order: ten lines, two
    /// diagonals, then (when `supplementary`) four corners and the
    /// cross, and finally the full card.
    pub fn standard(supplementary: bool) -> Self {
        let mut patterns = Vec::with_capacity(15);

        for row in 0..5 {
            let cells: Vec<usize> = (0..5).map(|col| row * 5 + col).collect();
            patterns.push(Pattern::new(WinCategory::Line, &cells));
        }
        for col in 0..5 {
            let cells: Vec<usize> = (0..5).map(|row| row * 5 + col).collect();
            patterns.push(Pattern::new(WinCategory::Line, &cells));
        }

        patterns.push(Pattern::new(WinCategory::Diagonal, &[0, 6, 12, 18, 24]));
        patterns.push(Pattern::new(WinCategory::Diagonal, &[4, 8, 12, 16, 20]));

        if supplementary {
            patterns.push(Pattern::new(WinCategory::FourCorners, &[0, 4, 20, 24]));
            patterns.push(Pattern::new(WinCategory::Cross, &[0, 4, 12, 20, 24]));
        }

        let all: Vec<usize> = (0..CELL_COUNT).collect();
        patterns.push(Pattern::new(WinCategory::FullCard, &all));

        Self { patterns }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    /// Returns `true` as soon as any pattern is complete.
    pub fn is_winner(&self, grid: &Grid, drawn: &DrawnNumbers) -> bool {
        let marked = marked_mask(grid, drawn);
        self.patterns.iter().any(|p| p.is_complete(marked))
    }

    /// Every distinct satisfied category, in priority order.
    pub fn satisfied_categories(&self, grid: &Grid, drawn: &DrawnNumbers) -> Vec<WinCategory> {
        let marked = marked_mask(grid, drawn);
        let mut categories = Vec::new();
        for pattern in &self.patterns {
            if pattern.is_complete(marked) && !categories.contains(&pattern.category) {
                categories.push(pattern.category);
            }
        }
        categories
    }
}

fn marked_mask(grid: &Grid, drawn: &DrawnNumbers) -> u32 {
    flatten(grid)
        .iter()
        .enumerate()
        .filter(|(_, value)| drawn.marks(**value))
        .fold(0u32, |mask, (i, _)| mask | (1 << i))
}
