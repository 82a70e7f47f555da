//! Card generation and validation.
//!
//! Each column draws from its own band of fifteen numbers:
//!
//! ```text
//! col:    0      1       2       3       4
//! band:  1-15  16-30   31-45   46-60   61-75
//! ```
//!
//! The centre cell is the free cell and always holds [`FREE_CELL`].

use std::collections::HashSet;

use bingo_protocol::{FREE_CELL, GRID_SIZE, Grid};
use rand::Rng;
use rand::seq::index;

use crate::EngineError;

const BAND_WIDTH: u8 = 15;
const CENTRE: usize = GRID_SIZE / 2;

/// The inclusive number range allowed in column `col`.
pub fn column_band(col: usize) -> (u8, u8) {
    let low = col as u8 * BAND_WIDTH + 1;
    (low, low + BAND_WIDTH - 1)
}

/// Produces and checks 5×5 cards.
pub struct CardGenerator;

impl CardGenerator {
    /// Generates a random card.
    ///
    /// Every column holds five distinct numbers from its band, sorted
    /// top to bottom; the centre is then replaced by the free cell.
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Grid {
        let mut grid: Grid = [[0; GRID_SIZE]; GRID_SIZE];

        for col in 0..GRID_SIZE {
            let (low, _) = column_band(col);
            let mut picks: Vec<u8> = index::sample(rng, BAND_WIDTH as usize, GRID_SIZE)
                .into_iter()
                .map(|offset| low + offset as u8)
                .collect();
            picks.sort_unstable();

            for (row, value) in picks.into_iter().enumerate() {
                grid[row][col] = value;
            }
        }

        grid[CENTRE][CENTRE] = FREE_CELL;
        grid
    }

    /// Checks a player-chosen grid against the same rules generated
    /// cards follow.
    ///
    /// # Errors
    /// [`EngineError::InvalidCard`] naming the first broken rule.
    pub fn validate(grid: &Grid) -> Result<(), EngineError> {
        if grid[CENTRE][CENTRE] != FREE_CELL {
            return Err(EngineError::InvalidCard(
                "centre cell must be the free cell".into(),
            ));
        }

        let mut seen = HashSet::with_capacity(GRID_SIZE * GRID_SIZE);
        for (row, values) in grid.iter().enumerate() {
            for (col, &value) in values.iter().enumerate() {
                if row == CENTRE && col == CENTRE {
                    continue;
                }
                let (low, high) = column_band(col);
                if !(low..=high).contains(&value) {
                    return Err(EngineError::InvalidCard(format!(
                        "{value} at row {row}, column {col} is outside {low}-{high}"
                    )));
                }
                if !seen.insert(value) {
                    return Err(EngineError::InvalidCard(format!(
                        "{value} appears more than once"
                    )));
                }
            }
        }
        Ok(())
    }
}
