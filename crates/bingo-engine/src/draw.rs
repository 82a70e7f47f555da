//! Number draws without replacement.
//!
//! The pool starts as `1..=75` and shrinks by one per draw. Picking from
//! what is left means a draw never has to retry, and the 76th draw fails
//! with [`EngineError::PoolExhausted`](crate::EngineError::PoolExhausted)
//! instead of looping.

use bingo_protocol::MAX_NUMBER;
use rand::Rng;

use crate::EngineError;

/// The remaining pool of one game, plus what has already been drawn.
///
/// Selection and recording are split: the game picks a number with
/// [`select`](Self::select), persists it, and only then calls
/// [`record`](Self::record). A failed write leaves the pool untouched.
#[derive(Debug, Clone)]
pub struct DrawEngine {
    remaining: Vec<u8>,
    drawn: Vec<u8>,
}

impl DrawEngine {
    /// A fresh pool of `1..=75`.
    pub fn new() -> Self {
        Self {
            remaining: (1..=MAX_NUMBER).collect(),
            drawn: Vec::new(),
        }
    }

    /// Rebuilds the pool from a persisted draw sequence. Numbers outside
    /// the pool and repeats are ignored.
    pub fn resume(drawn: &[u8]) -> Self {
        let mut engine = Self::new();
        for &number in drawn {
            engine.record(number);
        }
        engine
    }

    /// Picks a number uniformly from the remaining pool without removing
    /// it.
    ///
    /// # Errors
    /// [`EngineError::PoolExhausted`] once all 75 numbers are drawn.
    pub fn select<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<u8, EngineError> {
        if self.remaining.is_empty() {
            return Err(EngineError::PoolExhausted);
        }
        let idx = rng.random_range(0..self.remaining.len());
        Ok(self.remaining[idx])
    }

    /// Moves `number` from the pool to the drawn sequence. Returns
    /// `false` if it was not in the pool.
    pub fn record(&mut self, number: u8) -> bool {
        match self.remaining.iter().position(|&n| n == number) {
            Some(idx) => {
                self.remaining.swap_remove(idx);
                self.drawn.push(number);
                true
            }
            None => false,
        }
    }

    /// Selects and records in one step.
    pub fn draw<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<u8, EngineError> {
        let number = self.select(rng)?;
        self.record(number);
        Ok(number)
    }

    /// Numbers still in the pool, in no particular order.
    pub fn remaining(&self) -> &[u8] {
        &self.remaining
    }

    /// Numbers drawn so far, in draw order.
    pub fn drawn(&self) -> &[u8] {
        &self.drawn
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_empty()
    }
}

impl Default for DrawEngine {
    fn default() -> Self {
        Self::new()
    }
}
