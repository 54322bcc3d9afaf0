//! An exact solver for the game of 'Connect 4'
//!
//! This crate provides a bitboard position representation, a transposition
//! table, an on-disk opening book, and a negamax alpha-beta solver that
//! together compute the game-theoretic value of any legal Connect 4
//! position under perfect play.
//!
//! # Basic Usage
//!
//! ```
//! use connect_four_engine::{position::Position, solver::Solver};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let position = Position::from_sequence("112233")?;
//! let mut solver = Solver::new();
//!
//! assert_eq!(solver.solve(&position), 18);
//! # Ok(())
//! # }
//! ```

use static_assertions::*;

pub mod position;

pub mod transposition_table;

pub mod opening_book;

pub mod solver;

/// The width of the game board in tiles
pub const WIDTH: usize = 7;

/// The height of the game board in tiles
pub const HEIGHT: usize = 6;

// ensure that the given dimensions fit in a u64 for the bitboard representation
const_assert!(WIDTH * (HEIGHT + 1) < 64);
