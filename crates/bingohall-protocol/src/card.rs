//! Bingo cards and the winning patterns a card can satisfy.
//!
//! A card is a 5×5 grid stored row-major. Column `c` holds five distinct
//! numbers from its band (B 1–15, I 16–30, N 31–45, G 46–60, O 61–75) and
//! the center cell is a permanent free space, sent as the string `"F"`:
//!
//! ```text
//! [[ 3, 17, 33, 49, 62],
//!  [ 9, 21, 40, 52, 70],
//!  [ 1, 30, "F", 46, 75],
//!  ...]
//! ```

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Cards are `CARD_SIZE` × `CARD_SIZE`.
pub const CARD_SIZE: usize = 5;

/// Highest number that can be drawn.
pub const MAX_NUMBER: u8 = 75;

const BAND_WIDTH: u8 = 15;
const CENTER: usize = CARD_SIZE / 2;

/// The numbers column `col` may contain.
///
/// # Panics
/// Panics if `col >= CARD_SIZE`.
pub fn column_range(col: usize) -> RangeInclusive<u8> {
    assert!(col < CARD_SIZE, "column {col} out of range");
    let start = col as u8 * BAND_WIDTH + 1;
    start..=start + BAND_WIDTH - 1
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// One square of a card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "CellRepr", into = "CellRepr")]
pub enum Cell {
    /// The free center space. Always covered.
    Free,
    Number(u8),
}

impl Cell {
    pub fn number(self) -> Option<u8> {
        match self {
            Self::Free => None,
            Self::Number(n) => Some(n),
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// On the wire a cell is either an integer or the marker `"F"`.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum CellRepr {
    Number(u8),
    Marker(String),
}

impl From<Cell> for CellRepr {
    fn from(cell: Cell) -> Self {
        match cell {
            Cell::Free => CellRepr::Marker("F".to_string()),
            Cell::Number(n) => CellRepr::Number(n),
        }
    }
}

impl TryFrom<CellRepr> for Cell {
    type Error = String;

    fn try_from(repr: CellRepr) -> Result<Self, Self::Error> {
        match repr {
            CellRepr::Number(n) => Ok(Cell::Number(n)),
            CellRepr::Marker(m) if m == "F" => Ok(Cell::Free),
            CellRepr::Marker(m) => Err(format!("unknown cell marker {m:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Card
// ---------------------------------------------------------------------------

/// A validated 5×5 bingo card.
///
/// The only way to get a `Card` is through [`Card::new`] (or
/// deserialization, which calls it), so every card in the system obeys
/// the column bands, has no duplicates and has a free center.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "[[Cell; CARD_SIZE]; CARD_SIZE]", into = "[[Cell; CARD_SIZE]; CARD_SIZE]")]
pub struct Card {
    rows: [[Cell; CARD_SIZE]; CARD_SIZE],
}

impl Card {
    /// Validates a row-major grid.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidCard`] when the center is not free, a
    /// non-center cell is free, or a number sits outside its column band.
    /// Bands are disjoint, so a band check per column plus a uniqueness
    /// check per column covers the whole card.
    pub fn new(rows: [[Cell; CARD_SIZE]; CARD_SIZE]) -> Result<Self, ProtocolError> {
        for col in 0..CARD_SIZE {
            let band = column_range(col);
            let mut seen = [false; BAND_WIDTH as usize];
            for (row, cells) in rows.iter().enumerate() {
                match (cells[col], row == CENTER && col == CENTER) {
                    (Cell::Free, true) => {}
                    (Cell::Free, false) => {
                        return Err(ProtocolError::InvalidCard(format!(
                            "free space at ({row}, {col}) outside the center"
                        )));
                    }
                    (Cell::Number(_), true) => {
                        return Err(ProtocolError::InvalidCard(
                            "center cell must be the free space".into(),
                        ));
                    }
                    (Cell::Number(n), false) => {
                        if !band.contains(&n) {
                            return Err(ProtocolError::InvalidCard(format!(
                                "{n} at ({row}, {col}) is outside {}..={}",
                                band.start(),
                                band.end()
                            )));
                        }
                        let slot = &mut seen[usize::from(n - band.start())];
                        if *slot {
                            return Err(ProtocolError::InvalidCard(format!(
                                "{n} appears twice in column {col}"
                            )));
                        }
                        *slot = true;
                    }
                }
            }
        }
        Ok(Self { rows })
    }

    /// The cell at `row`, `col`.
    ///
    /// # Panics
    /// Panics if either index is `>= CARD_SIZE`.
    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.rows[row][col]
    }

    pub fn rows(&self) -> &[[Cell; CARD_SIZE]; CARD_SIZE] {
        &self.rows
    }

    /// The 24 numbers on the card, row by row.
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.rows.iter().flatten().filter_map(|c| c.number())
    }

    pub fn contains(&self, number: u8) -> bool {
        self.numbers().any(|n| n == number)
    }
}

impl TryFrom<[[Cell; CARD_SIZE]; CARD_SIZE]> for Card {
    type Error = ProtocolError;

    fn try_from(rows: [[Cell; CARD_SIZE]; CARD_SIZE]) -> Result<Self, Self::Error> {
        Card::new(rows)
    }
}

impl From<Card> for [[Cell; CARD_SIZE]; CARD_SIZE] {
    fn from(card: Card) -> Self {
        card.rows
    }
}

// ---------------------------------------------------------------------------
// WinPattern
// ---------------------------------------------------------------------------

/// Which diagonal a [`WinPattern::Diagonal`] runs along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagonalDirection {
    /// Top-left to bottom-right.
    #[serde(rename = "TL-BR")]
    TopLeftBottomRight,
    /// Top-right to bottom-left.
    #[serde(rename = "TR-BL")]
    TopRightBottomLeft,
}

/// A line (or the corners) that a card has fully covered.
///
/// ```text
/// {"type":"horizontal","index":2}
/// {"type":"diagonal","direction":"TR-BL"}
/// {"type":"fourCorners"}
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WinPattern {
    /// A full row.
    Horizontal { index: usize },
    /// A full column.
    Vertical { index: usize },
    Diagonal { direction: DiagonalDirection },
    FourCorners,
}

// =========================================================================
// Tests
// =========================================================================
