//! Win evaluation.

use std::collections::HashSet;

use bingohall_protocol::{CARD_SIZE, Card, Cell, DiagonalDirection, WinPattern};

/// Every pattern `card` satisfies given the `covered` numbers.
///
/// A cell counts as covered if it is the free space or its number is in
/// `covered`. Patterns come back in a fixed order: rows top to bottom,
/// columns left to right, the TL-BR diagonal, the TR-BL diagonal, then
/// four corners. Empty when nothing matches.
pub fn evaluate_win(card: &Card, covered: &HashSet<u8>) -> Vec<WinPattern> {
    let hit = |row: usize, col: usize| match card.cell(row, col) {
        Cell::Free => true,
        Cell::Number(n) => covered.contains(&n),
    };
    let last = CARD_SIZE - 1;
    let mut patterns = Vec::new();

    for row in 0..CARD_SIZE {
        if (0..CARD_SIZE).all(|col| hit(row, col)) {
            patterns.push(WinPattern::Horizontal { index: row });
        }
    }
    for col in 0..CARD_SIZE {
        if (0..CARD_SIZE).all(|row| hit(row, col)) {
            patterns.push(WinPattern::Vertical { index: col });
        }
    }
    if (0..CARD_SIZE).all(|i| hit(i, i)) {
        patterns.push(WinPattern::Diagonal {
            direction: DiagonalDirection::TopLeftBottomRight,
        });
    }
    if (0..CARD_SIZE).all(|i| hit(i, last - i)) {
        patterns.push(WinPattern::Diagonal {
            direction: DiagonalDirection::TopRightBottomLeft,
        });
    }
    if hit(0, 0) && hit(0, last) && hit(last, 0) && hit(last, last) {
        patterns.push(WinPattern::FourCorners);
    }
    patterns
}

#[cfg(test)]
mod tests {
    use super::*;

    /// ```text
    ///  1 16 31 46 61
    ///  2 17 32 47 62
    ///  3 18  F 48 63
    ///  4 19 34 49 64
    ///  5 20 35 50 65
    /// ```
    fn card() -> Card {
        let mut rows = [[Cell::Free; CARD_SIZE]; CARD_SIZE];
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if (r, c) != (2, 2) {
                    *cell = Cell::Number((c * 15 + r + 1) as u8);
                }
            }
        }
        Card::new(rows).unwrap()
    }

    fn set(numbers: &[u8]) -> HashSet<u8> {
        numbers.iter().copied().collect()
    }

    #[test]
    fn test_evaluate_win_nothing_covered_is_empty() {
        assert!(evaluate_win(&card(), &HashSet::new()).is_empty());
    }

    #[test]
    fn test_evaluate_win_center_row_uses_free_space() {
        let patterns = evaluate_win(&card(), &set(&[3, 18, 48, 63]));
        assert_eq!(patterns, vec![WinPattern::Horizontal { index: 2 }]);
    }

    #[test]
    fn test_evaluate_win_row_with_one_gap_is_empty() {
        assert!(evaluate_win(&card(), &set(&[1, 16, 31, 46])).is_empty());
    }

    #[test]
    fn test_evaluate_win_column() {
        let patterns = evaluate_win(&card(), &set(&[46, 47, 48, 49, 50]));
        assert_eq!(patterns, vec![WinPattern::Vertical { index: 3 }]);
    }

    #[test]
    fn test_evaluate_win_both_diagonals() {
        let patterns = evaluate_win(&card(), &set(&[1, 17, 49, 65, 61, 47, 19, 5]));
        assert_eq!(
            patterns,
            vec![
                WinPattern::Diagonal {
                    direction: DiagonalDirection::TopLeftBottomRight
                },
                WinPattern::Diagonal {
                    direction: DiagonalDirection::TopRightBottomLeft
                },
                WinPattern::FourCorners,
            ]
        );
    }

    #[test]
    fn test_evaluate_win_four_corners_only() {
        let patterns = evaluate_win(&card(), &set(&[1, 61, 5, 65]));
        assert_eq!(patterns, vec![WinPattern::FourCorners]);
    }

    #[test]
    fn test_evaluate_win_full_card_orders_every_pattern() {
        let all: HashSet<u8> = (1..=75).collect();
        let patterns = evaluate_win(&card(), &all);
        assert_eq!(patterns.len(), 5 + 5 + 2 + 1);
        assert_eq!(patterns[0], WinPattern::Horizontal { index: 0 });
        assert_eq!(patterns[5], WinPattern::Vertical { index: 0 });
        assert_eq!(patterns[12], WinPattern::FourCorners);
    }

    #[test]
    fn test_evaluate_win_is_deterministic() {
        let covered = set(&[1, 2, 3, 4, 5, 16, 31, 46, 61]);
        let first = evaluate_win(&card(), &covered);
        let second = evaluate_win(&card(), &covered);
        assert_eq!(first, second);
        assert_eq!(first[0], WinPattern::Horizontal { index: 0 });
    }

    #[test]
    fn test_evaluate_win_center_column_uses_free_space() {
        let patterns = evaluate_win(&card(), &set(&[18, 32, 34, 33]));
        assert!(patterns.is_empty());
        let patterns = evaluate_win(&card(), &set(&[31, 32, 34, 35]));
        assert_eq!(patterns, vec![WinPattern::Vertical { index: 2 }]);
    }
}
