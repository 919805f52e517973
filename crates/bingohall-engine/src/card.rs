//! Dealing new cards.

use bingohall_protocol::{CARD_SIZE, Card, Cell, column_range};
use rand::Rng;
use rand::seq::SliceRandom;

/// Deals a random card: five distinct numbers per column from the
/// column's band, with the free space in the center.
pub fn deal_card<R: Rng + ?Sized>(rng: &mut R) -> Card {
    let mut rows = [[Cell::Free; CARD_SIZE]; CARD_SIZE];
    for col in 0..CARD_SIZE {
        let mut band: Vec<u8> = column_range(col).collect();
        band.shuffle(rng);
        for (row, number) in band.into_iter().take(CARD_SIZE).enumerate() {
            if row != CARD_SIZE / 2 || col != CARD_SIZE / 2 {
                rows[row][col] = Cell::Number(number);
            }
        }
    }
    Card::new(rows).expect("dealt grid satisfies the card layout")
}
