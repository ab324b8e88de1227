//! Board arithmetic for the rally track.

/// Positions at or past this offset win the game and end the session.
pub const FINISH_LINE: u32 = 36;

const DIE_FACES: u64 = 6;
const ZONE_PERIOD: u32 = 3;
const TOLL_DIVISOR: i128 = 10;

/// Reduce a random word to a die face in 1..=6.
pub fn die_face(word: u64) -> u32 {
    (word % DIE_FACES) as u32 + 1
}

/// Zone of a board position: every third square is zone 1, the rest zone 2.
pub fn zone_of(position: u32) -> u32 {
    if position % ZONE_PERIOD == 0 {
        1
    } else {
        2
    }
}

/// Tax/rent amount for landing in a zone. Divides before scaling so the
/// amount is an exact tenth of the session price per zone step.
pub fn toll_for(session_price: i128, zone: u32) -> i128 {
    session_price / TOLL_DIVISOR * zone as i128
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn die_face_stays_in_range() {
        for word in 0..20u64 {
            let face = die_face(word);
            assert!((1..=6).contains(&face));
        }
        assert_eq!(die_face(0), 1);
        assert_eq!(die_face(5), 6);
        assert_eq!(die_face(6), 1);
        assert_eq!(die_face(u64::MAX), 4);
    }

    #[test]
    fn every_third_square_is_zone_one() {
        assert_eq!(zone_of(3), 1);
        assert_eq!(zone_of(6), 1);
        assert_eq!(zone_of(36), 1);
        assert_eq!(zone_of(1), 2);
        assert_eq!(zone_of(2), 2);
        assert_eq!(zone_of(35), 2);
    }

    #[test]
    fn toll_divides_before_scaling() {
        assert_eq!(toll_for(1000, 1), 100);
        assert_eq!(toll_for(1000, 2), 200);
        // Truncating division, matching ledger integer arithmetic.
        assert_eq!(toll_for(1005, 2), 200);
    }
}
