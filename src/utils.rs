//! Utility functions for the ladder engine

use crate::types::Rating;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Calculate the absolute difference between two ratings
pub fn rating_difference(rating1: Rating, rating2: Rating) -> u32 {
    rating1.abs_diff(rating2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_unique_ids() {
        let id1 = generate_match_id();
        let id2 = generate_match_id();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_rating_difference() {
        assert_eq!(rating_difference(1500, 1400), 100);
        assert_eq!(rating_difference(1400, 1500), 100);
        assert_eq!(rating_difference(1500, 1500), 0);
    }

}
