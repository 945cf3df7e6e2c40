use crate::core::distance::{bounding_box, haversine_distance, within_bounding_box};
use crate::models::{MatchCriteria, MatchIntent};

/// Check whether a pending intent satisfies a compatibility scan.
///
/// Stages, cheapest first: sport and matching mode must be identical, the
/// intent must accept the probed start slot, the skill ratings must lie
/// within the caller-supplied tolerance, and the parties must be within
/// the configured distance of each other (bounding-box pre-filter, then
/// exact Haversine).
#[inline]
pub fn is_compatible(intent: &MatchIntent, criteria: &MatchCriteria) -> bool {
    if intent.sport != criteria.sport || intent.is_club_matching != criteria.is_club_matching {
        return false;
    }

    if !intent.start_slots.iter().any(|slot| slot == &criteria.slot) {
        return false;
    }

    if (intent.rating - criteria.rating).abs() > criteria.rating_tolerance {
        return false;
    }

    let bbox = bounding_box(criteria.latitude, criteria.longitude, criteria.max_distance_km);
    if !within_bounding_box(intent.latitude, intent.longitude, &bbox) {
        return false;
    }

    haversine_distance(
        criteria.latitude,
        criteria.longitude,
        intent.latitude,
        intent.longitude,
    ) <= criteria.max_distance_km
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Sport;
    use chrono::Utc;

    fn intent(rating: i32, lat: f64, lon: f64, slots: &[&str]) -> MatchIntent {
        MatchIntent {
            group_id: 1,
            sport: Sport::Basketball,
            latitude: lat,
            longitude: lon,
            rating,
            user_count: 3,
            start_slots: slots.iter().map(|s| s.to_string()).collect(),
            preferred_venue: None,
            is_club_matching: false,
            created_at: Utc::now(),
        }
    }

    fn criteria(rating: i32, tolerance: i32) -> MatchCriteria {
        MatchCriteria {
            sport: Sport::Basketball,
            slot: "1830".to_string(),
            rating,
            rating_tolerance: tolerance,
            latitude: 37.5665,
            longitude: 126.9780,
            max_distance_km: 10.0,
            is_club_matching: false,
        }
    }

    #[test]
    fn test_compatible_intent_passes() {
        let intent = intent(10, 37.57, 126.98, &["1830", "2000"]);
        assert!(is_compatible(&intent, &criteria(12, 3)));
    }

    #[test]
    fn test_sport_mismatch_fails() {
        let mut candidate = intent(10, 37.57, 126.98, &["1830"]);
        candidate.sport = Sport::Soccer;
        assert!(!is_compatible(&candidate, &criteria(10, 3)));
    }

    #[test]
    fn test_club_flag_mismatch_fails() {
        let mut candidate = intent(10, 37.57, 126.98, &["1830"]);
        candidate.is_club_matching = true;
        assert!(!is_compatible(&candidate, &criteria(10, 3)));
    }

    #[test]
    fn test_slot_mismatch_fails() {
        let candidate = intent(10, 37.57, 126.98, &["2000"]);
        assert!(!is_compatible(&candidate, &criteria(10, 3)));
    }

    #[test]
    fn test_rating_outside_tolerance_fails() {
        let candidate = intent(20, 37.57, 126.98, &["1830"]);
        assert!(!is_compatible(&candidate, &criteria(10, 3)));
        assert!(is_compatible(&candidate, &criteria(10, 10)));
    }

    #[test]
    fn test_distance_beyond_threshold_fails() {
        // ~34km away, threshold is 10km
        let candidate = intent(10, 37.2659, 127.0001, &["1830"]);
        assert!(!is_compatible(&candidate, &criteria(10, 3)));
    }
}
