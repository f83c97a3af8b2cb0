//! Per-category trip scoring.

use std::collections::BTreeMap;

use dw_models::{CategoryPenalties, CategoryScores, Event, EventCategory, ScoreDetails};

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Aggregate emitted events into category scores.
///
/// Each event contributes `weight * severity * duration_s` (duration
/// floored at half a second) to its category; penalties are normalized by
/// trip hours (floored at one) and subtracted from 100.
pub fn score_trip(events: &[Event], duration_seconds: f64) -> CategoryScores {
    let norm = (duration_seconds / 3600.0).max(1.0);
    let mut penalties = CategoryPenalties::default();
    let mut event_counts: BTreeMap<String, usize> = BTreeMap::new();

    for event in events {
        let duration_s = (event.duration_ms() as f64 / 1000.0).max(0.5);
        let penalty = event.event_type.weight() * event.severity * duration_s;

        match event.event_type.category() {
            EventCategory::Fatigue => penalties.fatigue += penalty,
            EventCategory::Distraction => penalties.distraction += penalty,
            EventCategory::Lane => penalties.lane += penalty,
            EventCategory::Following => penalties.following += penalty,
        }
        *event_counts
            .entry(event.event_type.as_str().to_string())
            .or_default() += 1;
    }

    let fatigue_score = (100.0 - penalties.fatigue / norm).max(0.0);
    let distraction_score = (100.0 - penalties.distraction / norm).max(0.0);
    let lane_score = (100.0 - penalties.lane / norm).max(0.0);
    let following_score = (100.0 - penalties.following / norm).max(0.0);
    let overall =
        round2((fatigue_score + distraction_score + lane_score + following_score) / 4.0);

    CategoryScores {
        fatigue_score: round2(fatigue_score),
        distraction_score: round2(distraction_score),
        lane_score: round2(lane_score),
        following_distance_score: round2(following_score),
        overall_score: overall,
        details: ScoreDetails {
            penalties,
            event_counts,
            total_events: events.len(),
            duration_seconds: round2(duration_seconds),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dw_models::{EventMetadata, EventType, Stream};

    fn event(ty: EventType, start: i64, end: i64, severity: f64) -> Event {
        Event {
            event_type: ty,
            ts_ms_start: start,
            ts_ms_end: end,
            severity,
            stream: Stream::Front,
            clip_name: "clip.mp4".to_string(),
            metadata: EventMetadata::new(),
            local_ts_sec: 0.0,
            video_path: None,
        }
    }

    #[test]
    fn test_no_events_scores_perfect() {
        let scores = score_trip(&[], 1800.0);
        assert_eq!(scores.overall_score, 100.0);
        assert_eq!(scores.fatigue_score, 100.0);
        assert_eq!(scores.details.total_events, 0);
    }

    #[test]
    fn test_single_event_penalty() {
        // 10 s tailgating at severity 0.5: penalty = 1.8 * 0.5 * 10 = 9
        let events = vec![event(EventType::Tailgating, 0, 10_000, 0.5)];
        let scores = score_trip(&events, 600.0);

        assert_eq!(scores.following_distance_score, 91.0);
        assert_eq!(scores.fatigue_score, 100.0);
        assert_eq!(scores.overall_score, round2((100.0 * 3.0 + 91.0) / 4.0));
        assert_eq!(scores.details.event_counts["tailgating"], 1);
    }

    #[test]
    fn test_short_event_duration_floor() {
        // 100 ms event scores as half a second
        let events = vec![event(EventType::LaneDeviation, 0, 100, 1.0)];
        let scores = score_trip(&events, 60.0);
        // penalty = 1.5 * 1.0 * 0.5 = 0.75
        assert_eq!(scores.lane_score, 99.25);
    }

    #[test]
    fn test_long_trip_normalizes_penalties() {
        let events = vec![event(EventType::Microsleep, 0, 10_000, 1.0)];
        // Two-hour trip: penalty divided by 2
        let scores = score_trip(&events, 7200.0);
        // penalty = 3.0 * 1.0 * 10 = 30; 100 - 30/2 = 85
        assert_eq!(scores.fatigue_score, 85.0);
    }

    #[test]
    fn test_scores_never_negative() {
        let events: Vec<Event> = (0..100)
            .map(|i| {
                event(
                    EventType::Microsleep,
                    i * 20_000,
                    i * 20_000 + 10_000,
                    1.0,
                )
            })
            .collect();
        let scores = score_trip(&events, 600.0);
        assert_eq!(scores.fatigue_score, 0.0);
        assert!(scores.overall_score >= 0.0);
    }

    #[test]
    fn test_overall_is_mean_of_four() {
        let events = vec![
            event(EventType::Microsleep, 0, 10_000, 1.0),
            event(EventType::MobilePhoneUse, 0, 10_000, 1.0),
        ];
        let scores = score_trip(&events, 600.0);
        let expected = round2(
            (scores.fatigue_score
                + scores.distraction_score
                + scores.lane_score
                + scores.following_distance_score)
                / 4.0,
        );
        assert_eq!(scores.overall_score, expected);
    }
}
