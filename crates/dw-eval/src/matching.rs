//! Temporal matching of predictions to ground truth.
//!
//! Greedy and confidence-ordered: within each `(trip_id, event_type)`
//! group, predictions claim the best still-unused ground-truth candidate.
//! Greedy matching is not globally optimal; determinism comes from the
//! stable ordering (confidence descending, `source_id` ascending).

use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::records::{EventRecord, MatchOutcome, MatchResult};
use dw_models::Stream;

/// Intersection-over-union of two closed time intervals.
pub fn temporal_iou(a: &EventRecord, b: &EventRecord) -> f64 {
    let left = a.ts_ms_start.max(b.ts_ms_start);
    let right = a.ts_ms_end.min(b.ts_ms_end);
    let inter = (right - left).max(0);
    let union = a.duration_ms() + b.duration_ms() - inter;
    if union <= 0 {
        0.0
    } else {
        inter as f64 / union as f64
    }
}

/// Absolute distance between interval centers, milliseconds.
pub fn center_distance_ms(a: &EventRecord, b: &EventRecord) -> i64 {
    (a.center_ms() - b.center_ms()).abs()
}

fn compatible(a: &EventRecord, b: &EventRecord) -> bool {
    if a.trip_id != b.trip_id || a.event_type != b.event_type {
        return false;
    }
    if a.stream != Stream::Unknown && b.stream != Stream::Unknown && a.stream != b.stream {
        return false;
    }
    true
}

fn unmatched(record: &EventRecord, outcome: MatchOutcome) -> MatchResult {
    let is_fn = outcome == MatchOutcome::Fn;
    MatchResult {
        trip_id: record.trip_id.clone(),
        event_type: record.event_type.clone(),
        stream: record.stream,
        scenario: record.scenario,
        gt_id: is_fn.then(|| record.source_id.clone()),
        pred_id: (!is_fn).then(|| record.source_id.clone()),
        confidence: if is_fn { 0.0 } else { record.confidence },
        iou: 0.0,
        outcome,
    }
}

/// Match predictions against ground truth.
///
/// A candidate pair is admissible when `iou >= iou_threshold` or the
/// center distance is within `tolerance_ms`; among admissible candidates
/// the prediction takes the one maximizing `iou + 0.1 * close_enough`.
/// The result partitions predictions into TP/FP and ground truth into
/// TP/FN.
pub fn match_events(
    gt_events: &[EventRecord],
    pred_events: &[EventRecord],
    iou_threshold: f64,
    tolerance_ms: i64,
) -> Vec<MatchResult> {
    type Key = (String, String);
    let mut by_key_gt: BTreeMap<Key, Vec<&EventRecord>> = BTreeMap::new();
    let mut by_key_pred: BTreeMap<Key, Vec<&EventRecord>> = BTreeMap::new();

    for ev in gt_events {
        by_key_gt
            .entry((ev.trip_id.clone(), ev.event_type.clone()))
            .or_default()
            .push(ev);
    }
    for ev in pred_events {
        by_key_pred
            .entry((ev.trip_id.clone(), ev.event_type.clone()))
            .or_default()
            .push(ev);
    }

    let keys: std::collections::BTreeSet<Key> = by_key_gt
        .keys()
        .chain(by_key_pred.keys())
        .cloned()
        .collect();

    let mut results = Vec::new();

    for key in keys {
        let mut gts: Vec<&EventRecord> = by_key_gt.get(&key).cloned().unwrap_or_default();
        gts.sort_by_key(|e| (e.ts_ms_start, e.ts_ms_end));

        let mut preds: Vec<&EventRecord> = by_key_pred.get(&key).cloned().unwrap_or_default();
        // Confidence descending, then source_id ascending for determinism
        preds.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.source_id.cmp(&b.source_id))
        });

        let mut used_gt: HashSet<&str> = HashSet::new();
        let mut used_pred: HashSet<&str> = HashSet::new();

        for pred in &preds {
            let mut best: Option<(&EventRecord, f64, f64)> = None;

            for gt in &gts {
                if used_gt.contains(gt.source_id.as_str()) || !compatible(gt, pred) {
                    continue;
                }
                let iou = temporal_iou(gt, pred);
                let close_enough = center_distance_ms(gt, pred) <= tolerance_ms;
                if iou < iou_threshold && !close_enough {
                    continue;
                }
                let score = iou + if close_enough { 0.1 } else { 0.0 };
                if best.map_or(true, |(_, best_score, _)| score > best_score) {
                    best = Some((gt, score, iou));
                }
            }

            let Some((gt, _, iou)) = best else {
                continue;
            };

            used_gt.insert(gt.source_id.as_str());
            used_pred.insert(pred.source_id.as_str());
            results.push(MatchResult {
                trip_id: pred.trip_id.clone(),
                event_type: pred.event_type.clone(),
                stream: pred.stream,
                scenario: pred.scenario,
                gt_id: Some(gt.source_id.clone()),
                pred_id: Some(pred.source_id.clone()),
                confidence: pred.confidence,
                iou,
                outcome: MatchOutcome::Tp,
            });
        }

        for pred in &preds {
            if !used_pred.contains(pred.source_id.as_str()) {
                results.push(unmatched(pred, MatchOutcome::Fp));
            }
        }
        for gt in &gts {
            if !used_gt.contains(gt.source_id.as_str()) {
                results.push(unmatched(gt, MatchOutcome::Fn));
            }
        }
    }

    results
}
