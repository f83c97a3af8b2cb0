//! The debouncer: noisy per-frame activations in, duration-qualified
//! events out.
//!
//! One homogeneous state cell per event type, indexed by the
//! [`EventType`] tag. Activation time accumulates while a signal is
//! active and drains while it is not; a confidence EMA rides along. An
//! event is emitted only when the accumulated time clears the per-type
//! minimum duration, the per-type cooldown since the last emission has
//! elapsed and the EMA clears the confidence floor.
//!
//! State is intentionally NOT reset on emission: a bout that stays active
//! re-emits after each cooldown with the original bout onset as
//! `ts_ms_start`.

use std::path::PathBuf;

use dw_models::{Event, EventMetadata, EventType, Stream, ALL_EVENT_TYPES};

/// Minimum EMA confidence required to emit.
const EMA_FLOOR: f64 = 0.45;

/// Sentinel: far enough in the past that the first emission is never
/// cooldown-blocked.
const NEVER_EMITTED_MS: i64 = -1_000_000_000;

/// Per-type debounce cell.
#[derive(Debug, Clone, Copy)]
struct DebounceState {
    /// Accumulated active time; drains while inactive, never negative
    active_ms: f64,
    /// End timestamp of the last emission
    last_emit_ms: i64,
    /// Confidence EMA; decays while inactive
    ema: f64,
    /// Onset of the current bout; meaningless while `active_ms == 0`
    start_ms: i64,
}

impl Default for DebounceState {
    fn default() -> Self {
        Self {
            active_ms: 0.0,
            last_emit_ms: NEVER_EMITTED_MS,
            ema: 0.0,
            start_ms: 0,
        }
    }
}

/// Per-frame context attached to an emitted event.
#[derive(Debug, Clone)]
pub struct EmitContext {
    pub stream: Stream,
    pub clip_name: String,
    pub video_path: Option<PathBuf>,
    pub local_ts_sec: f64,
}

/// Eight-cell debounce engine, one cell per event type.
#[derive(Debug)]
pub struct Debouncer {
    cells: [DebounceState; ALL_EVENT_TYPES.len()],
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new()
    }
}

impl Debouncer {
    pub fn new() -> Self {
        Self {
            cells: [DebounceState::default(); ALL_EVENT_TYPES.len()],
        }
    }

    /// Feed one activation sample; returns an event when the emission
    /// gate opens.
    pub fn update(
        &mut self,
        event_type: EventType,
        active: bool,
        conf: f64,
        now_ms: i64,
        delta_ms: u32,
        metadata: EventMetadata,
        ctx: &EmitContext,
    ) -> Option<Event> {
        let rule = event_type.rule();
        let st = &mut self.cells[event_type.index()];
        let delta = delta_ms as f64;

        if active {
            if st.active_ms <= 0.0 {
                st.start_ms = now_ms - delta_ms as i64;
            }
            st.active_ms += delta;
            st.ema = if st.ema > 0.0 {
                0.75 * st.ema + 0.25 * conf
            } else {
                conf
            };
        } else {
            st.active_ms = (st.active_ms - delta).max(0.0);
            st.ema *= 0.85;
        }

        let can_emit = st.active_ms >= rule.min_duration_ms as f64
            && now_ms - st.last_emit_ms >= rule.cooldown_ms
            && st.ema >= EMA_FLOOR;
        if !can_emit {
            return None;
        }

        st.last_emit_ms = now_ms;
        Some(Event {
            event_type,
            ts_ms_start: st.start_ms,
            ts_ms_end: now_ms,
            severity: st.ema.clamp(0.0, 1.0),
            stream: ctx.stream,
            clip_name: ctx.clip_name.clone(),
            metadata,
            local_ts_sec: ctx.local_ts_sec,
            video_path: ctx.video_path.clone(),
        })
    }
}
