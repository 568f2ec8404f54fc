//! Tap-to-focus geometry and autofocus bookkeeping.

use crate::hardware::{MeteringArea, Rect};
use crate::types::{PointF, Size};
use crate::worker::TimerToken;

const METERING_RANGE: f64 = 1000.0;

/// Translate a tap in view coordinates into two metering areas in sensor
/// space: a small heavily weighted one and a larger light one, both
/// clipped to the driver's [-1000, 1000] range.
pub fn compute_metering_areas(point: PointF, view: Size, sensor_to_view: u32) -> [MeteringArea; 2] {
    let width = f64::from(view.width.max(1));
    let height = f64::from(view.height.max(1));
    let view_x = -METERING_RANGE + (f64::from(point.x) / width) * 2.0 * METERING_RANGE;
    let view_y = -METERING_RANGE + (f64::from(point.y) / height) * 2.0 * METERING_RANGE;

    let theta = -f64::from(sensor_to_view).to_radians();
    let sensor_x = view_x * theta.cos() - view_y * theta.sin();
    let sensor_y = view_x * theta.sin() + view_y * theta.cos();
    log::debug!("focus: view ({view_x:.1}, {view_y:.1}) -> sensor ({sensor_x:.1}, {sensor_y:.1})");

    [
        MeteringArea {
            rect: metering_rect(sensor_x, sensor_y, 150.0),
            weight: 1000,
        },
        MeteringArea {
            rect: metering_rect(sensor_x, sensor_y, 300.0),
            weight: 100,
        },
    ]
}

fn metering_rect(center_x: f64, center_y: f64, side: f64) -> Rect {
    let delta = side / 2.0;
    Rect::new(
        (center_x - delta).max(-METERING_RANGE) as i32,
        (center_y - delta).max(-METERING_RANGE) as i32,
        (center_x + delta).min(METERING_RANGE) as i32,
        (center_y + delta).min(METERING_RANGE) as i32,
    )
}

/// How many of the computed areas the driver accepts: none, the first, or both.
pub fn areas_for(max_areas: u32, areas: &[MeteringArea; 2]) -> Vec<MeteringArea> {
    match max_areas {
        0 => Vec::new(),
        1 => areas[..1].to_vec(),
        _ => areas.to_vec(),
    }
}

/// One outstanding autofocus request.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingFocus {
    pub id: u64,
    pub point: PointF,
    pub timeout: Option<TimerToken>,
}

/// Guarantees exactly one focus end per focus start, whichever of the
/// hardware report, the timeout or a superseding request comes first.
#[derive(Debug, Default)]
pub struct FocusTracker {
    next_id: u64,
    pending: Option<PendingFocus>,
    reset: Option<TimerToken>,
}

impl FocusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new request. Returns its id and the request it supersedes.
    pub fn start(&mut self, point: PointF) -> (u64, Option<PendingFocus>) {
        self.next_id += 1;
        let superseded = self.pending.replace(PendingFocus {
            id: self.next_id,
            point,
            timeout: None,
        });
        (self.next_id, superseded)
    }

    pub fn set_timeout(&mut self, id: u64, token: TimerToken) {
        if let Some(pending) = self.pending.as_mut().filter(|pending| pending.id == id) {
            pending.timeout = Some(token);
        }
    }

    /// End whatever request is outstanding.
    pub fn end_current(&mut self) -> Option<PendingFocus> {
        self.pending.take()
    }

    /// End request `id` if it is still the outstanding one.
    pub fn end(&mut self, id: u64) -> Option<PendingFocus> {
        if self.pending.as_ref().map(|pending| pending.id) == Some(id) {
            self.pending.take()
        } else {
            None
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Remember the scheduled post-focus reset, returning the one it replaces.
    pub fn replace_reset(&mut self, token: Option<TimerToken>) -> Option<TimerToken> {
        std::mem::replace(&mut self.reset, token)
    }

    /// Forget everything; returns the timers the caller should cancel.
    pub fn clear(&mut self) -> Vec<TimerToken> {
        let mut timers = Vec::new();
        if let Some(timeout) = self.pending.take().and_then(|pending| pending.timeout) {
            timers.push(timeout);
        }
        if let Some(reset) = self.reset.take() {
            timers.push(reset);
        }
        timers
    }
}
