//! Gesture-scoped transform bookkeeping shared by the tile and canvas renderers.
//!
//! A zoom gesture runs `begin -> record* -> end`. The record of the gesture
//! only exists while it is active; `end` hands it back to the caller and
//! leaves the state idle again.

use crate::core::geo::Point;
use crate::core::viewport::ZoomParam;

/// Bookkeeping for one zoom gesture
#[derive(Debug, Clone, PartialEq)]
pub struct ZoomTransition {
    pub start_zoom: f64,
    pub end_zoom: f64,
    /// Platform offset captured when the gesture started
    pub platform_offset: Option<Point>,
    pending: Option<ZoomParam>,
    last: Option<ZoomParam>,
}

impl ZoomTransition {
    /// Whether the gesture ever produced an intermediate zoom frame
    pub fn has_animated(&self) -> bool {
        self.last.is_some()
    }

    /// Last zoom frame seen during this gesture
    pub fn last_param(&self) -> Option<&ZoomParam> {
        self.last.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum GestureState {
    #[default]
    Idle,
    Zooming(ZoomTransition),
}

impl GestureState {
    pub fn begin_zoom(&mut self, start_zoom: f64, end_zoom: f64, platform_offset: Option<Point>) {
        *self = GestureState::Zooming(ZoomTransition {
            start_zoom,
            end_zoom,
            platform_offset,
            pending: None,
            last: None,
        });
    }

    /// Record an intermediate zoom frame. Frames outside a gesture start an
    /// implicit one at the frame's own `from` zoom.
    pub fn record(&mut self, param: ZoomParam) {
        if let GestureState::Idle = self {
            self.begin_zoom(param.from, param.to, None);
        }
        if let GestureState::Zooming(transition) = self {
            transition.pending = Some(param);
            transition.last = Some(param);
        }
    }

    /// Consume the frame recorded since the last call
    pub fn take_pending(&mut self) -> Option<ZoomParam> {
        match self {
            GestureState::Zooming(transition) => transition.pending.take(),
            GestureState::Idle => None,
        }
    }

    pub fn transition(&self) -> Option<&ZoomTransition> {
        match self {
            GestureState::Zooming(transition) => Some(transition),
            GestureState::Idle => None,
        }
    }

    pub fn is_zooming(&self) -> bool {
        matches!(self, GestureState::Zooming(_))
    }

    /// Finish the gesture and hand back its record
    pub fn end(&mut self) -> Option<ZoomTransition> {
        match std::mem::take(self) {
            GestureState::Zooming(transition) => Some(transition),
            GestureState::Idle => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_without_frames() {
        let mut state = GestureState::default();
        state.begin_zoom(3.0, 4.0, Some(Point::new(5.0, 6.0)));
        assert!(state.is_zooming());

        let transition = state.end().unwrap();
        assert!(!transition.has_animated());
        assert_eq!(transition.platform_offset, Some(Point::new(5.0, 6.0)));
        assert_eq!(state, GestureState::Idle);
    }

    #[test]
    fn test_pending_frame_is_consumed_once() {
        let mut state = GestureState::default();
        state.begin_zoom(3.0, 4.0, None);
        state.record(ZoomParam::at(3.0, 4.0, 3.5, Point::zero()));

        assert!(state.take_pending().is_some());
        assert!(state.take_pending().is_none());
        assert!(state.transition().unwrap().has_animated());
    }

    #[test]
    fn test_record_outside_gesture_starts_one() {
        let mut state = GestureState::default();
        state.record(ZoomParam::at(2.0, 3.0, 2.5, Point::zero()));
        let transition = state.end().unwrap();
        assert_eq!(transition.start_zoom, 2.0);
        assert_eq!(transition.end_zoom, 3.0);
        assert!(state.end().is_none());
    }
}
