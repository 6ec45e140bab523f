use crate::{
    agent::agent_model::{Action, ActionCandidate, CoordinateSpace, Point},
    screen::screen_model::Resolution,
};

/// Maps coordinates between the frame the inference service saw and the
/// device's native pixel grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoordinateScaler {
    reference: Resolution,
    device: Resolution,
}

impl CoordinateScaler {
    pub fn new(reference: Resolution, device: Resolution) -> Self {
        Self { reference, device }
    }

    fn factors(&self) -> (f64, f64) {
        let sx = if self.reference.width == 0 {
            1.0
        } else {
            self.device.width as f64 / self.reference.width as f64
        };
        let sy = if self.reference.height == 0 {
            1.0
        } else {
            self.device.height as f64 / self.reference.height as f64
        };
        (sx, sy)
    }

    pub fn to_device(&self, point: Point) -> Point {
        let (sx, sy) = self.factors();
        Point {
            x: (point.x as f64 * sx).round() as i32,
            y: (point.y as f64 * sy).round() as i32,
        }
    }

    /// Reciprocal of [`CoordinateScaler::to_device`].
    pub fn to_reference(&self, point: Point) -> Point {
        let (sx, sy) = self.factors();
        Point {
            x: (point.x as f64 / sx).round() as i32,
            y: (point.y as f64 / sy).round() as i32,
        }
    }

    fn clamp(&self, point: Point) -> Point {
        Point {
            x: point.x.clamp(0, self.device.width.saturating_sub(1) as i32),
            y: point.y.clamp(0, self.device.height.saturating_sub(1) as i32),
        }
    }

    fn convert(&self, point: Point) -> Point {
        self.clamp(self.to_device(point))
    }
}

/// Bring a candidate into device-native pixels.
///
/// Candidates already in device space and actions without coordinates pass
/// through unchanged.
pub fn normalize_candidate(candidate: ActionCandidate, device: Resolution) -> ActionCandidate {
    let CoordinateSpace::Reference(reference) = candidate.space else {
        return candidate;
    };

    let scaler = CoordinateScaler::new(reference, device);
    let action = match candidate.action {
        Action::Tap { at } => Action::Tap { at: scaler.convert(at) },
        Action::TypeText { target, text } => Action::TypeText {
            target: target.map(|p| scaler.convert(p)),
            text,
        },
        other => other,
    };

    ActionCandidate {
        action,
        space: CoordinateSpace::Device,
        ..candidate
    }
}
