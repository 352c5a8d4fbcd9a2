//! Typed navigation events delivered to guidance consumers

use crate::core::Point2D;
use serde::{Deserialize, Serialize};

/// Turn-by-turn instruction category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstructionKind {
    ContinueStraight,
    BearLeft,
    BearRight,
    TurnLeft,
    TurnRight,
}

impl InstructionKind {
    /// Classify a turn angle in radians (counter-clockwise positive, so
    /// positive angles are to the left)
    pub fn from_turn_angle(turn_angle: f64, straight_tolerance: f64, turn_threshold: f64) -> Self {
        let magnitude = turn_angle.abs();
        let left = turn_angle > 0.0;
        if magnitude < straight_tolerance {
            InstructionKind::ContinueStraight
        } else if magnitude < turn_threshold {
            if left {
                InstructionKind::BearLeft
            } else {
                InstructionKind::BearRight
            }
        } else if left {
            InstructionKind::TurnLeft
        } else {
            InstructionKind::TurnRight
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            InstructionKind::ContinueStraight => "Continue straight",
            InstructionKind::BearLeft => "Bear left",
            InstructionKind::BearRight => "Bear right",
            InstructionKind::TurnLeft => "Turn left",
            InstructionKind::TurnRight => "Turn right",
        }
    }
}

impl std::fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.text())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NavigationEvent {
    PositionUpdated { point: Point2D, confidence: f32 },
    /// `bearing` is the world bearing to the next waypoint in radians
    InstructionChanged { kind: InstructionKind, bearing: f64 },
    Arrived,
    /// The agent left the path; plan again from `from` to `to`
    ReplanRequested { from: Point2D, to: Point2D },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_classification() {
        let classify = |a: f64| InstructionKind::from_turn_angle(a, 0.3, 1.0);
        assert_eq!(classify(0.0), InstructionKind::ContinueStraight);
        assert_eq!(classify(-0.29), InstructionKind::ContinueStraight);
        assert_eq!(classify(0.3), InstructionKind::BearLeft);
        assert_eq!(classify(-0.5), InstructionKind::BearRight);
        assert_eq!(classify(1.0), InstructionKind::TurnLeft);
        assert_eq!(classify(-2.5), InstructionKind::TurnRight);
    }

    #[test]
    fn test_event_json_shape() {
        let event = NavigationEvent::InstructionChanged {
            kind: InstructionKind::TurnLeft,
            bearing: 1.5,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"InstructionChanged":{"kind":"TurnLeft","bearing":1.5}}"#);
        assert_eq!(InstructionKind::BearRight.to_string(), "Bear right");
    }
}
