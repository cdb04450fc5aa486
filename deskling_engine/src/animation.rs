// Animations, poses, and clickable hotspots.
//
// An animation is an ordered run of poses with an optional guard condition.
// Leaf actions scan their content in declared order and play the first
// animation whose guard passes (first match wins, not best match). Whenever
// the selected animation changes, the frame index restarts at 0.

use crate::script::Expression;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One frame: sprite cell, anchor point, per-frame velocity, and how many
/// ticks the frame stays up.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Index into the species atlas.
    pub sprite: u32,
    pub anchor_x: i32,
    pub anchor_y: i32,
    /// Velocity the pose imposes while it is displayed. Ignored by the
    /// airborne states, whose integrator owns the velocity slots.
    pub velocity_x: i32,
    pub velocity_y: i32,
    /// Display duration in ticks.
    pub duration: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotspotShape {
    Rectangle,
    Ellipse,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HotspotButton {
    Left,
    Middle,
    Right,
}

/// A clickable region bound to a behavior, active while its animation is
/// displayed.
#[derive(Clone, Debug)]
pub struct Hotspot {
    pub shape: HotspotShape,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub behavior: String,
    pub button: HotspotButton,
}

impl Hotspot {
    /// Hit test in surface-local coordinates.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        match self.shape {
            HotspotShape::Rectangle => {
                x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
            }
            HotspotShape::Ellipse => {
                let a = self.width / 2;
                let b = self.height / 2;
                if a == 0 || b == 0 {
                    return false;
                }
                let h = self.x + a;
                let k = self.y + b;
                ((x - h) * (x - h)) / (a * a) + ((y - k) * (y - k)) / (b * b) <= 1
            }
        }
    }
}

/// An ordered run of poses with an optional guard condition.
#[derive(Clone, Debug)]
pub struct Animation {
    pub condition: Option<Arc<Expression>>,
    pub frames: Vec<Pose>,
    pub hotspots: Vec<Hotspot>,
}

impl Animation {
    pub fn new(frames: Vec<Pose>) -> Self {
        Self {
            condition: None,
            frames,
            hotspots: Vec::new(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}
