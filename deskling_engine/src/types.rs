// Core identifier and geometry types shared across the engine.
//
// Identifiers are plain integers: mascots are few (a desktop holds dozens,
// not millions) and the host assigns surface and environment ids. Strong
// wrapper types keep the three id spaces from mixing.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one live mascot within a colony.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MascotId(pub u32);

/// Identifier of one output/environment known to the display layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EnvId(pub u32);

/// Identifier of one rendering surface owned by the display layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u32);

/// Identifier of one compiled script program owned by the script engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProgramId(pub u16);

impl fmt::Display for MascotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ProgramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Terrain classification of the point under a mascot, as reported by the
/// display layer. Actions that require a specific border use
/// `Option<Border>` on the node, `None` meaning "any".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Border {
    /// Open air: no surface at this point.
    None,
    Floor,
    Ceiling,
    Wall,
}

/// Result of a move-or-clamp request to the display layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveStatus {
    Ok,
    Clamped,
    Invalid,
}

/// Reply to a surface move: the status plus the position the surface
/// actually ended up at (differs from the request when clamped).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MoveReply {
    pub status: MoveStatus,
    pub x: i32,
    pub y: i32,
}

/// Coarse state of a mascot, used for pose-velocity rules and exposed in
/// snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MascotState {
    Idle,
    Stay,
    Move,
    Fall,
    Interact,
    Drag,
    DragResist,
    ScanMove,
    WindowFall,
    WindowWalk,
}

impl MascotState {
    /// States in which pose velocities must not overwrite the physics
    /// velocity slots (the integrator owns them while airborne).
    pub fn is_airborne(self) -> bool {
        matches!(self, Self::Fall | Self::WindowFall)
    }
}

/// Per-tick transition produced by an action handler and interpreted by the
/// driver. `Continue` is the only stable state; everything else makes the
/// driver act again within the same tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// Stay on this action; run its physics step this tick.
    Continue,
    /// This action is done; resume the parent at its next candidate.
    Next,
    /// State changed; redo the walk within the same tick.
    Reenter,
    /// Spawn a duplicate mascot, keep this action running.
    Clone,
    /// Swap this mascot's species; performed by the driver.
    Transform,
    /// Abandon the whole stack and break out of a drag grab.
    Escape,
}

/// Outward-facing event produced by one tick of one mascot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickEvent {
    /// A clone was created (Breed) and inserted into the colony.
    Spawned(MascotId),
    /// The mascot swapped species in place (Transform).
    Transformed(MascotId),
}

/// Axis-aligned box in mascot coordinates (x right, y up from the work-area
/// bottom edge).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y
    }

    pub fn top(&self) -> i32 {
        self.y + self.height
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left() && x <= self.right() && y >= self.bottom() && y <= self.top()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_contains_edges() {
        let b = BoundingBox::new(0, 0, 100, 50);
        assert!(b.contains(0, 0));
        assert!(b.contains(100, 50));
        assert!(!b.contains(101, 0));
        assert!(!b.contains(0, -1));
    }

    #[test]
    fn airborne_states() {
        assert!(MascotState::Fall.is_airborne());
        assert!(MascotState::WindowFall.is_airborne());
        assert!(!MascotState::Move.is_airborne());
        assert!(!MascotState::ScanMove.is_airborne());
    }

    #[test]
    fn id_ordering_is_numeric() {
        assert!(MascotId(1) < MascotId(2));
    }
}
