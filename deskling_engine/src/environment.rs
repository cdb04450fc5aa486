// Display-layer boundary.
//
// The engine never talks to a window system directly. The host implements
// `Environment` over its compositor session and the engine calls through it
// for terrain classification, geometry, surface movement, pointer sampling,
// and the foreign window used by the window-carry actions.
//
// Coordinate convention: mascot coordinates have x growing right and y
// growing up from the work-area bottom edge. `flip_y` converts between
// mascot y and screen y (the same formula in both directions).

use crate::animation::Pose;
use crate::types::{Border, BoundingBox, EnvId, MoveReply, MoveStatus, SurfaceId};

/// The host window being carried by WindowFall/WindowWalk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ForeignWindow {
    /// Screen coordinates of the top-left corner.
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub active: bool,
    /// Set when something other than the engine moved the window.
    pub moved: bool,
}

/// Everything the engine needs from the window system. One implementation
/// serves all environments (outputs), keyed by `EnvId`.
///
/// No method may block: all of this runs inside the tick budget.
pub trait Environment {
    /// Terrain classification at a point, in mascot coordinates.
    fn border_type(&self, env: EnvId, x: i32, y: i32) -> Border;

    /// Full output size, `(width, height)`.
    fn screen_size(&self, env: EnvId) -> (i32, i32);

    /// Usable area in mascot coordinates (excludes panels and docks).
    fn workarea(&self, env: EnvId) -> BoundingBox;

    /// Output scale factor.
    fn screen_scale(&self, env: EnvId) -> f32;

    /// Offset of `from`'s origin relative to `to`'s origin in the unified
    /// coordinate space.
    fn coordinate_delta(&self, from: EnvId, to: EnvId) -> (i32, i32);

    fn create_surface(&mut self, env: EnvId) -> SurfaceId;

    fn destroy_surface(&mut self, surface: SurfaceId);

    /// Show a pose on a surface, mirrored when facing right.
    fn present_pose(&mut self, surface: SurfaceId, pose: &Pose, facing_right: bool);

    /// Move a surface with clamping. The reply carries the position the
    /// surface actually ended up at.
    fn move_surface(&mut self, surface: SurfaceId, x: i32, y: i32, interpolate: bool) -> MoveReply;

    /// Teleport a surface with no clamping or interpolation.
    fn place_surface(&mut self, surface: SurfaceId, x: i32, y: i32);

    /// Drop any pending interpolation toward an older position.
    fn reset_interpolation(&mut self, surface: SurfaceId);

    /// Release a pointer grab on a surface (end of drag).
    fn release_surface(&mut self, surface: SurfaceId);

    /// Pointer movement since the last sample for the surface being
    /// dragged, in mascot coordinates.
    fn pointer_delta(&mut self, surface: SurfaceId, tick: u32) -> (i32, i32);

    /// The currently designated foreign window on this output, if any.
    fn foreign_window(&self, env: EnvId) -> Option<ForeignWindow>;

    /// Ask the host to move the foreign window (screen coordinates).
    fn move_foreign_window(&mut self, env: EnvId, x: i32, y: i32) -> MoveStatus;

    /// Whether the foreign window may be moved right now.
    fn foreign_window_movable(&self, env: EnvId) -> bool;
}

/// Convert between mascot y (up from the work-area bottom) and screen y
/// (down from the top). The `-1` sentinel passes through unchanged.
pub fn flip_y(workarea_height: i32, y: i32) -> i32 {
    if y == -1 {
        return -1;
    }
    workarea_height - y
}
