// Engine-wide feature toggles and limits.
//
// The host loads these from its settings store and passes them by reference
// into every tick. Nothing here is per-mascot; per-species tuning lives in
// the prototype and per-call-site tuning in action references.

use serde::{Deserialize, Serialize};

/// Global knobs consulted by the tick driver and the action kinds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Allow the Breed action to create clones.
    pub breeding: bool,
    /// Hard cap on the number of live mascots; Breed exits silently at the
    /// cap.
    pub mascot_limit: u32,
    /// Allow mascot-to-mascot interaction (affordance lookups return no
    /// target when disabled).
    pub interactions: bool,
    /// Allow the window-carry action kinds (WindowFall, WindowWalk). When
    /// disabled those actions redirect to the plain fall behavior.
    pub window_interactions: bool,
    /// Allow the user to pick mascots up.
    pub dragging: bool,
    /// Treat all outputs as one continuous coordinate space; affordance
    /// lookups may then cross environments.
    pub unified_outputs: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            breeding: true,
            mascot_limit: 50,
            interactions: true,
            window_interactions: false,
            dragging: true,
            unified_outputs: false,
        }
    }
}
