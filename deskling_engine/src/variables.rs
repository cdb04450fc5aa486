// The typed scripted-variable store.
//
// Every mascot carries a fixed array of variable slots. The first
// `SLOT_COUNT` slots are the named physical fields (position, velocity,
// targets, gravity, ...) with kinds fixed at construction; a species may
// append extra custom slots after them. Action nodes carry default bindings
// per slot and action references may override them; an override is honored
// only when its `used` flag is set.
//
// Invariant: a slot's numeric kind never changes after construction. Only
// the value, the used flag, and the bound script are mutated by overrides.

use crate::script::Expression;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of named slots. Custom species slots start at this index.
pub const SLOT_COUNT: usize = 24;

/// Named variable slots, in fixed id order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Slot {
    X = 0,
    Y = 1,
    TargetX = 2,
    TargetY = 3,
    Gravity = 4,
    FacingRight = 5,
    AirDragX = 6,
    AirDragY = 7,
    VelocityX = 8,
    VelocityY = 9,
    BornX = 10,
    BornY = 11,
    InitialVelX = 12,
    InitialVelY = 13,
    VelocityParam = 14,
    FootX = 15,
    FootDx = 16,
    ModX = 17,
    ModY = 18,
    Gap = 19,
    BornInterval = 20,
    BornCount = 21,
    WindowOffsetX = 22,
    WindowOffsetY = 23,
}

impl Slot {
    pub fn index(self) -> usize {
        self as usize
    }

    /// The fixed numeric kind of this named slot.
    pub fn kind(self) -> VarKind {
        match self {
            Slot::Gravity
            | Slot::AirDragX
            | Slot::AirDragY
            | Slot::VelocityX
            | Slot::VelocityY
            | Slot::InitialVelX
            | Slot::InitialVelY
            | Slot::VelocityParam
            | Slot::ModX
            | Slot::ModY => VarKind::Float,
            _ => VarKind::Int,
        }
    }

    /// All named slots in id order.
    pub const ALL: [Slot; SLOT_COUNT] = [
        Slot::X,
        Slot::Y,
        Slot::TargetX,
        Slot::TargetY,
        Slot::Gravity,
        Slot::FacingRight,
        Slot::AirDragX,
        Slot::AirDragY,
        Slot::VelocityX,
        Slot::VelocityY,
        Slot::BornX,
        Slot::BornY,
        Slot::InitialVelX,
        Slot::InitialVelY,
        Slot::VelocityParam,
        Slot::FootX,
        Slot::FootDx,
        Slot::ModX,
        Slot::ModY,
        Slot::Gap,
        Slot::BornInterval,
        Slot::BornCount,
        Slot::WindowOffsetX,
        Slot::WindowOffsetY,
    ];
}

/// Numeric kind of a slot. Fixed for the mascot's lifetime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarKind {
    Int,
    Float,
}

/// A typed value. Conversions truncate floats toward zero, matching the
/// assignment rule for scripted results.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum VarValue {
    Int(i32),
    Float(f32),
}

impl VarValue {
    pub fn as_i32(self) -> i32 {
        match self {
            VarValue::Int(v) => v,
            VarValue::Float(v) => v as i32,
        }
    }

    pub fn as_f32(self) -> f32 {
        match self {
            VarValue::Int(v) => v as f32,
            VarValue::Float(v) => v,
        }
    }

    fn coerced(self, kind: VarKind) -> VarValue {
        match kind {
            VarKind::Int => VarValue::Int(self.as_i32()),
            VarKind::Float => VarValue::Float(self.as_f32()),
        }
    }
}

/// One binding an action node or reference supplies for a slot: a literal
/// starting value, an optional script, and the used flag that decides
/// whether the binding participates in override resolution.
#[derive(Clone, Debug, Default)]
pub struct VarBinding {
    pub used: bool,
    pub expr: Option<Arc<Expression>>,
    pub value: Option<VarValue>,
}

impl VarBinding {
    /// A binding that defers to the next resolution layer.
    pub fn unused() -> Self {
        Self::default()
    }

    /// A used binding carrying a literal value.
    pub fn literal(value: VarValue) -> Self {
        Self {
            used: true,
            expr: None,
            value: Some(value),
        }
    }

    /// A used binding whose value comes from a script at action init.
    pub fn scripted(expr: Arc<Expression>) -> Self {
        Self {
            used: true,
            expr: Some(expr),
            value: None,
        }
    }
}

/// Per-slot binding table carried by action nodes (defaults) and action
/// references (overrides). Fixed length `SLOT_COUNT`.
#[derive(Clone, Debug)]
pub struct VarTable {
    entries: Vec<VarBinding>,
}

impl Default for VarTable {
    fn default() -> Self {
        Self::new()
    }
}

impl VarTable {
    pub fn new() -> Self {
        Self {
            entries: (0..SLOT_COUNT).map(|_| VarBinding::unused()).collect(),
        }
    }

    pub fn set(&mut self, slot: Slot, binding: VarBinding) {
        self.entries[slot.index()] = binding;
    }

    pub fn get(&self, slot: Slot) -> &VarBinding {
        &self.entries[slot.index()]
    }
}

/// Pick the effective binding for a slot: the reference override when its
/// used flag is set, otherwise the node default.
pub fn resolve<'a>(overrides: &'a VarTable, defaults: &'a VarTable, slot: Slot) -> &'a VarBinding {
    let candidate = overrides.get(slot);
    if candidate.used {
        candidate
    } else {
        defaults.get(slot)
    }
}

/// One live slot of a mascot.
#[derive(Clone, Debug)]
pub struct VarSlot {
    pub kind: VarKind,
    pub used: bool,
    pub expr: Option<Arc<Expression>>,
    pub value: VarValue,
}

impl VarSlot {
    fn fresh(kind: VarKind) -> Self {
        Self {
            kind,
            used: false,
            expr: None,
            value: match kind {
                VarKind::Int => VarValue::Int(0),
                VarKind::Float => VarValue::Float(0.0),
            },
        }
    }
}

/// The per-mascot slot array: the named layout plus any species extras.
#[derive(Clone, Debug)]
pub struct VariableStore {
    slots: Vec<VarSlot>,
}

impl VariableStore {
    pub fn with_layout(extra: &[VarKind]) -> Self {
        let mut slots: Vec<VarSlot> = Slot::ALL.iter().map(|s| VarSlot::fresh(s.kind())).collect();
        slots.extend(extra.iter().map(|k| VarSlot::fresh(*k)));
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VarSlot> {
        self.slots.iter()
    }

    pub fn slot(&self, slot: Slot) -> &VarSlot {
        &self.slots[slot.index()]
    }

    /// Integer read; float slots truncate toward zero.
    pub fn get_i(&self, slot: Slot) -> i32 {
        self.slots[slot.index()].value.as_i32()
    }

    /// Float read; int slots widen.
    pub fn get_f(&self, slot: Slot) -> f32 {
        self.slots[slot.index()].value.as_f32()
    }

    pub fn set_i(&mut self, slot: Slot, value: i32) {
        let s = &mut self.slots[slot.index()];
        s.value = VarValue::Int(value).coerced(s.kind);
    }

    pub fn set_f(&mut self, slot: Slot, value: f32) {
        let s = &mut self.slots[slot.index()];
        s.value = VarValue::Float(value).coerced(s.kind);
    }

    /// Store a scripted result using the slot's fixed kind: float verbatim,
    /// int truncated.
    pub(crate) fn store_result(&mut self, slot: Slot, result: f32) {
        let s = &mut self.slots[slot.index()];
        s.value = match s.kind {
            VarKind::Int => VarValue::Int(result as i32),
            VarKind::Float => VarValue::Float(result),
        };
    }

    /// Copy a binding into the live slot, keeping the slot's kind. The
    /// caller evaluates the bound script afterwards.
    pub(crate) fn adopt(&mut self, slot: Slot, binding: &VarBinding) {
        let kind = self.slots[slot.index()].kind;
        let s = &mut self.slots[slot.index()];
        s.used = binding.used;
        s.expr = binding.expr.clone();
        s.value = binding
            .value
            .map(|v| v.coerced(kind))
            .unwrap_or_else(|| match kind {
                VarKind::Int => VarValue::Int(0),
                VarKind::Float => VarValue::Float(0.0),
            });
    }

    /// Zero every slot and drop all bindings, keeping kinds.
    pub fn reset(&mut self) {
        for s in &mut self.slots {
            *s = VarSlot::fresh(s.kind);
        }
    }
}
