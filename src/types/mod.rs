//! Shared types used throughout the library.

mod transform;

pub use transform::Transform;

use serde::{Deserialize, Serialize};

/// Number of decimal digits written for every number in the output.
pub const DECIMAL_DIGITS: usize = 4;

/// Two floats closer than this are treated as equal (half the output resolution).
pub const EPSILON: f32 = 0.5e-4;

/// Distance below which vertices are merged when welding degenerate faces.
pub const WELD_DISTANCE: f32 = 1e-4;

/// Identity of a scene node: its index in the scene's node list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl From<usize> for NodeId {
    fn from(index: usize) -> Self {
        Self(index as u32)
    }
}

/// Identity of a material in the scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterialId(pub u32);

/// Compare two floats at output precision.
pub fn approx_eq(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

/// An RGB color with components in 0..1.
pub type Color = [f32; 3];
