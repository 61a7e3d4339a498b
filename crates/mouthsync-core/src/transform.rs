//! Remote object transforms

use serde::{Deserialize, Serialize};

/// Smallest bounding box edge written back to the remote side
pub const MIN_BOUNDS: f64 = 1.0;

/// Placement of a remote object inside its scene
///
/// Only `position_y` is ever changed by the pipeline. Everything else is
/// written back exactly as read, except for degenerate bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position_x: f64,
    pub position_y: f64,
    pub rotation: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    /// Bounding box width
    pub width: f64,
    /// Bounding box height
    pub height: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Transform {
            position_x: 0.0,
            position_y: 0.0,
            rotation: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            width: MIN_BOUNDS,
            height: MIN_BOUNDS,
        }
    }
}

impl Transform {
    pub fn at(position_x: f64, position_y: f64) -> Self {
        Transform {
            position_x,
            position_y,
            ..Default::default()
        }
    }

    /// Clamp near-zero or invalid bounds so placement never has zero area
    pub fn with_sane_bounds(mut self) -> Self {
        if !(self.width >= MIN_BOUNDS) {
            self.width = MIN_BOUNDS;
        }
        if !(self.height >= MIN_BOUNDS) {
            self.height = MIN_BOUNDS;
        }
        self
    }

    /// Copy with a new vertical position
    pub fn with_position_y(mut self, position_y: f64) -> Self {
        self.position_y = position_y;
        self
    }
}
