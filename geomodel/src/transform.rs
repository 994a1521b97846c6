//! Placement transforms.
//!
//! Pure functions that write placement parameters into a [`NodeTransform`].
//! They are applied in a fixed order when a model is placed:
//! scale, rotation, heading, position, height. Heading only rewrites the Y
//! rotation, so it composes with an earlier rotation vector.
//!
//! Optional inputs distinguish "omitted" from "zero": `apply_rotation(None)`
//! and `apply_height(None)` leave the transform untouched and return `false`.

use glam::DVec3;

use crate::asset::NodeTransform;

/// Model scale, uniform or per axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scale {
    Uniform(f64),
    PerAxis(DVec3),
}

impl Scale {
    /// Broadcasts uniform scales to all three axes.
    pub fn to_vec3(self) -> DVec3 {
        match self {
            Scale::Uniform(s) => DVec3::splat(s),
            Scale::PerAxis(v) => v,
        }
    }
}

impl Default for Scale {
    fn default() -> Self {
        Scale::Uniform(1.0)
    }
}

impl From<f64> for Scale {
    fn from(value: f64) -> Self {
        Scale::Uniform(value)
    }
}

impl From<[f64; 3]> for Scale {
    fn from(value: [f64; 3]) -> Self {
        Scale::PerAxis(DVec3::from(value))
    }
}

impl From<DVec3> for Scale {
    fn from(value: DVec3) -> Self {
        Scale::PerAxis(value)
    }
}

/// Rotation in degrees. A missing axis counts as zero.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotation {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
}

impl Rotation {
    pub const ZERO: Rotation = Rotation {
        x: Some(0.0),
        y: Some(0.0),
        z: Some(0.0),
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x: Some(x),
            y: Some(y),
            z: Some(z),
        }
    }

    /// Euler angles in radians.
    pub fn to_radians(self) -> DVec3 {
        DVec3::new(
            self.x.unwrap_or(0.0).to_radians(),
            self.y.unwrap_or(0.0).to_radians(),
            self.z.unwrap_or(0.0).to_radians(),
        )
    }
}

impl From<[f64; 3]> for Rotation {
    fn from(value: [f64; 3]) -> Self {
        Rotation::new(value[0], value[1], value[2])
    }
}

pub fn apply_scale(transform: &mut NodeTransform, scale: Scale) {
    transform.scale = scale.to_vec3();
}

/// Returns `false` when `rotation` is omitted and nothing changed.
pub fn apply_rotation(transform: &mut NodeTransform, rotation: Option<Rotation>) -> bool {
    match rotation {
        Some(rotation) => {
            transform.rotation = rotation.to_radians();
            true
        }
        None => false,
    }
}

/// Sets the Y rotation from a heading in degrees, keeping X and Z.
pub fn apply_heading(transform: &mut NodeTransform, heading_deg: f64) {
    let current = transform.rotation;
    transform.rotation = DVec3::new(current.x, heading_deg.to_radians(), current.z);
}

/// Sets scene X/Y; the vertical coordinate is left to [`apply_height`].
pub fn apply_position(transform: &mut NodeTransform, scene_xy: [f64; 2]) {
    transform.position.x = scene_xy[0];
    transform.position.y = scene_xy[1];
}

/// Returns `false` when `height` is omitted and nothing changed.
pub fn apply_height(transform: &mut NodeTransform, height: Option<f64>) -> bool {
    match height {
        Some(height) => {
            transform.position.z = height;
            true
        }
        None => false,
    }
}
