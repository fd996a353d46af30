//! Euler rotations in degrees.
//!
//! Axis convention: roll about X, pitch about Y, yaw about Z, applied roll first.
//! The Euler vector form used by control values is `[roll, pitch, yaw]`.

use nalgebra::UnitQuaternion;
use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rotator {
    #[serde(default)]
    pub pitch: f32,
    #[serde(default)]
    pub yaw: f32,
    #[serde(default)]
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Rotator = Rotator {
        pitch: 0.0,
        yaw: 0.0,
        roll: 0.0,
    };

    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    /// Build from an Euler vector `[roll, pitch, yaw]`.
    pub fn from_euler(euler: [f32; 3]) -> Self {
        Self {
            pitch: euler[1],
            yaw: euler[2],
            roll: euler[0],
        }
    }

    /// Euler vector `[roll, pitch, yaw]`.
    pub fn euler(&self) -> [f32; 3] {
        [self.roll, self.pitch, self.yaw]
    }

    pub fn from_quaternion(q: &UnitQuaternion<f32>) -> Self {
        let (roll, pitch, yaw) = q.euler_angles();
        Self {
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
            roll: roll.to_degrees(),
        }
    }

    pub fn to_quaternion(&self) -> UnitQuaternion<f32> {
        UnitQuaternion::from_euler_angles(
            self.roll.to_radians(),
            self.pitch.to_radians(),
            self.yaw.to_radians(),
        )
    }

    /// Wrap an angle into (-180, 180].
    pub fn normalize_axis(angle: f32) -> f32 {
        let mut wrapped = angle % 360.0;
        if wrapped < 0.0 {
            wrapped += 360.0;
        }
        if wrapped > 180.0 {
            wrapped -= 360.0;
        }
        wrapped
    }

    pub fn normalized(&self) -> Self {
        Self {
            pitch: Self::normalize_axis(self.pitch),
            yaw: Self::normalize_axis(self.yaw),
            roll: Self::normalize_axis(self.roll),
        }
    }

    /// Split into whole turns and the normalized remainder (`winding + remainder == self`).
    pub fn winding_and_remainder(&self) -> (Rotator, Rotator) {
        let remainder = self.normalized();
        let winding = *self - remainder;
        (winding, remainder)
    }

    pub fn approx_eq(&self, other: &Rotator, tolerance: f32) -> bool {
        (self.pitch - other.pitch).abs() <= tolerance
            && (self.yaw - other.yaw).abs() <= tolerance
            && (self.roll - other.roll).abs() <= tolerance
    }
}

impl Add for Rotator {
    type Output = Rotator;

    fn add(self, rhs: Self) -> Self::Output {
        Rotator::new(self.pitch + rhs.pitch, self.yaw + rhs.yaw, self.roll + rhs.roll)
    }
}

impl Sub for Rotator {
    type Output = Rotator;

    fn sub(self, rhs: Self) -> Self::Output {
        Rotator::new(self.pitch - rhs.pitch, self.yaw - rhs.yaw, self.roll - rhs.roll)
    }
}
