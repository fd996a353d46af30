//! Translation / rotation / scale transforms.
//!
//! Composition is parent-last: `child * parent` expresses `child` (given in the
//! space of `parent`) in the space `parent` is expressed in. `a.relative_to(b)`
//! is the exact inverse: `a.relative_to(b) * b == a`.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::ops::Mul;

use crate::rotator::Rotator;

/// Threshold below which a value is treated as zero.
pub const SMALL_NUMBER: f32 = 1.0e-8;
/// Default tolerance for transform comparisons.
pub const KINDA_SMALL_NUMBER: f32 = 1.0e-4;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "TransformRepr", into = "TransformRepr")]
pub struct Transform {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
    pub scale: Vector3<f32>,
}

#[derive(Serialize, Deserialize)]
struct TransformRepr {
    #[serde(default)]
    translation: [f32; 3],
    #[serde(default = "identity_quat")]
    rotation: [f32; 4],
    #[serde(default = "unit_scale")]
    scale: [f32; 3],
}

fn identity_quat() -> [f32; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

fn unit_scale() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

/// Build a unit quaternion from `[x, y, z, w]`, falling back to identity for degenerate input.
pub fn quat_from_xyzw(q: [f32; 4]) -> UnitQuaternion<f32> {
    let raw = Quaternion::new(q[3], q[0], q[1], q[2]);
    if raw.norm_squared() <= SMALL_NUMBER {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::new_normalize(raw)
    }
}

pub fn quat_to_xyzw(q: &UnitQuaternion<f32>) -> [f32; 4] {
    [q.i, q.j, q.k, q.w]
}

fn vec3(v: [f32; 3]) -> Vector3<f32> {
    Vector3::new(v[0], v[1], v[2])
}

fn arr3(v: &Vector3<f32>) -> [f32; 3] {
    [v.x, v.y, v.z]
}

impl From<TransformRepr> for Transform {
    fn from(repr: TransformRepr) -> Self {
        Transform {
            translation: vec3(repr.translation),
            rotation: quat_from_xyzw(repr.rotation),
            scale: vec3(repr.scale),
        }
    }
}

impl From<Transform> for TransformRepr {
    fn from(t: Transform) -> Self {
        TransformRepr {
            translation: arr3(&t.translation),
            rotation: quat_to_xyzw(&t.rotation),
            scale: arr3(&t.scale),
        }
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

#[inline]
fn safe_reciprocal(v: &Vector3<f32>) -> Vector3<f32> {
    v.map(|c| if c.abs() <= SMALL_NUMBER { 0.0 } else { 1.0 / c })
}

impl Transform {
    pub fn new(translation: Vector3<f32>, rotation: UnitQuaternion<f32>, scale: Vector3<f32>) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn from_translation(translation: Vector3<f32>) -> Self {
        Self {
            translation,
            ..Self::identity()
        }
    }

    pub fn from_rotation(rotation: UnitQuaternion<f32>) -> Self {
        Self {
            rotation,
            ..Self::identity()
        }
    }

    pub fn from_scale(scale: Vector3<f32>) -> Self {
        Self {
            scale,
            ..Self::identity()
        }
    }

    /// Express `self` (relative to `parent`) in the space `parent` is expressed in.
    pub fn compose(&self, parent: &Transform) -> Transform {
        Transform {
            translation: parent.rotation * parent.scale.component_mul(&self.translation)
                + parent.translation,
            rotation: parent.rotation * self.rotation,
            scale: self.scale.component_mul(&parent.scale),
        }
    }

    /// `self` expressed relative to `other`, i.e. `self * other^-1`.
    pub fn relative_to(&self, other: &Transform) -> Transform {
        let inv_rotation = other.rotation.inverse();
        let inv_scale = safe_reciprocal(&other.scale);
        Transform {
            translation: (inv_rotation * (self.translation - other.translation))
                .component_mul(&inv_scale),
            rotation: inv_rotation * self.rotation,
            scale: self.scale.component_mul(&inv_scale),
        }
    }

    pub fn inverse(&self) -> Transform {
        Transform::identity().relative_to(self)
    }

    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * self.scale.component_mul(point) + self.translation
    }

    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.rotation * self.scale.component_mul(vector)
    }

    pub fn normalize_rotation(&mut self) {
        self.rotation = UnitQuaternion::new_normalize(self.rotation.into_inner());
    }

    pub fn with_normalized_rotation(mut self) -> Self {
        self.normalize_rotation();
        self
    }

    pub fn rotator(&self) -> Rotator {
        Rotator::from_quaternion(&self.rotation)
    }

    pub fn is_identity(&self, tolerance: f32) -> bool {
        self.approx_eq(&Transform::identity(), tolerance)
    }

    pub fn approx_eq(&self, other: &Transform, tolerance: f32) -> bool {
        (self.translation - other.translation).amax() <= tolerance
            && (self.scale - other.scale).amax() <= tolerance
            && self.rotation.angle_to(&other.rotation) <= tolerance.max(1.0e-3)
    }
}

impl Mul for Transform {
    type Output = Transform;

    fn mul(self, rhs: Transform) -> Transform {
        self.compose(&rhs)
    }
}

impl Mul<&Transform> for &Transform {
    type Output = Transform;

    fn mul(self, rhs: &Transform) -> Transform {
        self.compose(rhs)
    }
}

/// Translation and rotation only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "NoScaleRepr", into = "NoScaleRepr")]
pub struct TransformNoScale {
    pub translation: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

#[derive(Serialize, Deserialize)]
struct NoScaleRepr {
    #[serde(default)]
    translation: [f32; 3],
    #[serde(default = "identity_quat")]
    rotation: [f32; 4],
}

impl From<NoScaleRepr> for TransformNoScale {
    fn from(repr: NoScaleRepr) -> Self {
        TransformNoScale {
            translation: vec3(repr.translation),
            rotation: quat_from_xyzw(repr.rotation),
        }
    }
}

impl From<TransformNoScale> for NoScaleRepr {
    fn from(t: TransformNoScale) -> Self {
        NoScaleRepr {
            translation: arr3(&t.translation),
            rotation: quat_to_xyzw(&t.rotation),
        }
    }
}

impl Default for TransformNoScale {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }
}

impl From<Transform> for TransformNoScale {
    fn from(t: Transform) -> Self {
        Self {
            translation: t.translation,
            rotation: t.rotation,
        }
    }
}

impl From<TransformNoScale> for Transform {
    fn from(t: TransformNoScale) -> Self {
        Transform {
            translation: t.translation,
            rotation: t.rotation,
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

/// Translation, Euler rotation and scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "EulerRepr", into = "EulerRepr")]
pub struct EulerTransform {
    pub translation: Vector3<f32>,
    pub rotation: Rotator,
    pub scale: Vector3<f32>,
}

#[derive(Serialize, Deserialize)]
struct EulerRepr {
    #[serde(default)]
    translation: [f32; 3],
    #[serde(default)]
    rotation: Rotator,
    #[serde(default = "unit_scale")]
    scale: [f32; 3],
}

impl From<EulerRepr> for EulerTransform {
    fn from(repr: EulerRepr) -> Self {
        EulerTransform {
            translation: vec3(repr.translation),
            rotation: repr.rotation,
            scale: vec3(repr.scale),
        }
    }
}

impl From<EulerTransform> for EulerRepr {
    fn from(t: EulerTransform) -> Self {
        EulerRepr {
            translation: arr3(&t.translation),
            rotation: t.rotation,
            scale: arr3(&t.scale),
        }
    }
}

impl Default for EulerTransform {
    fn default() -> Self {
        Self {
            translation: Vector3::zeros(),
            rotation: Rotator::ZERO,
            scale: Vector3::new(1.0, 1.0, 1.0),
        }
    }
}

impl From<EulerTransform> for Transform {
    fn from(t: EulerTransform) -> Self {
        Transform {
            translation: t.translation,
            rotation: t.rotation.to_quaternion(),
            scale: t.scale,
        }
    }
}

impl From<Transform> for EulerTransform {
    fn from(t: Transform) -> Self {
        EulerTransform {
            translation: t.translation,
            rotation: Rotator::from_quaternion(&t.rotation),
            scale: t.scale,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    fn sample() -> Transform {
        Transform::new(
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.3, -0.2, 1.1),
            Vector3::new(2.0, 1.0, 0.5),
        )
    }

    #[test]
    fn compose_translates_then_rotates() {
        let child = Transform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let parent = Transform::new(
            Vector3::new(0.0, 0.0, 10.0),
            UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let global = child * parent;
        assert_relative_eq!(global.translation, Vector3::new(0.0, 2.0, 10.0), epsilon = 1e-5);
        assert_relative_eq!(global.scale, Vector3::new(2.0, 2.0, 2.0));
    }

    #[test]
    fn relative_inverts_compose() {
        let a = sample();
        let b = Transform::new(
            Vector3::new(-4.0, 0.5, 2.0),
            UnitQuaternion::from_euler_angles(-0.7, 0.4, 0.1),
            Vector3::new(1.5, 1.5, 3.0),
        );
        let local = a.relative_to(&b);
        assert!((local * b).approx_eq(&a, 1e-4));
    }

    #[test]
    fn inverse_of_identity_is_identity() {
        assert!(Transform::identity().inverse().is_identity(1e-6));
        let t = sample();
        assert!((t.inverse() * t).is_identity(1e-4));
    }

    #[test]
    fn serde_defaults_fill_missing_channels() {
        let t: Transform = serde_json::from_str(r#"{"translation":[0,0,5]}"#).unwrap();
        assert_eq!(t.translation, Vector3::new(0.0, 0.0, 5.0));
        assert_eq!(t.scale, Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(t.rotation, UnitQuaternion::identity());

        let degenerate: Transform = serde_json::from_str(r#"{"rotation":[0,0,0,0]}"#).unwrap();
        assert_eq!(degenerate.rotation, UnitQuaternion::identity());
    }

    #[test]
    fn euler_transform_round_trip() {
        let e = EulerTransform {
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Rotator::new(10.0, 20.0, 30.0),
            scale: Vector3::new(1.0, 2.0, 1.0),
        };
        let back = EulerTransform::from(Transform::from(e));
        assert!(back.rotation.approx_eq(&e.rotation, 1e-3));
        assert_eq!(back.scale, e.scale);
    }
}
