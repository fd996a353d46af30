//! Blending utilities for transforms.
//! - f32 / vector linear interpolation
//! - quaternion slerp (shortest-arc, nlerp when nearly parallel)
//! - transform TRS interpolation
//! - weighted multi-parent blending with independent location/rotation/scale weights

use nalgebra::{Quaternion, UnitQuaternion, Vector3, Vector4};
use serde::{Deserialize, Serialize};

use crate::transform::{Transform, SMALL_NUMBER};

/// Per-channel weight of one parent.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElementWeight {
    pub location: f32,
    pub rotation: f32,
    pub scale: f32,
}

impl ElementWeight {
    pub const FULL: ElementWeight = ElementWeight {
        location: 1.0,
        rotation: 1.0,
        scale: 1.0,
    };
    pub const ZERO: ElementWeight = ElementWeight {
        location: 0.0,
        rotation: 0.0,
        scale: 0.0,
    };

    pub fn uniform(weight: f32) -> Self {
        Self {
            location: weight,
            rotation: weight,
            scale: weight,
        }
    }

    pub fn is_almost_zero(&self) -> bool {
        self.location.abs() <= SMALL_NUMBER
            && self.rotation.abs() <= SMALL_NUMBER
            && self.scale.abs() <= SMALL_NUMBER
    }

    pub fn is_full(&self) -> bool {
        (self.location - 1.0).abs() <= SMALL_NUMBER
            && (self.rotation - 1.0).abs() <= SMALL_NUMBER
            && (self.scale - 1.0).abs() <= SMALL_NUMBER
    }
}

impl Default for ElementWeight {
    fn default() -> Self {
        ElementWeight::FULL
    }
}

/// Linear interpolation for f32
#[inline]
pub fn lerp_f(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec3(a: &Vector3<f32>, b: &Vector3<f32>, t: f32) -> Vector3<f32> {
    a + (b - a) * t
}

fn normalize_quat(q: Vector4<f32>) -> UnitQuaternion<f32> {
    if q.norm_squared() <= SMALL_NUMBER {
        UnitQuaternion::identity()
    } else {
        UnitQuaternion::new_normalize(Quaternion::from(q))
    }
}

/// Slerp between two unit quaternions along the shorter arc.
pub fn slerp(a: &UnitQuaternion<f32>, b: &UnitQuaternion<f32>, t: f32) -> UnitQuaternion<f32> {
    let qa = a.coords;
    let mut qb = b.coords;

    let mut dot = qa.dot(&qb);
    if dot < 0.0 {
        qb = -qb;
        dot = -dot;
    }

    // If quaternions are close, use lerp
    const DOT_THRESHOLD: f32 = 0.9995;
    if dot > DOT_THRESHOLD {
        return normalize_quat(qa + (qb - qa) * t);
    }

    let theta_0 = dot.clamp(-1.0, 1.0).acos();
    let theta = theta_0 * t;
    let sin_theta_0 = theta_0.sin();
    let s0 = (theta_0 - theta).sin() / sin_theta_0;
    let s1 = theta.sin() / sin_theta_0;
    normalize_quat(qa * s0 + qb * s1)
}

/// Interpolate two transforms (translation/scale lerp, rotation slerp).
pub fn lerp_transform(a: &Transform, b: &Transform, t: f32) -> Transform {
    Transform {
        translation: lerp_vec3(&a.translation, &b.translation, t),
        rotation: slerp(&a.rotation, &b.rotation, t),
        scale: lerp_vec3(&a.scale, &b.scale, t),
    }
}

/// Blend frames by per-channel weights.
///
/// Per channel, only entries with a non-zero weight take part:
/// none yields the channel of `fallback`, one is taken as-is, and several are
/// combined as a weighted average normalized by the total weight. Rotations
/// are sign-aligned to the first contributor before summing.
pub fn blend_weighted(frames: &[(Transform, ElementWeight)], fallback: &Transform) -> Transform {
    let mut result = *fallback;

    let mut location_total = 0.0f32;
    let mut location_sum = Vector3::zeros();
    let mut scale_total = 0.0f32;
    let mut scale_sum = Vector3::zeros();
    let mut rotation_total = 0.0f32;
    let mut rotation_sum = Vector4::zeros();
    let mut rotation_reference: Option<Vector4<f32>> = None;

    for (frame, weight) in frames {
        if weight.location > SMALL_NUMBER {
            location_total += weight.location;
            location_sum += frame.translation * weight.location;
        }
        if weight.scale > SMALL_NUMBER {
            scale_total += weight.scale;
            scale_sum += frame.scale * weight.scale;
        }
        if weight.rotation > SMALL_NUMBER {
            let q = frame.rotation.coords;
            let reference = *rotation_reference.get_or_insert(q);
            let aligned = if reference.dot(&q) < 0.0 { -q } else { q };
            rotation_total += weight.rotation;
            rotation_sum += aligned * weight.rotation;
        }
    }

    if location_total > SMALL_NUMBER {
        result.translation = location_sum / location_total;
    }
    if scale_total > SMALL_NUMBER {
        result.scale = scale_sum / scale_total;
    }
    if rotation_total > SMALL_NUMBER {
        result.rotation = normalize_quat(rotation_sum);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn single_contributor_passes_through() {
        let t = Transform::new(
            Vector3::new(1.0, 2.0, 3.0),
            UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3),
            Vector3::new(2.0, 2.0, 2.0),
        );
        let out = blend_weighted(&[(t, ElementWeight::uniform(0.25))], &Transform::identity());
        assert!(out.approx_eq(&t, 1e-5));
    }

    #[test]
    fn two_parents_average_location() {
        let a = Transform::from_translation(Vector3::new(0.0, 0.0, 0.0));
        let b = Transform::from_translation(Vector3::new(10.0, 0.0, 0.0));
        let out = blend_weighted(&[
            (a, ElementWeight::uniform(0.5)),
            (b, ElementWeight::uniform(0.5)),
        ], &Transform::identity());
        assert_relative_eq!(out.translation.x, 5.0, epsilon = 1e-5);
        let out = blend_weighted(&[
            (a, ElementWeight::uniform(0.25)),
            (b, ElementWeight::uniform(0.75)),
        ], &Transform::identity());
        assert_relative_eq!(out.translation.x, 7.5, epsilon = 1e-5);
    }

    #[test]
    fn zero_weight_channels_use_fallback() {
        let a = Transform::from_translation(Vector3::new(3.0, 0.0, 0.0));
        let out = blend_weighted(&[(a, ElementWeight::ZERO)], &Transform::identity());
        assert!(out.is_identity(1e-6));

        let offset = Transform::from_translation(Vector3::new(0.0, 4.0, 0.0));
        let out = blend_weighted(&[(a, ElementWeight::ZERO)], &offset);
        assert!(out.approx_eq(&offset, 1e-6));
    }

    #[test]
    fn rotations_blend_on_short_arc() {
        let a = UnitQuaternion::identity();
        let b = UnitQuaternion::from_euler_angles(0.0, 0.0, FRAC_PI_2);
        let mid = slerp(&a, &b, 0.5);
        assert_relative_eq!(mid.angle(), FRAC_PI_2 / 2.0, epsilon = 1e-4);

        // Negated quaternion represents the same rotation.
        let neg_b = UnitQuaternion::new_unchecked(-b.into_inner());
        let blended = blend_weighted(&[
            (Transform::from_rotation(b), ElementWeight::uniform(0.5)),
            (Transform::from_rotation(neg_b), ElementWeight::uniform(0.5)),
        ], &Transform::identity());
        assert!(blended.rotation.angle_to(&b) < 1e-3);
    }

    #[test]
    fn lerp_transform_endpoints() {
        let a = Transform::from_translation(Vector3::new(1.0, 0.0, 0.0));
        let b = Transform::from_scale(Vector3::new(3.0, 3.0, 3.0));
        assert!(lerp_transform(&a, &b, 0.0).approx_eq(&a, 1e-6));
        assert!(lerp_transform(&a, &b, 1.0).approx_eq(&b, 1e-6));
    }
}
