//! Core value model shared by the blend engine and its hosts.
//!
//! `Value` serializes externally tagged with lowercase keys, e.g.
//!   { "vec3": [1.0, 2.0, 3.0] }
//!   { "transform": { "pos": [...], "rot": [...], "scale": [...] } }
//!
//! Quaternions are stored as (x, y, z, w).

use crate::blend::{self, lerp_f32, lerp_vec2, lerp_vec3, lerp_vec4, nlerp_quat};
use serde::{Deserialize, Serialize};

/// A TRS transform. Composition and inversion treat scale as applied before
/// rotation; with non-uniform scale this is an approximation (no shear), which
/// is sufficient for pose blending and root-motion conjugation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Xform {
    pub pos: [f32; 3],
    pub rot: [f32; 4],
    pub scale: [f32; 3],
}

impl Xform {
    pub const IDENTITY: Xform = Xform {
        pos: [0.0, 0.0, 0.0],
        rot: blend::QUAT_IDENTITY,
        scale: [1.0, 1.0, 1.0],
    };

    /// self * other (apply `other` first, then `self`).
    pub fn compose(&self, other: &Xform) -> Xform {
        let scaled = [
            other.pos[0] * self.scale[0],
            other.pos[1] * self.scale[1],
            other.pos[2] * self.scale[2],
        ];
        let rotated = blend::quat_rotate_vec3(self.rot, scaled);
        Xform {
            pos: [
                self.pos[0] + rotated[0],
                self.pos[1] + rotated[1],
                self.pos[2] + rotated[2],
            ],
            rot: blend::normalize_quat(blend::quat_mul(self.rot, other.rot)),
            scale: [
                self.scale[0] * other.scale[0],
                self.scale[1] * other.scale[1],
                self.scale[2] * other.scale[2],
            ],
        }
    }

    /// Affine inverse under the TRS approximation. Scale components must be
    /// non-zero; zero components are passed through untouched.
    pub fn inverse(&self) -> Xform {
        let inv_scale = [
            safe_recip(self.scale[0]),
            safe_recip(self.scale[1]),
            safe_recip(self.scale[2]),
        ];
        let inv_rot = blend::quat_conjugate(self.rot);
        let p = blend::quat_rotate_vec3(inv_rot, self.pos);
        Xform {
            pos: [
                -p[0] * inv_scale[0],
                -p[1] * inv_scale[1],
                -p[2] * inv_scale[2],
            ],
            rot: inv_rot,
            scale: inv_scale,
        }
    }
}

impl Default for Xform {
    fn default() -> Self {
        Xform::IDENTITY
    }
}

#[inline]
fn safe_recip(v: f32) -> f32 {
    if v == 0.0 {
        0.0
    } else {
        v.recip()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    Float(f32),
    Int(i64),
    Bool(bool),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Quat([f32; 4]),
    ColorRgba([f32; 4]),
    Transform(Xform),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Float,
    Int,
    Bool,
    Vec2,
    Vec3,
    Vec4,
    Quat,
    ColorRgba,
    Transform,
    Text,
}

impl Value {
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Float(_) => ValueKind::Float,
            Value::Int(_) => ValueKind::Int,
            Value::Bool(_) => ValueKind::Bool,
            Value::Vec2(_) => ValueKind::Vec2,
            Value::Vec3(_) => ValueKind::Vec3,
            Value::Vec4(_) => ValueKind::Vec4,
            Value::Quat(_) => ValueKind::Quat,
            Value::ColorRgba(_) => ValueKind::ColorRgba,
            Value::Transform(_) => ValueKind::Transform,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Coerce to f32 for numeric parameters. Non-numeric kinds yield 0.
    pub fn to_f32(&self) -> f32 {
        match self {
            Value::Float(f) => *f,
            Value::Int(i) => *i as f32,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Coerce to i64 for index-like parameters. Floats truncate.
    pub fn to_i64(&self) -> i64 {
        match self {
            Value::Float(f) => *f as i64,
            Value::Int(i) => *i,
            Value::Bool(b) => *b as i64,
            _ => 0,
        }
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Float(f) => *f != 0.0,
            Value::Int(i) => *i != 0,
            Value::Bool(b) => *b,
            _ => false,
        }
    }

    /// Interpolate between two values of the same kind. Continuous kinds use
    /// component lerp (quats NLERP); discrete kinds (Int, Bool, Text) snap to
    /// the nearer endpoint. Mismatched kinds fail soft to the left value.
    pub fn interpolate(a: &Value, b: &Value, t: f32) -> Value {
        match (a, b) {
            (Value::Float(va), Value::Float(vb)) => Value::Float(lerp_f32(*va, *vb, t)),
            (Value::Vec2(va), Value::Vec2(vb)) => Value::Vec2(lerp_vec2(*va, *vb, t)),
            (Value::Vec3(va), Value::Vec3(vb)) => Value::Vec3(lerp_vec3(*va, *vb, t)),
            (Value::Vec4(va), Value::Vec4(vb)) => Value::Vec4(lerp_vec4(*va, *vb, t)),
            (Value::Quat(qa), Value::Quat(qb)) => Value::Quat(nlerp_quat(*qa, *qb, t)),
            (Value::ColorRgba(ca), Value::ColorRgba(cb)) => {
                Value::ColorRgba(lerp_vec4(*ca, *cb, t))
            }
            (Value::Transform(ta), Value::Transform(tb)) => Value::Transform(Xform {
                pos: lerp_vec3(ta.pos, tb.pos, t),
                rot: nlerp_quat(ta.rot, tb.rot, t),
                scale: lerp_vec3(ta.scale, tb.scale, t),
            }),
            (Value::Int(va), Value::Int(vb)) => Value::Int(if t < 0.5 { *va } else { *vb }),
            (Value::Bool(va), Value::Bool(vb)) => Value::Bool(if t < 0.5 { *va } else { *vb }),
            (Value::Text(va), Value::Text(vb)) => {
                Value::Text(if t < 0.5 { va.clone() } else { vb.clone() })
            }
            _ => a.clone(),
        }
    }
}
