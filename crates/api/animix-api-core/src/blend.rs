//! Blend math shared by the animation core:
//! - scalar / vector lerp
//! - quaternion NLERP and SLERP with shortest-arc correction
//! - quaternion algebra (multiply, conjugate, rotate)
//! - time wrapping (fposmod) and audio gain conversion

/// Comparison epsilon used across the blend pipeline for "weight is zero"
/// style checks.
pub const CMP_EPSILON: f32 = 0.00001;

/// Linear interpolation of scalars.
#[inline]
pub fn lerp_f32(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[inline]
pub fn lerp_vec2(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [lerp_f32(a[0], b[0], t), lerp_f32(a[1], b[1], t)]
}

#[inline]
pub fn lerp_vec3(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
    ]
}

#[inline]
pub fn lerp_vec4(a: [f32; 4], b: [f32; 4], t: f32) -> [f32; 4] {
    [
        lerp_f32(a[0], b[0], t),
        lerp_f32(a[1], b[1], t),
        lerp_f32(a[2], b[2], t),
        lerp_f32(a[3], b[3], t),
    ]
}

#[inline]
pub fn dot4(a: [f32; 4], b: [f32; 4]) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

#[inline]
pub fn normalize_quat(mut q: [f32; 4]) -> [f32; 4] {
    let len2 = dot4(q, q);
    if len2 > 0.0 {
        let inv_len = len2.sqrt().recip();
        q[0] *= inv_len;
        q[1] *= inv_len;
        q[2] *= inv_len;
        q[3] *= inv_len;
    }
    q
}

/// Quaternion NLERP with shortest-arc correction (x,y,z,w).
#[inline]
pub fn nlerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    if dot4(a, b) < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
    }
    normalize_quat(lerp_vec4(a, b, t))
}

/// Quaternion SLERP with shortest-arc correction (x,y,z,w).
/// Falls back to NLERP when the inputs are nearly parallel.
pub fn slerp_quat(a: [f32; 4], mut b: [f32; 4], t: f32) -> [f32; 4] {
    let mut cos_theta = dot4(a, b);
    if cos_theta < 0.0 {
        b = [-b[0], -b[1], -b[2], -b[3]];
        cos_theta = -cos_theta;
    }
    if cos_theta > 0.9995 {
        return normalize_quat(lerp_vec4(a, b, t));
    }
    let theta = cos_theta.clamp(-1.0, 1.0).acos();
    let sin_theta = theta.sin();
    let wa = ((1.0 - t) * theta).sin() / sin_theta;
    let wb = (t * theta).sin() / sin_theta;
    [
        a[0] * wa + b[0] * wb,
        a[1] * wa + b[1] * wb,
        a[2] * wa + b[2] * wb,
        a[3] * wa + b[3] * wb,
    ]
}

/// Hamilton product a * b (x,y,z,w).
#[inline]
pub fn quat_mul(a: [f32; 4], b: [f32; 4]) -> [f32; 4] {
    let [ax, ay, az, aw] = a;
    let [bx, by, bz, bw] = b;
    [
        aw * bx + ax * bw + ay * bz - az * by,
        aw * by - ax * bz + ay * bw + az * bx,
        aw * bz + ax * by - ay * bx + az * bw,
        aw * bw - ax * bx - ay * by - az * bz,
    ]
}

/// Conjugate; for unit quaternions this is the inverse.
#[inline]
pub fn quat_conjugate(q: [f32; 4]) -> [f32; 4] {
    [-q[0], -q[1], -q[2], q[3]]
}

/// Rotate a vector by a unit quaternion.
#[inline]
pub fn quat_rotate_vec3(q: [f32; 4], v: [f32; 3]) -> [f32; 3] {
    // v' = q * (v, 0) * q^-1, expanded to avoid the intermediate products.
    let [qx, qy, qz, qw] = q;
    let ux = qy * v[2] - qz * v[1];
    let uy = qz * v[0] - qx * v[2];
    let uz = qx * v[1] - qy * v[0];
    let cx = qy * uz - qz * uy;
    let cy = qz * ux - qx * uz;
    let cz = qx * uy - qy * ux;
    [
        v[0] + 2.0 * (qw * ux + cx),
        v[1] + 2.0 * (qw * uy + cy),
        v[2] + 2.0 * (qw * uz + cz),
    ]
}

pub const QUAT_IDENTITY: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// Floating-point modulo that keeps the result in [0, b) for positive b,
/// matching the wrapping used for looped animation time.
#[inline]
pub fn fposmod(a: f32, b: f32) -> f32 {
    let r = a % b;
    if (r < 0.0 && b > 0.0) || (r > 0.0 && b < 0.0) {
        r + b
    } else {
        r
    }
}

/// Linear energy to decibels. Callers floor the input (e.g. at
/// `CMP_EPSILON`) before converting so a silent blend maps to a large
/// negative gain instead of -inf.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    linear.ln() * 8.685_889_6
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) {
        assert!((a - b).abs() < 1e-4, "expected {b}, got {a}");
    }

    #[test]
    fn slerp_endpoints_and_midpoint() {
        let a = QUAT_IDENTITY;
        // 90 degrees around Z.
        let b = [0.0, 0.0, std::f32::consts::FRAC_1_SQRT_2, std::f32::consts::FRAC_1_SQRT_2];
        let s0 = slerp_quat(a, b, 0.0);
        let s1 = slerp_quat(a, b, 1.0);
        let mid = slerp_quat(a, b, 0.5);
        for i in 0..4 {
            approx(s0[i], a[i]);
            approx(s1[i], b[i]);
        }
        // Midpoint is 45 degrees around Z.
        let half = [0.0, 0.0, (std::f32::consts::FRAC_PI_8).sin(), (std::f32::consts::FRAC_PI_8).cos()];
        for i in 0..4 {
            approx(mid[i], half[i]);
        }
    }

    #[test]
    fn slerp_takes_shortest_arc() {
        let a = QUAT_IDENTITY;
        let b = [0.0, 0.0, 0.0, -1.0]; // same rotation, opposite sign
        let mid = slerp_quat(a, b, 0.5);
        approx(mid[3].abs(), 1.0);
    }

    #[test]
    fn quat_mul_inverse_is_identity() {
        let q = normalize_quat([0.3, -0.2, 0.5, 0.8]);
        let r = quat_mul(q, quat_conjugate(q));
        approx(r[0], 0.0);
        approx(r[1], 0.0);
        approx(r[2], 0.0);
        approx(r[3], 1.0);
    }

    #[test]
    fn fposmod_wraps_negative() {
        approx(fposmod(-0.25, 1.0), 0.75);
        approx(fposmod(2.5, 1.0), 0.5);
        approx(fposmod(0.0, 1.0), 0.0);
    }

    #[test]
    fn linear_to_db_unity_is_zero() {
        approx(linear_to_db(1.0), 0.0);
        assert!(linear_to_db(0.00001) < -90.0);
    }
}
