//! Track sampling: continuous interpolation for transform/value/bezier
//! tracks and key-range queries for discrete replay (value, method, audio,
//! nested-animation tracks).

use crate::data::{BezierKey, TransformKey, ValueKey};
use animix_api_core::blend::{fposmod, lerp_vec3, slerp_quat};
use animix_api_core::Value;

/// Index of the last key with `time <= t`, or None if `t` precedes all keys.
pub fn find_key<K>(keys: &[K], t: f32, time_of: impl Fn(&K) -> f32) -> Option<usize> {
    let mut found = None;
    for (i, k) in keys.iter().enumerate() {
        if time_of(k) <= t {
            found = Some(i);
        } else {
            break;
        }
    }
    found
}

fn neighbors<K>(keys: &[K], t: f32, time_of: impl Fn(&K) -> f32) -> Option<(usize, usize, f32)> {
    if keys.is_empty() {
        return None;
    }
    let idx = match find_key(keys, t, &time_of) {
        None => return Some((0, 0, 0.0)),
        Some(i) => i,
    };
    if idx + 1 >= keys.len() {
        return Some((idx, idx, 0.0));
    }
    let t0 = time_of(&keys[idx]);
    let t1 = time_of(&keys[idx + 1]);
    let span = t1 - t0;
    let c = if span > 0.0 {
        ((t - t0) / span).clamp(0.0, 1.0)
    } else {
        0.0
    };
    Some((idx, idx + 1, c))
}

/// Sample a transform track at `t`. Clamps outside the key range; lerps
/// position/scale and SLERPs rotation between neighboring keys.
pub fn transform_interpolate(keys: &[TransformKey], t: f32) -> Option<([f32; 3], [f32; 4], [f32; 3])> {
    let (i, j, c) = neighbors(keys, t, |k| k.time)?;
    let (a, b) = (&keys[i], &keys[j]);
    Some((
        lerp_vec3(a.pos, b.pos, c),
        slerp_quat(a.rot, b.rot, c),
        lerp_vec3(a.scale, b.scale, c),
    ))
}

/// Sample a value track continuously at `t`.
pub fn value_interpolate(keys: &[ValueKey], t: f32) -> Option<Value> {
    let (i, j, c) = neighbors(keys, t, |k| k.time)?;
    Some(Value::interpolate(&keys[i].value, &keys[j].value, c))
}

#[inline]
fn cubic_bezier(p0: f32, p1: f32, p2: f32, p3: f32, t: f32) -> f32 {
    let u = 1.0 - t;
    u * u * u * p0 + 3.0 * u * u * t * p1 + 3.0 * u * t * t * p2 + t * t * t * p3
}

/// Sample a bezier track at `t`. Handles are relative to their key; the
/// x-bezier is inverted by bisection to find the curve parameter for `t`.
pub fn bezier_interpolate(keys: &[BezierKey], t: f32) -> Option<f32> {
    let (i, j, _) = neighbors(keys, t, |k| k.time)?;
    if i == j {
        return Some(keys[i].value);
    }
    let (a, b) = (&keys[i], &keys[j]);
    let (x0, y0) = (a.time, a.value);
    let (x1, y1) = (a.time + a.out_handle[0], a.value + a.out_handle[1]);
    let (x2, y2) = (b.time + b.in_handle[0], b.value + b.in_handle[1]);
    let (x3, y3) = (b.time, b.value);

    let mut lo = 0.0f32;
    let mut hi = 1.0f32;
    let mut mid = if x3 > x0 { (t - x0) / (x3 - x0) } else { 0.5 };
    for _ in 0..24 {
        let x = cubic_bezier(x0, x1, x2, x3, mid);
        if (x - t).abs() < 1e-6 {
            break;
        }
        if x < t {
            lo = mid;
        } else {
            hi = mid;
        }
        mid = 0.5 * (lo + hi);
    }
    Some(cubic_bezier(y0, y1, y2, y3, mid))
}

/// Indices of keys whose time falls in `(t - delta, t]`, wrapping across the
/// loop point for looped clips. Used to replay discrete keys exactly once.
pub fn key_indices_in_range<K>(
    keys: &[K],
    time_of: impl Fn(&K) -> f32,
    t: f32,
    delta: f32,
    length: f32,
    looped: bool,
    out: &mut Vec<usize>,
) {
    out.clear();
    let from = t - delta;
    let to = t;
    if looped && length > 0.0 {
        let from = fposmod(from, length);
        let to = fposmod(to, length);
        if from > to {
            // wrapped across the loop point
            for (i, k) in keys.iter().enumerate() {
                let kt = time_of(k);
                if kt > from && kt <= length {
                    out.push(i);
                }
            }
            for (i, k) in keys.iter().enumerate() {
                let kt = time_of(k);
                if kt >= 0.0 && kt <= to {
                    out.push(i);
                }
            }
        } else {
            for (i, k) in keys.iter().enumerate() {
                let kt = time_of(k);
                if kt > from && kt <= to {
                    out.push(i);
                }
            }
        }
    } else if from < 0.0 {
        // clip start: include a key sitting exactly at zero
        for (i, k) in keys.iter().enumerate() {
            let kt = time_of(k);
            if kt >= 0.0 && kt <= to {
                out.push(i);
            }
        }
    } else {
        for (i, k) in keys.iter().enumerate() {
            let kt = time_of(k);
            if kt > from && kt <= to {
                out.push(i);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use animix_api_core::blend::QUAT_IDENTITY;

    fn tkey(time: f32, x: f32) -> TransformKey {
        TransformKey {
            time,
            pos: [x, 0.0, 0.0],
            rot: QUAT_IDENTITY,
            scale: [1.0, 1.0, 1.0],
        }
    }

    #[test]
    fn transform_clamps_and_lerps() {
        let keys = [tkey(0.0, 0.0), tkey(1.0, 10.0)];
        let (p, _, _) = transform_interpolate(&keys, -0.5).unwrap();
        assert_eq!(p[0], 0.0);
        let (p, _, _) = transform_interpolate(&keys, 0.25).unwrap();
        assert!((p[0] - 2.5).abs() < 1e-5);
        let (p, _, _) = transform_interpolate(&keys, 2.0).unwrap();
        assert_eq!(p[0], 10.0);
    }

    #[test]
    fn find_key_is_last_at_or_before() {
        let keys = [tkey(0.0, 0.0), tkey(0.5, 0.0), tkey(1.0, 0.0)];
        assert_eq!(find_key(&keys, -0.1, |k| k.time), None);
        assert_eq!(find_key(&keys, 0.5, |k| k.time), Some(1));
        assert_eq!(find_key(&keys, 0.7, |k| k.time), Some(1));
        assert_eq!(find_key(&keys, 5.0, |k| k.time), Some(2));
    }

    #[test]
    fn range_is_half_open_and_wraps() {
        let times = [0.0f32, 0.25, 0.5, 0.75];
        let mut out = Vec::new();
        key_indices_in_range(&times, |t| *t, 0.5, 0.25, 1.0, false, &mut out);
        assert_eq!(out, [2]); // (0.25, 0.5]
        key_indices_in_range(&times, |t| *t, 0.1, 0.2, 1.0, true, &mut out);
        assert_eq!(out, [0]); // wraps: (0.9, 1.0] then [0.0, 0.1]
        key_indices_in_range(&times, |t| *t, 0.1, 0.2, 1.0, false, &mut out);
        assert_eq!(out, [0]); // unlooped clip start includes the t=0 key
        key_indices_in_range(&times, |t| *t, 0.5, 0.0, 1.0, false, &mut out);
        assert!(out.is_empty()); // zero delta replays nothing
    }

    #[test]
    fn bezier_linear_handles_match_lerp() {
        let keys = [
            BezierKey {
                time: 0.0,
                value: 0.0,
                in_handle: [0.0, 0.0],
                out_handle: [0.0, 0.0],
            },
            BezierKey {
                time: 1.0,
                value: 3.0,
                in_handle: [0.0, 0.0],
                out_handle: [0.0, 0.0],
            },
        ];
        // zero-length handles degenerate to a line
        let v = bezier_interpolate(&keys, 0.5).unwrap();
        assert!((v - 1.5).abs() < 1e-3, "got {v}");
    }
}
