use crate::types::{Point, Value, Vector, Vertex};

// Return the interpolation factor t corresponding to iso_val.
//
// Edges whose ends hold the same value have no crossing to locate; they report
// `None` and the caller falls back to the midpoint.
pub fn find_t(v0: Value, v1: Value, iso_val: Value) -> Option<Value> {
    let dv = v1 - v0;
    if dv == 0.0 {
        return None;
    }
    Some(((iso_val - v0) / dv).clamp(0.0, 1.0))
}

// Linear interpolation
pub fn lerp(a: Value, b: Value, t: Value) -> Value {
    a + (b - a) * t
}

// Linearly interpolate between two points by factor t
pub fn lerp_points(p0: &Point, p1: &Point, t: Value) -> Point {
    Point::new(lerp(p0.x, p1.x, t), lerp(p0.y, p1.y, t), lerp(p0.z, p1.z, t))
}

/// Outcome of interpolating one edge crossing.
#[derive(Debug, Clone, Copy)]
pub struct EdgeVertex {
    pub vertex: Vertex,
    /// The edge had equal end values or the blended gradient vanished.
    pub degenerate: bool,
}

/// Interpolates the iso-crossing on the edge `p0 → p1`.
///
/// The normal is the end-point gradients blended by the same `t`, normalized.
/// It points towards increasing density. A zero-length blend falls back to `+Z`.
pub fn vertex_interp(
    iso_val: Value,
    p0: &Point,
    p1: &Point,
    v0: Value,
    v1: Value,
    g0: &Vector,
    g1: &Vector,
) -> EdgeVertex {
    let (t, flat_edge) = match find_t(v0, v1, iso_val) {
        Some(t) => (t, false),
        None => (0.5, true),
    };
    let position = lerp_points(p0, p1, t);
    let gradient = g0 + (g1 - g0) * t;
    let (normal, flat_gradient) = match gradient.try_normalize(0.0) {
        Some(n) => (n, false),
        None => (Vector::z(), true),
    };
    EdgeVertex {
        vertex: Vertex { position, normal },
        degenerate: flat_edge || flat_gradient,
    }
}
