//! Planar interpolation over sample triangles and iso-line intersection.
use nalgebra::{Matrix2, Matrix3, Vector2, Vector3};

const SINGULAR_EPS: f64 = 1e-12;
const INSIDE_TOL: f64 = 1e-9;
/// Relative residual under which a least-squares point lies on both lines.
const CONSISTENT_TOL: f64 = 1e-9;

/// `value(x, y) = a·x + b·y + c`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl Plane {
    pub fn constant(c: f64) -> Self {
        Self { a: 0.0, b: 0.0, c }
    }

    #[inline]
    pub fn value_at(&self, p: [f64; 2]) -> f64 {
        self.a * p[0] + self.b * p[1] + self.c
    }
}

/// Triangle with vertices in sample-position coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub vertices: [[f64; 2]; 3],
}

impl Triangle {
    pub fn new(v0: [f64; 2], v1: [f64; 2], v2: [f64; 2]) -> Self {
        Self {
            vertices: [v0, v1, v2],
        }
    }

    pub fn centroid(&self) -> [f64; 2] {
        let [v0, v1, v2] = self.vertices;
        [(v0[0] + v1[0] + v2[0]) / 3.0, (v0[1] + v1[1] + v2[1]) / 3.0]
    }

    /// Twice the signed area.
    fn doubled_area(&self) -> f64 {
        let [v0, v1, v2] = self.vertices;
        cross(v0, v1, v2)
    }

    /// Signed-area inside test. Points on an edge (within a small tolerance
    /// relative to the triangle size) count as inside.
    pub fn contains(&self, p: [f64; 2]) -> bool {
        if !p[0].is_finite() || !p[1].is_finite() {
            return false;
        }
        let area = self.doubled_area();
        if area.abs() <= SINGULAR_EPS {
            return false;
        }
        let tol = INSIDE_TOL * area.abs();
        let [v0, v1, v2] = self.vertices;
        let d0 = cross(v0, v1, p);
        let d1 = cross(v1, v2, p);
        let d2 = cross(v2, v0, p);
        let has_neg = d0 < -tol || d1 < -tol || d2 < -tol;
        let has_pos = d0 > tol || d1 > tol || d2 > tol;
        !(has_neg && has_pos)
    }

    /// Value of `plane` at `p`, or `None` when `p` is outside.
    pub fn interpolate(&self, plane: &Plane, p: [f64; 2]) -> Option<f64> {
        self.contains(p).then(|| plane.value_at(p))
    }
}

#[inline]
fn cross(o: [f64; 2], a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - o[0]) * (b[1] - o[1]) - (a[1] - o[1]) * (b[0] - o[0])
}

/// Plane through the three `(vertex, value)` pairs. Collinear vertices fall
/// back to the least-squares (minimum-norm) plane.
pub fn fit_plane(triangle: &Triangle, values: [f64; 3]) -> Plane {
    if values[0] == values[1] && values[1] == values[2] {
        return Plane::constant(values[0]);
    }
    let [v0, v1, v2] = triangle.vertices;
    let m = Matrix3::new(v0[0], v0[1], 1.0, v1[0], v1[1], 1.0, v2[0], v2[1], 1.0);
    let rhs = Vector3::new(values[0], values[1], values[2]);
    let coeffs = match m.try_inverse() {
        Some(inv) => inv * rhs,
        None => match m.svd(true, true).solve(&rhs, SINGULAR_EPS) {
            Ok(sol) => sol,
            Err(_) => return Plane::constant((values[0] + values[1] + values[2]) / 3.0),
        },
    };
    if coeffs.iter().any(|v| !v.is_finite()) {
        return Plane::constant((values[0] + values[1] + values[2]) / 3.0);
    }
    Plane {
        a: coeffs[0],
        b: coeffs[1],
        c: coeffs[2],
    }
}

/// Point where `plane_a = value_a` and `plane_b = value_b` meet.
///
/// When the two iso-lines are parallel or a plane is flat the system is
/// singular; the least-squares step from `anchor` (usually the triangle
/// centroid) is used instead, which for two flat planes is `anchor` itself.
/// Distinct parallel iso-lines never meet and give `None`.
pub fn iso_line_intersection(
    plane_a: &Plane,
    value_a: f64,
    plane_b: &Plane,
    value_b: f64,
    anchor: [f64; 2],
) -> Option<[f64; 2]> {
    let m = Matrix2::new(plane_a.a, plane_a.b, plane_b.a, plane_b.b);
    let r = Vector2::new(value_a - plane_a.c, value_b - plane_b.c);
    let scale = (plane_a.a.abs() + plane_a.b.abs()) * (plane_b.a.abs() + plane_b.b.abs());
    let det = m.determinant();
    if scale > 0.0 && det.abs() > SINGULAR_EPS * scale {
        if let Some(inv) = m.try_inverse() {
            let p = inv * r;
            return Some([p[0], p[1]]);
        }
    }
    let c = Vector2::new(anchor[0], anchor[1]);
    let step = m
        .svd(true, true)
        .solve(&(r - m * c), SINGULAR_EPS)
        .ok()
        .filter(|step| step.iter().all(|v| v.is_finite()))
        .unwrap_or_else(Vector2::zeros);
    let p = c + step;
    let residual = (m * p - r).norm();
    let tol = CONSISTENT_TOL * (1.0 + r.norm() + m.norm() * p.norm());
    (residual <= tol).then_some([p[0], p[1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Triangle {
        Triangle::new([0.0, 0.0], [1.0, 0.0], [0.0, 1.0])
    }

    #[test]
    fn zero_triangle_interpolates_on_edge() {
        let tri = unit();
        let plane = fit_plane(&tri, [0.0, 0.0, 0.0]);
        assert_eq!(tri.interpolate(&plane, [0.5, 0.5]), Some(0.0));
        assert_eq!(tri.interpolate(&plane, [2.0, 2.0]), None);
    }

    #[test]
    fn equal_values_give_an_exactly_flat_plane() {
        let tri = Triangle::new([0.3, 0.1], [1.7, 0.4], [0.9, 1.6]);
        assert_eq!(fit_plane(&tri, [7.0, 7.0, 7.0]), Plane::constant(7.0));
    }

    #[test]
    fn plane_recovers_linear_ramp() {
        let tri = Triangle::new([1.0, 1.0], [4.0, 2.0], [2.0, 5.0]);
        let f = |p: [f64; 2]| 2.0 * p[0] - 0.5 * p[1] + 3.0;
        let plane = fit_plane(&tri, [f(tri.vertices[0]), f(tri.vertices[1]), f(tri.vertices[2])]);
        assert!((plane.a - 2.0).abs() < 1e-12);
        assert!((plane.b + 0.5).abs() < 1e-12);
        assert!((plane.c - 3.0).abs() < 1e-12);
    }

    #[test]
    fn collinear_vertices_use_fallback() {
        let tri = Triangle::new([0.0, 0.0], [1.0, 1.0], [2.0, 2.0]);
        let plane = fit_plane(&tri, [1.0, 2.0, 3.0]);
        assert!(plane.a.is_finite() && plane.b.is_finite() && plane.c.is_finite());
        assert!((plane.value_at([1.0, 1.0]) - 2.0).abs() < 1e-9);
        assert!(!tri.contains([1.0, 1.0]));
    }

    #[test]
    fn iso_lines_cross_at_expected_point() {
        let pa = Plane { a: 1.0, b: 0.0, c: 0.0 };
        let pb = Plane { a: 0.0, b: 1.0, c: 0.0 };
        assert_eq!(iso_line_intersection(&pa, 0.25, &pb, 0.5, [0.0, 0.0]), Some([0.25, 0.5]));
    }

    #[test]
    fn flat_planes_return_anchor() {
        let flat = Plane::constant(0.0);
        let anchor = unit().centroid();
        let p = iso_line_intersection(&flat, 0.0, &flat, 0.0, anchor).expect("flat planes agree");
        assert!((p[0] - anchor[0]).abs() < 1e-12 && (p[1] - anchor[1]).abs() < 1e-12);
        assert!(unit().contains(p));
    }

    #[test]
    fn coincident_iso_lines_project_from_anchor() {
        // both vary with x only and agree on x = 0.4; y stays at the anchor
        let pa = Plane { a: 1.0, b: 0.0, c: 0.0 };
        let pb = Plane { a: 2.0, b: 0.0, c: 0.0 };
        let p = iso_line_intersection(&pa, 0.4, &pb, 0.8, [0.1, 0.3]).expect("same line");
        assert!((p[0] - 0.4).abs() < 1e-9);
        assert!((p[1] - 0.3).abs() < 1e-9);
    }

    #[test]
    fn distinct_parallel_iso_lines_never_meet() {
        let ramp = Plane { a: 7.0, b: 7.0, c: 0.0 };
        assert_eq!(iso_line_intersection(&ramp, 1.0, &ramp, 5.0, [0.3, 0.3]), None);
        // a flat plane only meets iso-lines at its own value
        let flat = Plane::constant(2.0);
        assert_eq!(iso_line_intersection(&flat, 3.0, &ramp, 1.0, [0.3, 0.3]), None);
        assert!(iso_line_intersection(&flat, 2.0, &ramp, 1.0, [0.3, 0.3]).is_some());
    }
}
