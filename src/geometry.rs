//! Rigid/similarity parameterisation and 3×3 homogeneous affine helpers.
//!
//! Conventions
//! - A transform maps *fixed-frame* pixel coordinates to *moving-frame*
//!   coordinates. Warping the moving image therefore samples
//!   `moving(M · [x, y, 1]ᵀ)` for every fixed pixel `(x, y)`.
//! - Matrices are `[[s·cosθ, −s·sinθ, tx], [s·sinθ, s·cosθ, ty], [0, 0, 1]]`
//!   with the rotation about the origin (top-left pixel centre).
//! - Parameter vectors are `[θ, tx, ty]` (Euclidean) or `[θ, tx, ty, s]`
//!   (Similarity), θ in radians and translations in level pixels.
use nalgebra::{Matrix2, Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::error::{AlignError, Result};

/// Transform family searched by the optimizer.
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransformKind {
    /// Rotation + translation.
    #[default]
    Euclidean,
    /// Rotation + translation + isotropic scale.
    Similarity,
}

impl TransformKind {
    pub fn param_count(self) -> usize {
        match self {
            TransformKind::Euclidean => 3,
            TransformKind::Similarity => 4,
        }
    }

    pub fn identity_params(self) -> Vec<f64> {
        match self {
            TransformKind::Euclidean => vec![0.0, 0.0, 0.0],
            TransformKind::Similarity => vec![0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            TransformKind::Euclidean => "euclidean",
            TransformKind::Similarity => "similarity",
        }
    }
}

/// Parameter vector tagged with its transform family.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AffineParams {
    pub kind: TransformKind,
    pub values: Vec<f64>,
}

impl AffineParams {
    pub fn identity(kind: TransformKind) -> Self {
        Self {
            kind,
            values: kind.identity_params(),
        }
    }

    /// Wrap a raw vector, checking its length against `kind`.
    pub fn new(kind: TransformKind, values: Vec<f64>) -> Result<Self> {
        if values.len() != kind.param_count() {
            return Err(AlignError::invalid_configuration(format!(
                "{} transform expects {} parameters, got {}",
                kind.name(),
                kind.param_count(),
                values.len()
            )));
        }
        Ok(Self { kind, values })
    }

    pub fn rotation(&self) -> f64 {
        self.values[0]
    }

    pub fn translation(&self) -> [f64; 2] {
        [self.values[1], self.values[2]]
    }

    pub fn scale(&self) -> f64 {
        match self.kind {
            TransformKind::Euclidean => 1.0,
            TransformKind::Similarity => self.values[3],
        }
    }

    pub fn to_matrix(&self) -> Matrix3<f64> {
        params_to_matrix(self.kind, &self.values)
    }

    /// Same rotation/scale with translations multiplied by `factor`. Used to
    /// move a solution between pyramid levels (`2.0` coarse → fine).
    pub fn rescaled(&self, factor: f64) -> Self {
        let mut values = self.values.clone();
        values[1] *= factor;
        values[2] *= factor;
        Self {
            kind: self.kind,
            values,
        }
    }

    /// Recover parameters from a matrix built by [`build_transform`]. Any
    /// shear is dropped; a Euclidean read also drops the scale.
    pub fn from_matrix(kind: TransformKind, m: &Matrix3<f64>) -> Self {
        let d = decompose_transform(m);
        let mut values = vec![d.rotation, d.translation[0], d.translation[1]];
        if kind == TransformKind::Similarity {
            values.push(0.5 * (d.scale[0] + d.scale[1]));
        }
        Self { kind, values }
    }
}

/// Matrix for a raw parameter slice of family `kind`. A missing scale reads
/// as 1; the driver always passes vectors of the right length.
pub fn params_to_matrix(kind: TransformKind, values: &[f64]) -> Matrix3<f64> {
    let get = |i: usize, default: f64| values.get(i).copied().unwrap_or(default);
    let scale = match kind {
        TransformKind::Euclidean => 1.0,
        TransformKind::Similarity => get(3, 1.0),
    };
    build_transform(get(0, 0.0), [get(1, 0.0), get(2, 0.0)], scale)
}

/// Build `T(tx, ty) · R(θ) · S(s)` as a homogeneous matrix.
pub fn build_transform(rotation: f64, translation: [f64; 2], scale: f64) -> Matrix3<f64> {
    let (sin, cos) = rotation.sin_cos();
    Matrix3::new(
        scale * cos,
        -scale * sin,
        translation[0],
        scale * sin,
        scale * cos,
        translation[1],
        0.0,
        0.0,
        1.0,
    )
}

/// Components of an affine matrix `T · R · Sh · S`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Decomposition {
    pub translation: [f64; 2],
    pub scale: [f64; 2],
    pub rotation: f64,
    pub shear: f64,
}

/// Split the linear part as `R(θ) · [[sx, k·sy], [0, sy]]` (QR with a
/// positive-diagonal upper factor) and read the translation column.
///
/// A singular or non-finite linear part decomposes to identity rotation and
/// unit scale, keeping only the translation.
pub fn decompose_transform(m: &Matrix3<f64>) -> Decomposition {
    let translation = [m[(0, 2)], m[(1, 2)]];
    let a = m[(0, 0)];
    let c = m[(1, 0)];
    let b = m[(0, 1)];
    let d = m[(1, 1)];
    let det = a * d - b * c;
    let sx = a.hypot(c);
    if !det.is_finite() || det.abs() < 1e-12 || sx <= 0.0 {
        return Decomposition {
            translation,
            scale: [1.0, 1.0],
            rotation: 0.0,
            shear: 0.0,
        };
    }
    let rotation = c.atan2(a);
    let (sin, cos) = rotation.sin_cos();
    // Rᵀ · [b, d]ᵀ = [k·sy, sy]
    let sy = det / sx;
    let shear = (cos * b + sin * d) / sy;
    Decomposition {
        translation,
        scale: [sx, sy],
        rotation,
        shear,
    }
}

/// Apply `m` to each point.
pub fn warp_points(m: &Matrix3<f64>, points: &[[f64; 2]]) -> Vec<[f64; 2]> {
    points
        .iter()
        .map(|p| {
            let v = m * Vector3::new(p[0], p[1], 1.0);
            let w = if v[2].abs() > f64::EPSILON { v[2] } else { 1.0 };
            [v[0] / w, v[1] / w]
        })
        .collect()
}

/// Corners of a `w × h` image in pixel-centre coordinates.
pub fn image_corners(w: usize, h: usize) -> [[f64; 2]; 4] {
    let x1 = w.saturating_sub(1) as f64;
    let y1 = h.saturating_sub(1) as f64;
    [[0.0, 0.0], [x1, 0.0], [x1, y1], [0.0, y1]]
}

/// Determinant of the linear 2×2 block. Near-zero means the transform
/// collapses the plane.
pub fn linear_determinant(m: &Matrix3<f64>) -> f64 {
    Matrix2::new(m[(0, 0)], m[(0, 1)], m[(1, 0)], m[(1, 1)]).determinant()
}

/// Reject matrices that are non-finite or singular.
pub fn check_invertible(m: &Matrix3<f64>) -> Result<()> {
    if m.iter().any(|v| !v.is_finite()) {
        return Err(AlignError::degenerate("transform has non-finite entries"));
    }
    let det = linear_determinant(m);
    if det.abs() < 1e-12 {
        return Err(AlignError::degenerate(format!(
            "transform is singular (det = {det:.3e})"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_then_decompose_round_trips() {
        let m = build_transform(0.3, [4.0, -2.5], 1.2);
        let d = decompose_transform(&m);
        assert!((d.rotation - 0.3).abs() < 1e-12);
        assert!((d.translation[0] - 4.0).abs() < 1e-12);
        assert!((d.translation[1] + 2.5).abs() < 1e-12);
        assert!((d.scale[0] - 1.2).abs() < 1e-12);
        assert!((d.scale[1] - 1.2).abs() < 1e-12);
        assert!(d.shear.abs() < 1e-12);
    }

    #[test]
    fn decompose_reports_shear() {
        // R(θ) · [[2, 0.5·3], [0, 3]]
        let r = build_transform(-0.7, [0.0, 0.0], 1.0);
        let upper = Matrix3::new(2.0, 1.5, 0.0, 0.0, 3.0, 0.0, 0.0, 0.0, 1.0);
        let d = decompose_transform(&(r * upper));
        assert!((d.rotation + 0.7).abs() < 1e-12);
        assert!((d.scale[0] - 2.0).abs() < 1e-12);
        assert!((d.scale[1] - 3.0).abs() < 1e-12);
        assert!((d.shear - 0.5).abs() < 1e-12);
    }

    #[test]
    fn singular_linear_part_falls_back_to_identity() {
        let m = Matrix3::new(0.0, 0.0, 3.0, 0.0, 0.0, 4.0, 0.0, 0.0, 1.0);
        let d = decompose_transform(&m);
        assert_eq!(d.translation, [3.0, 4.0]);
        assert_eq!(d.scale, [1.0, 1.0]);
        assert_eq!(d.rotation, 0.0);
    }

    #[test]
    fn params_lift_between_levels() {
        let p = AffineParams::new(TransformKind::Similarity, vec![0.1, 3.0, -1.0, 0.9])
            .expect("four values");
        let fine = p.rescaled(2.0);
        assert_eq!(fine.values, vec![0.1, 6.0, -2.0, 0.9]);
        let back = AffineParams::from_matrix(TransformKind::Similarity, &fine.to_matrix());
        for (a, b) in back.values.iter().zip(&fine.values) {
            assert!((a - b).abs() < 1e-12);
        }
        assert!(AffineParams::new(TransformKind::Euclidean, vec![0.0; 4]).is_err());
    }

    #[test]
    fn warp_points_rotates_about_origin() {
        let m = build_transform(std::f64::consts::FRAC_PI_2, [1.0, 0.0], 1.0);
        let out = warp_points(&m, &[[1.0, 0.0], [0.0, 0.0]]);
        assert!((out[0][0] - 1.0).abs() < 1e-12 && (out[0][1] - 1.0).abs() < 1e-12);
        assert!((out[1][0] - 1.0).abs() < 1e-12 && out[1][1].abs() < 1e-12);
    }

    #[test]
    fn singular_matrix_is_rejected() {
        let m = build_transform(0.0, [0.0, 0.0], 0.0);
        assert!(check_invertible(&m).is_err());
        assert!(check_invertible(&Matrix3::identity()).is_ok());
    }

    #[test]
    fn euclidean_slice_ignores_scale() {
        let m = params_to_matrix(TransformKind::Euclidean, &[0.2, 1.0, 2.0]);
        assert!((linear_determinant(&m) - 1.0).abs() < 1e-12);
        let s = params_to_matrix(TransformKind::Similarity, &[0.2, 1.0, 2.0, 2.0]);
        assert!((linear_determinant(&s) - 4.0).abs() < 1e-12);
        assert_eq!(s[(0, 2)], 1.0);
    }
}
