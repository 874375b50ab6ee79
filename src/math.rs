//! Plain numeric aggregates shared by the resolved scene objects.
//!
//! These carry no behavior beyond field access; evaluation of transforms
//! belongs to the consumer.

pub type Vec2 = [f64; 2];
pub type Vec3 = [f64; 3];
pub type Vec4 = [f64; 4];

/// Column-major 4x4 matrix, 16 contiguous values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub m: [f64; 16],
}

impl Default for Matrix {
    fn default() -> Self {
        Matrix::IDENTITY
    }
}

impl Matrix {
    pub const IDENTITY: Matrix = Matrix {
        m: [
            1., 0., 0., 0., //
            0., 1., 0., 0., //
            0., 0., 1., 0., //
            0., 0., 0., 1.,
        ],
    };

    /// Builds a matrix from up to 16 values, zero-filling the remainder.
    /// Short inputs degrade silently, matching the aggregate reader contract.
    pub fn from_slice(v: &[f64]) -> Self {
        let mut m = [0.; 16];
        for (dst, src) in m.iter_mut().zip(v) {
            *dst = *src;
        }
        Matrix { m }
    }
}

/// Writes the translation column of a column-major matrix.
pub fn set_translation([x, y, z]: Vec3, mtx: &mut Matrix) {
    mtx.m[12] = x;
    mtx.m[13] = y;
    mtx.m[14] = z;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const WHITE: Color = Color {
        r: 1.,
        g: 1.,
        b: 1.,
    };
}

#[test]
fn test_set_translation() {
    let mut m = Matrix::IDENTITY;
    set_translation([1., 2., 3.], &mut m);
    assert_eq!(&m.m[12..15], &[1., 2., 3.]);
    assert_eq!(m.m[15], 1.);
}

#[test]
fn test_matrix_from_short_slice() {
    let m = Matrix::from_slice(&[5., 6.]);
    assert_eq!(m.m[0], 5.);
    assert_eq!(m.m[1], 6.);
    assert!(m.m[2..].iter().all(|&v| v == 0.));
}
