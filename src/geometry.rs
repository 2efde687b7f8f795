// src/geometry.rs
//
// Planar geometry primitives shared by the spatial mapping modules:
// ray-cast polygon containment and 4-point projective (homography) fitting.
// Everything here is pure math over f64 with no I/O and no panics —
// degenerate inputs return None and the caller picks a fallback.

/// Row-major 3x3 projective matrix with the bottom-right element fixed at 1.
pub type Homography = [f64; 9];

pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

pub fn clamp_range(value: f64, min: f64, max: f64) -> f64 {
    value.clamp(min, max)
}

/// Standard even-odd ray-casting test over an ordered vertex list.
///
/// A horizontal edge would make the slope denominator zero; the epsilon
/// nudge keeps the division finite without special-casing those edges.
pub fn point_in_polygon(x: f64, y: f64, polygon: &[[f64; 2]]) -> bool {
    let mut inside = false;
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];

        let mut dy = yj - yi;
        if dy == 0.0 {
            dy = f64::EPSILON;
        }

        let crosses = (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / dy + xi;
        if crosses {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Solve `a * x = b` in place via Gaussian elimination with partial pivoting.
/// Returns None when the system is singular (pivot below machine epsilon).
fn solve_linear_system(a: &[[f64; 8]; 8], b: &[f64; 8]) -> Option<[f64; 8]> {
    let n = 8;
    let mut aug = [[0.0f64; 9]; 8];
    for (row_idx, row) in a.iter().enumerate() {
        aug[row_idx][..8].copy_from_slice(row);
        aug[row_idx][8] = b[row_idx];
    }

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_value = aug[col][col].abs();
        for row in (col + 1)..n {
            let candidate = aug[row][col].abs();
            if candidate > pivot_value {
                pivot_value = candidate;
                pivot_row = row;
            }
        }

        if pivot_value < f64::EPSILON {
            return None;
        }

        if pivot_row != col {
            aug.swap(col, pivot_row);
        }

        let pivot = aug[col][col];
        for k in col..=n {
            aug[col][k] /= pivot;
        }

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = aug[row][col];
            if factor.abs() < f64::EPSILON {
                continue;
            }
            for k in col..=n {
                aug[row][k] -= factor * aug[col][k];
            }
        }
    }

    let mut solution = [0.0f64; 8];
    for (row_idx, row) in aug.iter().enumerate() {
        solution[row_idx] = row[8];
    }
    Some(solution)
}

fn finite_point(point: &[f64; 2]) -> bool {
    point[0].is_finite() && point[1].is_finite()
}

/// Fit the projective transform mapping `src` onto `dst` from the first four
/// correspondence pairs. Returns None rather than erroring on non-finite
/// input or a singular system; callers fall back to an affine approximation.
pub fn compute_homography(src: &[[f64; 2]], dst: &[[f64; 2]]) -> Option<Homography> {
    if src.len() < 4 || dst.len() < 4 {
        return None;
    }

    let src4 = &src[..4];
    let dst4 = &dst[..4];
    if !src4.iter().all(finite_point) || !dst4.iter().all(finite_point) {
        return None;
    }

    let mut a = [[0.0f64; 8]; 8];
    let mut b = [0.0f64; 8];

    for i in 0..4 {
        let [x, y] = src4[i];
        let [u, v] = dst4[i];

        a[2 * i] = [x, y, 1.0, 0.0, 0.0, 0.0, -u * x, -u * y];
        b[2 * i] = u;

        a[2 * i + 1] = [0.0, 0.0, 0.0, x, y, 1.0, -v * x, -v * y];
        b[2 * i + 1] = v;
    }

    let h = solve_linear_system(&a, &b)?;
    Some([h[0], h[1], h[2], h[3], h[4], h[5], h[6], h[7], 1.0])
}

/// Project a point through the matrix. None when the homogeneous denominator
/// collapses or the projection is non-finite.
pub fn apply_homography(matrix: &Homography, x: f64, y: f64) -> Option<(f64, f64)> {
    let w = matrix[6] * x + matrix[7] * y + matrix[8];
    if !w.is_finite() || w.abs() < f64::EPSILON {
        return None;
    }

    let mapped_x = (matrix[0] * x + matrix[1] * y + matrix[2]) / w;
    let mapped_y = (matrix[3] * x + matrix[4] * y + matrix[5]) / w;

    if !mapped_x.is_finite() || !mapped_y.is_finite() {
        return None;
    }

    Some((mapped_x, mapped_y))
}
