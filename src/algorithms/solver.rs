use nalgebra::{DMatrix, DVector};

/// Solves A x = b for a symmetric positive (semi-)definite A.
///
/// Cholesky handles the regularized case; with zero regularization the
/// normal matrix can be singular, so LU is the fallback and a genuinely
/// unsolvable row resolves to the zero vector.
pub fn solve_spd(a: DMatrix<f32>, b: DVector<f32>) -> DVector<f32> {
    let n = b.len();
    match a.clone().cholesky() {
        Some(chol) => chol.solve(&b),
        None => a.lu().solve(&b).unwrap_or_else(|| DVector::zeros(n)),
    }
}
