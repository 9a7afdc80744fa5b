use nalgebra::DMatrix;
use rand::rngs::StdRng;
use rand::Rng;

/// Xavier-style uniform factor matrix: entries drawn from
/// [-sqrt(6/factors), sqrt(6/factors)] using the caller's seeded RNG, so
/// the same seed always produces the same initialization.
pub fn xavier_uniform_matrix(rng: &mut StdRng, rows: usize, factors: usize) -> DMatrix<f32> {
    let limit = (6.0 / factors as f32).sqrt();
    DMatrix::from_fn(rows, factors, |_, _| rng.gen_range(-limit..limit))
}
