//! Linearized measurement update
use nalgebra::{DMatrix, DVector};

use crate::{error::Error, state::FilterState};

/// Applies the Kalman measurement update to the active subset of
/// the state. Inactive parameters (zero value, zero variance) are
/// compressed out so the innovation system stays well conditioned.
///
/// ## Input
/// - state: [FilterState] snapshot, updated in place on success
/// - h: design matrix, one row per measurement, nx columns
/// - v: innovation vector (measured minus predicted)
/// - r: measurement covariance (diagonal in practice)
///
/// The covariance is re-symmetrized after the update so floating
/// point asymmetry never accumulates across epochs.
pub(crate) fn filter_update(
    state: &mut FilterState,
    h: &DMatrix<f64>,
    v: &DVector<f64>,
    r: &DMatrix<f64>,
) -> Result<(), Error> {
    let nx = state.nx();
    let nv = v.nrows();

    if h.nrows() != nv || h.ncols() != nx || r.nrows() != nv || r.ncols() != nv {
        return Err(Error::MatrixDimension);
    }

    // compress to active parameters
    let active = (0..nx)
        .filter(|i| state.is_active(*i))
        .collect::<Vec<_>>();
    let na = active.len();

    if na == 0 {
        return Err(Error::MatrixDimension);
    }

    let mut x = DVector::<f64>::zeros(na);
    let mut p = DMatrix::<f64>::zeros(na, na);
    let mut h_a = DMatrix::<f64>::zeros(nv, na);

    for (i, gi) in active.iter().enumerate() {
        x[i] = state.x[*gi];
        for (j, gj) in active.iter().enumerate() {
            p[(i, j)] = state.p[(*gi, *gj)];
        }
        for k in 0..nv {
            h_a[(k, i)] = h[(k, *gi)];
        }
    }

    // K = P Hᵀ (H P Hᵀ + R)⁻¹
    let ph_t = &p * h_a.transpose();
    let innovation_cov = &h_a * &ph_t + r;

    let innovation_inv = innovation_cov
        .try_inverse()
        .ok_or(Error::MatrixInversion)?;

    let gain = &ph_t * innovation_inv;

    let x_updated = &x + &gain * v;
    let p_updated = &p - &gain * &h_a * &p;

    // write back, symmetrized
    for (i, gi) in active.iter().enumerate() {
        state.x[*gi] = x_updated[i];
        for (j, gj) in active.iter().enumerate() {
            let symmetric = 0.5 * (p_updated[(i, j)] + p_updated[(j, i)]);
            state.p[(*gi, *gj)] = symmetric;
            state.p[(*gj, *gi)] = symmetric;
        }
    }

    Ok(())
}

#[cfg(test)]
mod test {
    use super::filter_update;
    use crate::state::FilterState;
    use nalgebra::{DMatrix, DVector};

    #[test]
    fn test_scalar_update() {
        let mut state = FilterState::new(1);
        state.init_param(0, 1.0, 4.0);

        let h = DMatrix::from_row_slice(1, 1, &[1.0]);
        let v = DVector::from_row_slice(&[2.0]); // measurement = 3.0
        let r = DMatrix::from_row_slice(1, 1, &[4.0]);

        filter_update(&mut state, &h, &v, &r).unwrap();

        // equal weights: posterior halfway, variance halved
        assert!((state.x[0] - 2.0).abs() < 1E-12);
        assert!((state.p[(0, 0)] - 2.0).abs() < 1E-12);
    }

    #[test]
    fn test_inactive_states_untouched() {
        let mut state = FilterState::new(3);
        state.init_param(0, 10.0, 1.0);
        // state 1 inactive, state 2 active
        state.init_param(2, 5.0, 1.0);

        let mut h = DMatrix::zeros(1, 3);
        h[(0, 0)] = 1.0;
        h[(0, 1)] = 1.0; // references an inactive state: ignored

        let v = DVector::from_row_slice(&[1.0]);
        let r = DMatrix::from_row_slice(1, 1, &[1.0]);

        filter_update(&mut state, &h, &v, &r).unwrap();

        assert_eq!(state.x[1], 0.0);
        assert_eq!(state.p[(1, 1)], 0.0);
        assert!((state.x[0] - 10.5).abs() < 1E-12);
        assert_eq!(state.x[2], 5.0, "unobserved active state untouched");
    }

    #[test]
    fn test_symmetry_preserved() {
        let mut state = FilterState::new(2);
        state.init_param(0, 1.0, 2.0);
        state.init_param(1, -1.0, 3.0);
        state.p[(0, 1)] = 0.5;
        state.p[(1, 0)] = 0.5;

        let h = DMatrix::from_row_slice(2, 2, &[1.0, 0.3, 0.0, 1.0]);
        let v = DVector::from_row_slice(&[0.1, -0.2]);
        let r = DMatrix::from_diagonal(&DVector::from_row_slice(&[0.01, 0.01]));

        filter_update(&mut state, &h, &v, &r).unwrap();

        for i in 0..2 {
            for j in 0..2 {
                assert_eq!(state.p[(i, j)], state.p[(j, i)]);
            }
            assert!(state.p[(i, i)] > 0.0);
        }
    }
}
