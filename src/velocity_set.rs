// ------------------------------------------------------------------------------- MODULES

mod d3q19;

// ------------------------------------------------------------------------------- IMPORTS

use crate::constants::Float;
pub use d3q19::{C, D, Q, Q_BAR, W};

/// Populations of a single voxel.
pub type Populations = [Float; Q];

/// # Examples
/// ```
/// # use lbtwophase::velocity_set::{get_opposite_direction, C};
/// for i in 0..19 {
///     let i_bar = get_opposite_direction(i);
///     for x in 0..3 {
///         assert_eq!(C[i][x], -C[i_bar][x]);
///     }
/// }
/// ```
pub fn get_opposite_direction(direction: usize) -> usize {
    Q_BAR[direction]
}

pub(crate) fn c_dot(i: usize, vector: &[Float; D]) -> Float {
    C[i].iter()
        .zip(vector.iter())
        .map(|(&c_x, v_x)| c_x as Float * v_x)
        .sum::<Float>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_c_d3q19() {
        assert_eq!(C[0], [0, 0, 0]);
        assert_eq!(C[1], [1, 0, 0]);
        assert_eq!(C[7], [1, 1, 0]);
        assert_eq!(C[9], [1, 0, 1]);
    }

    #[test]
    fn test_get_q_bar_d3q19() {
        assert_eq!(Q_BAR[0], 0);
        assert_eq!(Q_BAR[1], 2);
        assert_eq!(Q_BAR[7], 8);
        assert_eq!(Q_BAR[9], 10);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let sum = W.iter().sum::<Float>();

        assert!((sum - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_weights_are_isotropic() {
        for a in 0..D {
            let first_moment = (0..Q).map(|i| W[i] * C[i][a] as Float).sum::<Float>();
            assert!(first_moment.abs() < 1e-12);
            for b in 0..D {
                let second_moment = (0..Q)
                    .map(|i| W[i] * (C[i][a] * C[i][b]) as Float)
                    .sum::<Float>();
                let target = if a == b { crate::constants::CS_2 } else { 0.0 };
                assert!((second_moment - target).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_directions_are_distinct() {
        for i in 0..Q {
            for j in (i + 1)..Q {
                assert_ne!(C[i], C[j]);
            }
        }
    }
}
