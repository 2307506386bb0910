use crate::constants::*;
use crate::velocity_set::{c_dot, Populations, C, D, Q, W};

pub(crate) fn density(f: &Populations) -> Float {
    f.iter().sum::<Float>()
}

pub(crate) fn momentum(f: &Populations) -> [Float; D] {
    let mut j = [0.0; D];
    (0..Q).for_each(|i| {
        (0..D).for_each(|x| {
            j[x] += f[i] * C[i][x] as Float;
        });
    });
    j
}

/// Equilibrium velocity of a forced collision: the velocity shared by the
/// phases shifted by half the body force (Guo forcing).
pub(crate) fn forced_velocity(velocity: &[Float; D], force: &[Float; D]) -> [Float; D] {
    let mut forced_velocity = [0.0; D];
    (0..D).for_each(|x| {
        forced_velocity[x] = velocity[x] + 0.5 * force[x];
    });
    forced_velocity
}

/// $$ f\_{i}^{\text{eq}} = w\_{i}\rho\left[1+\frac{\mathbf{u}\cdot\mathbf{c}\_{i}}{c\_{s}^{2}}+\frac{\left(\mathbf{u}\cdot\mathbf{c}\_{i}\right)^{2}}{2 c\_{s}^{4}}-\frac{\mathbf{u}\cdot\mathbf{u}}{2 c\_{s}^{2}}\right] $$
pub fn equilibrium(density: Float, velocity: &[Float; D]) -> Populations {
    let mut f_eq = [0.0; Q];
    let u_dot_u = velocity.iter().map(|u_x| u_x * u_x).sum::<Float>();
    (0..Q).for_each(|i| {
        let u_dot_c = c_dot(i, velocity);
        f_eq[i] = W[i]
            * density
            * (1.0 + u_dot_c * CS_2_INV + 0.5 * u_dot_c * u_dot_c * CS_4_INV
                - 0.5 * u_dot_u * CS_2_INV);
    });
    f_eq
}

pub(crate) fn bgk_collision(f: &Populations, f_eq: &Populations, omega: Float) -> Populations {
    let omega_prime = 1.0 - omega;
    let mut f_star = [0.0; Q];
    (0..Q).for_each(|i| {
        f_star[i] = omega_prime * f[i] + omega * f_eq[i];
    });
    f_star
}

/// Guo source term for a body force given per unit mass.
pub(crate) fn momentum_source_term(
    density: Float,
    velocity: &[Float; D],
    force: &[Float; D],
    omega: Float,
) -> Populations {
    let coeff_b = 1.0 - 0.5 * omega;
    let mut source_term = [0.0; Q];
    (0..Q).for_each(|i| {
        let u_dot_c = c_dot(i, velocity);
        source_term[i] = coeff_b
            * W[i]
            * density
            * (0..D)
                .map(|x| {
                    let c_ix = C[i][x] as Float;
                    (CS_2_INV * c_ix - CS_2_INV * velocity[x] + CS_4_INV * u_dot_c * c_ix)
                        * force[x]
                })
                .sum::<Float>();
    });
    source_term
}
