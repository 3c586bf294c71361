//! Real roots of low-degree polynomials in arbitrary precision.

use rug::{float::Constant, ops::Pow, Float};

/// Coefficient magnitudes below `scale * DEGENERACY` are treated as
/// structural zeros and the polynomial degenerates to the next degree.
const DEGENERACY: f64 = 1e-40;

/// Real roots of `c3·x³ + c2·x² + c1·x + c0`, ascending. Closed-form
/// (Cardano / trigonometric), evaluated at the coefficients' precision.
pub(crate) fn real_cubic_roots(c3: &Float, c2: &Float, c1: &Float, c0: &Float) -> Vec<Float> {
    let prec = c3.prec();
    let f = |v: f64| Float::with_val(prec, v);

    let scale: Float = c3
        .clone()
        .abs()
        .max(&c2.clone().abs())
        .max(&c1.clone().abs())
        .max(&c0.clone().abs());

    if scale.is_zero() {
        return Vec::new();
    }

    let cutoff = scale * f(DEGENERACY);

    if c3.clone().abs() <= cutoff {
        return real_quadratic_roots(c2, c1, c0, &cutoff);
    }

    // monic: x³ + b·x² + c·x + d
    let b = Float::with_val(prec, c2 / c3);
    let c = Float::with_val(prec, c1 / c3);
    let d = Float::with_val(prec, c0 / c3);

    // depressed: y³ + p·y + q, with x = y - b/3
    let b_sq = b.clone().square();
    let p = c.clone() - b_sq.clone() / 3;
    let q = b_sq * &b * 2 / 27 - b.clone() * &c / 3 + d;
    let shift = b / 3;

    let half_q = q.clone() / 2;
    let third_p = p.clone() / 3;
    let discriminant = half_q.clone().square() + third_p.clone().pow(3);

    let mut roots = Vec::with_capacity(3);

    if discriminant > 0.0 {
        // one real root
        let sqrt_disc = discriminant.sqrt();
        let u = (sqrt_disc.clone() - &half_q).cbrt();
        let v = (-(sqrt_disc + &half_q)).cbrt();
        roots.push(u + v - &shift);
    } else if p.is_zero() && q.is_zero() {
        // triple root
        roots.push(-shift);
    } else {
        // three real roots (two coincide when the discriminant is zero)
        let amplitude = (-third_p).sqrt();
        let mut cos_phi = -(half_q / amplitude.clone().pow(3));
        if cos_phi > 1.0 {
            cos_phi = f(1.0);
        } else if cos_phi < -1.0 {
            cos_phi = f(-1.0);
        }

        let phi = cos_phi.acos();
        let two_pi_third = Float::with_val(prec, Constant::Pi) * 2 / 3;

        for k in 0..3 {
            let angle = phi.clone() / 3 - two_pi_third.clone() * k;
            roots.push(amplitude.clone() * 2 * angle.cos() - &shift);
        }
    }

    roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    roots
}

/// Real roots of `c2·x² + c1·x + c0`, ascending.
fn real_quadratic_roots(c2: &Float, c1: &Float, c0: &Float, cutoff: &Float) -> Vec<Float> {
    let prec = c2.prec();

    if c2.clone().abs() <= *cutoff {
        // linear, or constant with no roots
        if c1.clone().abs() <= *cutoff {
            return Vec::new();
        }
        return vec![-Float::with_val(prec, c0 / c1)];
    }

    let discriminant = c1.clone().square() - Float::with_val(prec, c2 * c0) * 4;
    if discriminant < 0.0 {
        return Vec::new();
    }

    let sqrt_disc = discriminant.sqrt();
    let double_a = Float::with_val(prec, c2 * 2_u32);

    let mut roots = vec![
        (-(c1.clone() + &sqrt_disc)) / double_a.clone(),
        (sqrt_disc - c1) / double_a,
    ];

    roots.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    roots
}
