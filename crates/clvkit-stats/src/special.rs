//! Special functions used by the likelihoods and conditional expectations.

use std::f64::consts::PI;

/// Lanczos approximation of `ln(Gamma(x))`.
///
/// Accurate to roughly 15 significant digits for positive arguments.
/// Returns `f64::INFINITY` at the poles (non-positive integers).
///
/// # Examples
///
/// ```
/// use clvkit_stats::special::ln_gamma;
///
/// assert!(ln_gamma(1.0).abs() < 1e-12);
/// assert!((ln_gamma(5.0) - 24.0_f64.ln()).abs() < 1e-12);
/// ```
#[must_use]
pub fn ln_gamma(x: f64) -> f64 {
    // Lanczos coefficients (g=7, n=9).
    const COEFFS: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    const G: f64 = 7.0;

    if x.is_nan() {
        return f64::NAN;
    }
    if x <= 0.0 && x.fract() == 0.0 {
        return f64::INFINITY;
    }

    if x < 0.5 {
        // Reflection formula.
        let sin_val = (PI * x).sin();
        if sin_val.abs() < 1e-300 {
            return f64::INFINITY;
        }
        return PI.ln() - sin_val.abs().ln() - ln_gamma(1.0 - x);
    }

    let z = x - 1.0;
    let mut sum = COEFFS[0];
    for (i, &c) in COEFFS[1..].iter().enumerate() {
        #[expect(clippy::cast_precision_loss)]
        let denom = z + (i as f64) + 1.0;
        sum += c / denom;
    }

    let t = z + G + 0.5;
    (z + 0.5).mul_add(t.ln(), 0.5 * (2.0 * PI).ln()) - t + sum.ln()
}

/// Numerically stable `ln(exp(a) + exp(b))`.
///
/// # Examples
///
/// ```
/// use clvkit_stats::special::log_add_exp;
///
/// let v = log_add_exp(1000.0, 1000.0);
/// assert!((v - (1000.0 + 2.0_f64.ln())).abs() < 1e-9);
/// assert_eq!(log_add_exp(f64::NEG_INFINITY, 3.0), 3.0);
/// ```
#[must_use]
pub fn log_add_exp(a: f64, b: f64) -> f64 {
    let max = a.max(b);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + ((a - max).exp() + (b - max).exp()).ln()
}

const HYP2F1_MAX_TERMS: usize = 200_000;
const HYP2F1_TOLERANCE: f64 = 1e-15;

/// Gauss hypergeometric function `2F1(a, b; c; z)` for `0 <= z < 1`.
///
/// Evaluated by direct summation of the power series. Returns
/// `f64::INFINITY` when the partial sums overflow and `f64::NAN` when the
/// series is undefined (`c` a non-positive integer) or does not converge;
/// callers switch to a transformed argument in those cases.
///
/// # Examples
///
/// ```
/// use clvkit_stats::special::hyp2f1;
///
/// // 2F1(1, 1; 2; z) = -ln(1 - z) / z
/// let z = 0.5_f64;
/// let expected = -(1.0 - z).ln() / z;
/// assert!((hyp2f1(1.0, 1.0, 2.0, z) - expected).abs() < 1e-12);
/// assert_eq!(hyp2f1(3.0, 4.0, 5.0, 0.0), 1.0);
/// ```
#[expect(clippy::cast_precision_loss, clippy::many_single_char_names)]
#[must_use]
pub fn hyp2f1(a: f64, b: f64, c: f64, z: f64) -> f64 {
    if !(0.0..1.0).contains(&z) {
        return f64::NAN;
    }
    if z == 0.0 {
        return 1.0;
    }

    // terms can still grow until k passes the larger numerator parameter
    let growth_limit = a.abs().max(b.abs());
    let mut term = 1.0_f64;
    let mut sum = 1.0_f64;
    for k in 0..HYP2F1_MAX_TERMS {
        let k = k as f64;
        let denom = (c + k) * (k + 1.0);
        if denom == 0.0 {
            return f64::NAN;
        }
        term *= (a + k) * (b + k) / denom * z;
        sum += term;
        if !sum.is_finite() {
            return f64::INFINITY;
        }
        if term == 0.0 || (term.abs() <= HYP2F1_TOLERANCE * sum.abs() && k + 1.0 > growth_limit) {
            return sum;
        }
    }
    f64::NAN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ln_gamma_integers() {
        let mut factorial = 1.0_f64;
        for n in 1..20 {
            assert!((ln_gamma(f64::from(n)) - factorial.ln()).abs() < 1e-10);
            factorial *= f64::from(n);
        }
    }

    #[test]
    fn test_ln_gamma_half() {
        assert!((ln_gamma(0.5) - PI.sqrt().ln()).abs() < 1e-12);
        assert!((ln_gamma(0.25) - 1.288_022_524_698_077_5).abs() < 1e-10);
    }

    #[test]
    fn test_ln_gamma_poles() {
        assert_eq!(ln_gamma(0.0), f64::INFINITY);
        assert_eq!(ln_gamma(-3.0), f64::INFINITY);
    }

    #[test]
    fn test_hyp2f1_geometric_series() {
        // 2F1(1, b; b; z) = 1 / (1 - z)
        for z in [0.1, 0.5, 0.9] {
            assert!((hyp2f1(1.0, 2.5, 2.5, z) - 1.0 / (1.0 - z)).abs() < 1e-10);
        }
    }

    #[test]
    fn test_hyp2f1_binomial() {
        // 2F1(a, b; b; z) = (1 - z)^-a
        let (a, z): (f64, f64) = (3.7, 0.6);
        let expected = (1.0 - z).powf(-a);
        assert!((hyp2f1(a, 1.3, 1.3, z) - expected).abs() / expected < 1e-10);
    }

    #[test]
    fn test_hyp2f1_euler_transform_agrees() {
        let (a, b, c, z) = (2.4, 5.1, 6.3, 0.7);
        let direct = hyp2f1(a, b, c, z);
        let transformed = hyp2f1(c - a, c - b, c, z) * (1.0 - z).powf(c - a - b);
        assert!((direct - transformed).abs() / direct < 1e-9);
    }

    #[test]
    fn test_hyp2f1_out_of_domain() {
        assert!(hyp2f1(1.0, 1.0, 2.0, 1.0).is_nan());
        assert!(hyp2f1(1.0, 1.0, 2.0, -0.1).is_nan());
    }

    #[test]
    fn test_log_add_exp_matches_naive() {
        let (a, b) = (-1.5_f64, 0.25_f64);
        assert!((log_add_exp(a, b) - (a.exp() + b.exp()).ln()).abs() < 1e-12);
    }
}
