//! Two-sample significance tests.
//!
//! Rate metrics use a pooled two-proportion z-test (binomial variance).
//! Continuous metrics use Welch's t-test with Bessel-corrected sample
//! variances and Welch–Satterthwaite degrees of freedom. No continuity
//! correction is applied.

use impact_core::types::{Significance, SignificanceTest};
use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

pub fn mean(data: &[f64]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().sum::<f64>() / data.len() as f64
}

/// Sample variance with Bessel's correction; `None` below two samples.
pub fn sample_variance(data: &[f64]) -> Option<f64> {
    if data.len() < 2 {
        return None;
    }
    let m = mean(data);
    Some(data.iter().map(|&x| (x - m) * (x - m)).sum::<f64>() / (data.len() - 1) as f64)
}

pub fn sample_std_dev(data: &[f64]) -> f64 {
    sample_variance(data).map(f64::sqrt).unwrap_or(0.0)
}

/// Pooled two-proportion z-test of `test` successes against `control`.
pub fn two_proportion_z(
    test_successes: usize,
    test_n: usize,
    control_successes: usize,
    control_n: usize,
) -> Option<Significance> {
    if test_n < 2 || control_n < 2 {
        return None;
    }
    let (n1, n2) = (test_n as f64, control_n as f64);
    let p1 = test_successes as f64 / n1;
    let p2 = control_successes as f64 / n2;
    let pooled = (test_successes + control_successes) as f64 / (n1 + n2);
    let se = (pooled * (1.0 - pooled) * (1.0 / n1 + 1.0 / n2)).sqrt();
    if se <= 0.0 || !se.is_finite() {
        return None;
    }
    let z = (p1 - p2) / se;
    let p_value = normal_two_tailed_p(z)?;
    Some(Significance {
        test: SignificanceTest::TwoProportionZ,
        statistic: z,
        p_value,
        confidence_pct: (1.0 - p_value) * 100.0,
        degrees_of_freedom: None,
    })
}

/// Welch's unequal-variance t-test of `test` against `control`.
pub fn welch_t(test: &[f64], control: &[f64]) -> Option<Significance> {
    let v1 = sample_variance(test)?;
    let v2 = sample_variance(control)?;
    let (n1, n2) = (test.len() as f64, control.len() as f64);
    let a = v1 / n1;
    let b = v2 / n2;
    let se2 = a + b;
    if se2 <= 0.0 || !se2.is_finite() {
        return None;
    }
    let t = (mean(test) - mean(control)) / se2.sqrt();
    let df = se2 * se2 / (a * a / (n1 - 1.0) + b * b / (n2 - 1.0));
    let p_value = student_t_two_tailed_p(t, df)?;
    Some(Significance {
        test: SignificanceTest::WelchT,
        statistic: t,
        p_value,
        confidence_pct: (1.0 - p_value) * 100.0,
        degrees_of_freedom: Some(df),
    })
}

/// Two-tailed p-value of a standard normal statistic.
pub fn normal_two_tailed_p(z: f64) -> Option<f64> {
    let normal = Normal::new(0.0, 1.0).ok()?;
    Some((2.0 * (1.0 - normal.cdf(z.abs()))).clamp(0.0, 1.0))
}

/// Two-tailed p-value of Student's t with `df` degrees of freedom.
pub fn student_t_two_tailed_p(t: f64, df: f64) -> Option<f64> {
    if t.is_infinite() {
        return Some(0.0);
    }
    let dist = StudentsT::new(0.0, 1.0, df).ok()?;
    Some((2.0 * (1.0 - dist.cdf(t.abs()))).clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_variance_uses_bessel_correction() {
        assert_eq!(sample_variance(&[100.0, 150.0, 200.0]), Some(2500.0));
        assert_eq!(sample_variance(&[1.0]), None);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_normal_p_values() {
        let p = |z: f64| normal_two_tailed_p(z).unwrap();
        assert!(close(p(0.0), 1.0, 1e-9));
        assert!(close(p(1.959_964), 0.05, 1e-6));
        assert!(close(p(-2.575_829), 0.01, 1e-6));
    }

    #[test]
    fn test_student_t_matches_closed_form() {
        // df = 2: p = 1 - t / sqrt(2 + t^2)
        for t in [0.5_f64, 1.0, 1.732, 4.0] {
            let expected = 1.0 - t / (2.0 + t * t).sqrt();
            assert!(close(student_t_two_tailed_p(t, 2.0).unwrap(), expected, 1e-7), "t={t}");
        }
        // df = 1 (Cauchy): p = 1 - 2/pi * atan(|t|)
        let expected = 1.0 - 2.0 / std::f64::consts::PI * 3.0_f64.atan();
        assert!(close(student_t_two_tailed_p(3.0, 1.0).unwrap(), expected, 1e-7));
    }

    #[test]
    fn test_student_t_approaches_normal() {
        let p_t = student_t_two_tailed_p(1.96, 10_000.0).unwrap();
        assert!(close(p_t, 0.05, 1e-3));
    }

    #[test]
    fn test_two_proportion_z() {
        let sig = two_proportion_z(60, 100, 40, 100).unwrap();
        // pooled p = 0.5, se = sqrt(0.25 * 0.02)
        assert!(close(sig.statistic, 0.2 / (0.005_f64).sqrt(), 1e-12));
        assert!(sig.confidence_pct > 99.0);
        assert_eq!(sig.test, SignificanceTest::TwoProportionZ);

        // Identical all-success groups have zero variance
        assert!(two_proportion_z(10, 10, 10, 10).is_none());
        assert!(two_proportion_z(1, 1, 0, 5).is_none());
    }

    #[test]
    fn test_welch_t() {
        let sig = welch_t(&[100.0, 150.0, 200.0], &[100.0, 100.0, 100.0]).unwrap();
        assert!(close(sig.statistic, 50.0 / (2500.0_f64 / 3.0).sqrt(), 1e-12));
        assert!(close(sig.degrees_of_freedom.unwrap(), 2.0, 1e-12));
        assert!(sig.confidence_pct > 70.0 && sig.confidence_pct < 80.0);

        assert!(welch_t(&[1.0, 1.0], &[1.0, 1.0]).is_none());
        assert!(welch_t(&[1.0], &[1.0, 2.0]).is_none());
    }
}
