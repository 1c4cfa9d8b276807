//! Numeric assertions shared by unit tests, integration tests and benches.

pub fn assert_exact(label: &str, expected: f64, got: f64) {
    assert!(
        expected == got,
        "{}: expected exactly {:.9}, got {:.9}",
        label,
        expected,
        got
    );
}

pub fn assert_close(label: &str, expected: f64, got: f64, atol: f64) {
    assert!(
        (expected - got).abs() <= atol,
        "{}: expected {:.9} ± {:.3e}, got {:.9}",
        label,
        expected,
        atol,
        got
    );
}

pub fn assert_rel_close(label: &str, expected: f64, got: f64, rtol: f64) {
    let denom = expected.abs().max(1e-300);
    let rel = ((expected - got).abs()) / denom;
    assert!(
        rel < rtol,
        "{}: expected ~= {:.9}, got {:.9}, rel_err={:.6e}, rtol={:.6e}",
        label,
        expected,
        got,
        rel,
        rtol
    );
}

pub fn assert_monotone_chain(label: &str, values: &[f64]) {
    for i in 1..values.len() {
        assert!(
            values[i] >= values[i - 1],
            "{}: non-monotone at i={}: {} < {}",
            label,
            i,
            values[i],
            values[i - 1]
        );
    }
}

/// Every weight lies in `[0, 1]` up to `tol`.
pub fn assert_unit_weights(label: &str, weights: &[f64], tol: f64) {
    for (i, &w) in weights.iter().enumerate() {
        assert!(
            w.is_finite() && w >= -tol && w <= 1.0 + tol,
            "{}: weight #{} = {} outside [0, 1]",
            label,
            i,
            w
        );
    }
}
