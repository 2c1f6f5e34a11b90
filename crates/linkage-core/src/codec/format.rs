//! C `printf` number formatting as read by the solver.
//!
//! The solver parses its input with Fortran namelist rules, and existing
//! reference files were produced with `%e`, `%g` and `%f`. The helpers
//! here reproduce those conversions byte for byte.

/// `%<width>.<precision>e`: mantissa with `precision` decimals, signed
/// exponent with at least two digits, right-aligned in `width`.
pub fn exp(value: f64, width: usize, precision: usize) -> String {
    let text = exp_raw(value, precision);
    format!("{text:>width$}")
}

fn exp_raw(value: f64, precision: usize) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    let rust = format!("{value:.precision$e}");
    let Some((mantissa, exponent)) = rust.split_once('e') else {
        return rust;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.abs())
}

fn non_finite(value: f64) -> String {
    if value.is_nan() {
        "nan".into()
    } else if value > 0.0 {
        "inf".into()
    } else {
        "-inf".into()
    }
}

/// `%17.9e`, the default real field.
pub fn e17(value: f64) -> String {
    exp(value, 17, 9)
}

/// `%18.9e`, used for triad matrices.
pub fn e18(value: f64) -> String {
    exp(value, 18, 9)
}

/// `%14.6e`, used for function, friction and control data.
pub fn e14(value: f64) -> String {
    exp(value, 14, 6)
}

/// `%f`.
pub fn f6(value: f64) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    format!("{value:.6}")
}

/// `%3.1f`.
pub fn f3_1(value: f64) -> String {
    format!("{value:>3.1}")
}

/// `%g`: six significant digits, trailing zeros removed, exponent form
/// outside `1e-4 ..= 1e6`.
pub fn g(value: f64) -> String {
    if !value.is_finite() {
        return non_finite(value);
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0".into() } else { "0".into() };
    }
    const P: i32 = 6;
    // The exponent after rounding to P significant digits decides the form.
    let rounded = format!("{value:.*e}", (P - 1) as usize);
    let x: i32 = rounded
        .split_once('e')
        .and_then(|(_, e)| e.parse().ok())
        .unwrap_or(0);
    if (-4..P).contains(&x) {
        let decimals = (P - 1 - x) as usize;
        strip_zeros(&format!("{value:.decimals$}"))
    } else {
        let raw = exp_raw(value, (P - 1) as usize);
        match raw.split_once('e') {
            Some((m, e)) => format!("{}e{e}", strip_zeros(m)),
            None => raw,
        }
    }
}

fn strip_zeros(text: &str) -> String {
    if !text.contains('.') {
        return text.to_string();
    }
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// `%1.128s`: at most 128 characters.
pub fn clip128(text: &str) -> &str {
    match text.char_indices().nth(128) {
        Some((i, _)) => &text[..i],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // %e
    // -----------------------------------------------------------------------

    #[test]
    fn exponent_has_sign_and_two_digits() {
        assert_eq!(e17(1.0), "  1.000000000e+00");
        assert_eq!(e17(-9.81), " -9.810000000e+00");
        assert_eq!(e17(0.0), "  0.000000000e+00");
        assert_eq!(e17(1.5e-7), "  1.500000000e-07");
        assert_eq!(e17(2.0e123), " 2.000000000e+123");
    }

    #[test]
    fn widths() {
        assert_eq!(e18(1.0).len(), 18);
        assert_eq!(e14(0.25), "  2.500000e-01");
        assert_eq!(exp(12345.678, 0, 3), "1.235e+04");
    }

    #[test]
    fn negative_zero_keeps_sign() {
        assert_eq!(e14(-0.0), " -0.000000e+00");
    }

    #[test]
    fn non_finite_values() {
        assert_eq!(e14(f64::NAN), "           nan");
        assert_eq!(e14(f64::NEG_INFINITY), "          -inf");
    }

    // -----------------------------------------------------------------------
    // %g and %f
    // -----------------------------------------------------------------------

    #[test]
    fn general_format_picks_shortest_form() {
        assert_eq!(g(0.0), "0");
        assert_eq!(g(1.0), "1");
        assert_eq!(g(0.5), "0.5");
        assert_eq!(g(100000.0), "100000");
        assert_eq!(g(1000000.0), "1e+06");
        assert_eq!(g(0.0001), "0.0001");
        assert_eq!(g(0.00001), "1e-05");
        assert_eq!(g(-2.5e-7), "-2.5e-07");
        assert_eq!(g(123.456789), "123.457");
    }

    #[test]
    fn general_format_rounding_moves_exponent() {
        assert_eq!(g(999999.5), "1e+06");
    }

    #[test]
    fn fixed_formats() {
        assert_eq!(f6(0.05), "0.050000");
        assert_eq!(f3_1(1.0), "1.0");
        assert_eq!(f3_1(0.0), "0.0");
    }

    #[test]
    fn strings_are_clipped() {
        let long = "x".repeat(200);
        assert_eq!(clip128(&long).len(), 128);
        assert_eq!(clip128("short"), "short");
    }
}
