//! Format encoders driven by [`convector_core::export`].

pub mod dov;
pub mod gcode;
pub mod mvg;
pub mod pdf;
pub mod png;
pub mod polargraph;
pub mod ps;
pub mod svg;

/// Shortest decimal form of `v` with at most `places` fractional digits.
pub(crate) fn decimal(v: f64, places: usize) -> String {
    let s = format!("{:.*}", places, v);
    let s = if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        &s
    };
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::decimal;
    use rstest::rstest;

    #[rstest]
    #[case(1.0, 3, "1")]
    #[case(2.5, 3, "2.5")]
    #[case(0.123456, 3, "0.123")]
    #[case(-0.0001, 3, "0")]
    #[case(100.0, 0, "100")]
    fn test_decimal(#[case] v: f64, #[case] places: usize, #[case] expected: &str) {
        assert_eq!(decimal(v, places), expected);
    }
}
