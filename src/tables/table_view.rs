//! A representation of tables as title row and body rows of strings
//! and formatting instructions, independent of serialisation format.

use std::borrow::Cow;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Highlight {
    /// No special formatting, normal display
    Neutral,
    /// The value could not be determined (shown as an empty cell)
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnFormatting {
    /// Values are numbers: right-adjusted, and auto-width
    Number,
    /// Values are (potentially long) strings, left-adjusted
    String {
        /// In Excel widths. None == automatic.
        width_chars: Option<f64>,
    },
}

/// A full table. dyn compatible.
pub trait TableView {
    /// Used as worksheet name, must be short
    fn table_name(&self) -> Cow<'_, str>;

    /// Column names and formatting.
    fn table_view_header(&self) -> Box<dyn AsRef<[(Cow<'static, str>, ColumnFormatting)]> + '_>;

    fn table_view_body<'s>(
        &'s self,
    ) -> Box<dyn Iterator<Item = Cow<'s, [(Cow<'s, str>, Highlight)]>> + 's>;
}

/// How numbers are shown in all table outputs: integral values
/// without a fractional part (keeping the sign of `-0.0`), missing
/// values as the empty string.
pub fn format_number(value: Option<f64>) -> (Cow<'static, str>, Highlight) {
    match value {
        None => ("".into(), Highlight::Missing),
        Some(x) => {
            let negative_zero = x == 0.0 && x.is_sign_negative();
            if x.fract() == 0.0 && x.abs() < 1e15 && !negative_zero {
                (format!("{}", x as i64).into(), Highlight::Neutral)
            } else {
                (format!("{x}").into(), Highlight::Neutral)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn t_format_number() {
        let f = |x| format_number(x).0.into_owned();
        assert_eq!(f(Some(12.0)), "12");
        assert_eq!(f(Some(-3.0)), "-3");
        assert_eq!(f(Some(0.25)), "0.25");
        assert_eq!(f(Some(1.0 / 3.0)), "0.3333333333333333");
        assert_eq!(f(Some(0.0)), "0");
        assert_eq!(f(Some(-0.0)), "-0");
        assert!("-0".parse::<f64>().unwrap().is_sign_negative());
        assert_eq!(f(None), "");
        assert_eq!(format_number(None).1, Highlight::Missing);
    }
}
