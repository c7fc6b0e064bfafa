use std::str::FromStr;

use oxrdf::NamedNodeRef;
use oxrdf::vocab::xsd;
use oxsdatatypes::{Date, DateTime, Decimal, Integer};

/// Guesses an XSD datatype for a literal: integer, then decimal, then
/// dateTime, then date. `None` leaves the literal a plain string.
pub(crate) fn infer(value: &str) -> Option<NamedNodeRef<'static>> {
    if Integer::from_str(value).is_ok() || is_integer_lexical(value) {
        Some(xsd::INTEGER)
    } else if Decimal::from_str(value).is_ok() {
        Some(xsd::DECIMAL)
    } else if DateTime::from_str(value).is_ok() {
        Some(xsd::DATE_TIME)
    } else if Date::from_str(value).is_ok() {
        Some(xsd::DATE)
    } else {
        None
    }
}

/// `[+-]?[0-9]+`, for integers too large for [`Integer`].
fn is_integer_lexical(value: &str) -> bool {
    let digits = value.strip_prefix(['+', '-']).unwrap_or(value);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("42", Some(xsd::INTEGER))]
    #[case("-7", Some(xsd::INTEGER))]
    #[case("12345678901234567890", Some(xsd::INTEGER))]
    #[case("-123456789012345678901234567890", Some(xsd::INTEGER))]
    #[case("+", None)]
    #[case("3.25", Some(xsd::DECIMAL))]
    #[case("2024-02-29T10:15:00Z", Some(xsd::DATE_TIME))]
    #[case("2024-02-29", Some(xsd::DATE))]
    #[case("Bob", None)]
    #[case("12 apples", None)]
    #[case("", None)]
    fn infers_in_order(#[case] value: &str, #[case] expected: Option<NamedNodeRef<'static>>) {
        assert_eq!(infer(value), expected);
    }
}
