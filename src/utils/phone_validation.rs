//! Mobile number validation
//!
//! Purchase payloads carry the buyer's mobile number through to the
//! payment gateway. The gateway rejects malformed numbers with an
//! opaque error, so we validate shape up front: optional leading `+`,
//! then 10 to 15 digits.

pub fn validate_phone_number(number: &str) -> bool {
    let digits = number.strip_prefix('+').unwrap_or(number);
    (10..=15).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ten_digit_number() {
        assert!(validate_phone_number("9999999999"));
    }

    #[test]
    fn test_international_prefix() {
        assert!(validate_phone_number("+919999999999"));
    }

    #[test]
    fn test_too_short() {
        assert!(!validate_phone_number("12345"));
    }

    #[test]
    fn test_too_long() {
        assert!(!validate_phone_number("1234567890123456"));
    }

    #[test]
    fn test_non_digit_characters() {
        assert!(!validate_phone_number("99999-99999"));
        assert!(!validate_phone_number("99999 99999"));
        assert!(!validate_phone_number("abcdefghij"));
        assert!(!validate_phone_number(""));
    }

    #[test]
    fn test_plus_only_prefix() {
        assert!(!validate_phone_number("+"));
        assert!(!validate_phone_number("99+9999999"));
    }
}
