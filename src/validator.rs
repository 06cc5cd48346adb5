// 🔢 CNPJ Validator - normalizes and checksum-validates tax identifiers
//
// A CNPJ has 14 digits; the last two are check digits computed with
// mod-11 weighted sums over the preceding digits.

const WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];

/// Keep only ASCII digits ("06.990.590/0001-23" → "06990590000123")
pub fn clean_digits(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Validate an optional identifier; `None` and empty input are invalid.
pub fn validate(identifier: Option<&str>) -> bool {
    identifier.map(is_valid_cnpj).unwrap_or(false)
}

/// Validate a raw (possibly formatted) CNPJ string
pub fn is_valid_cnpj(raw: &str) -> bool {
    let digits: Vec<u32> = raw.chars().filter_map(|c| c.to_digit(10)).collect();

    if digits.len() != 14 {
        return false;
    }

    // Repeated sequences ("00000000000000", "11111111111111") pass the
    // checksum but are never issued
    if digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    if check_digit(&digits[..12], &WEIGHTS_FIRST) != digits[12] {
        return false;
    }

    check_digit(&digits[..13], &WEIGHTS_SECOND) == digits[13]
}

fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let digit = 11 - (sum % 11);
    if digit >= 10 {
        0
    } else {
        digit
    }
}
