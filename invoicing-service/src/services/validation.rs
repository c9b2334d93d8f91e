//! Checksum validation for Polish tax ids and bank accounts.

use crate::error::InvoicingError;

const NIP_WEIGHTS: [u32; 9] = [6, 5, 7, 2, 3, 4, 5, 6, 7];

/// Strip the separators people commonly type into a NIP (`123-456-32-18`).
pub fn normalize_nip(raw: &str) -> String {
    raw.chars().filter(|c| !matches!(c, '-' | ' ')).collect()
}

/// Whether `raw` is a NIP with a valid weighted checksum.
pub fn is_valid_nip(raw: &str) -> bool {
    let nip = normalize_nip(raw);
    if nip.len() != 10 || !nip.chars().all(|c| c.is_ascii_digit()) {
        return false;
    }
    let digits: Vec<u32> = nip.chars().filter_map(|c| c.to_digit(10)).collect();
    let checksum = NIP_WEIGHTS
        .iter()
        .zip(&digits)
        .map(|(w, d)| w * d)
        .sum::<u32>()
        % 11;
    checksum != 10 && checksum == digits[9]
}

/// Validate and normalize a NIP, returning the bare 10 digits.
pub fn validate_nip(raw: &str) -> Result<String, InvoicingError> {
    if is_valid_nip(raw) {
        Ok(normalize_nip(raw))
    } else {
        Err(InvoicingError::validation(format!("Invalid NIP '{}'", raw)))
    }
}

/// Whether `raw` is an IBAN with a valid mod-97 checksum. A bare 26-digit
/// Polish account number is accepted as `PL` + digits.
pub fn is_valid_iban(raw: &str) -> bool {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_uppercase();

    let iban = if compact.len() == 26 && compact.chars().all(|c| c.is_ascii_digit()) {
        format!("PL{}", compact)
    } else {
        compact
    };

    if !(15..=34).contains(&iban.len())
        || !iban.chars().all(|c| c.is_ascii_alphanumeric())
        || !iban[..2].chars().all(|c| c.is_ascii_alphabetic())
        || !iban[2..4].chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }

    let rearranged = format!("{}{}", &iban[4..], &iban[..4]);
    let remainder = rearranged.chars().fold(0u32, |acc, c| {
        // Letters expand to two digits (A = 10 .. Z = 35).
        let value = c.to_digit(36).unwrap_or(0);
        if value >= 10 {
            (acc * 100 + value) % 97
        } else {
            (acc * 10 + value) % 97
        }
    });
    remainder == 1
}

/// Validate a bank account number, returning it without whitespace.
pub fn validate_iban(raw: &str) -> Result<String, InvoicingError> {
    if is_valid_iban(raw) {
        Ok(raw.chars().filter(|c| !c.is_whitespace()).collect())
    } else {
        Err(InvoicingError::validation(format!(
            "Invalid bank account number '{}'",
            raw
        )))
    }
}

/// Fail when `value` is longer than `max` characters.
pub fn check_length(field: &str, value: &str, max: usize) -> Result<(), InvoicingError> {
    if value.chars().count() > max {
        return Err(InvoicingError::validation(format!(
            "{} is longer than {} characters",
            field, max
        )));
    }
    Ok(())
}

/// Trim a free-text field, mapping blank input to `None`.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
