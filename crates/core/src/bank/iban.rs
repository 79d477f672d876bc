//! IBAN normalization and checksum validation (ISO 13616).

use crate::ledger::LedgerError;

/// Strips spaces, upper-cases and validates an IBAN.
///
/// # Errors
///
/// Returns `Validation` if the shape or the mod-97 checksum is wrong.
pub fn normalize_iban(raw: &str) -> Result<String, LedgerError> {
    let iban: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let invalid = |reason: &str| LedgerError::Validation(format!("invalid IBAN '{raw}': {reason}"));

    if !(15..=34).contains(&iban.len()) {
        return Err(invalid("length must be 15 to 34 characters"));
    }
    let bytes = iban.as_bytes();
    if !bytes[..2].iter().all(u8::is_ascii_uppercase) || !bytes[2..4].iter().all(u8::is_ascii_digit) {
        return Err(invalid("must start with a country code and check digits"));
    }
    if !bytes.iter().all(u8::is_ascii_alphanumeric) {
        return Err(invalid("only letters and digits are allowed"));
    }

    // move the first four characters to the end, map letters to 10..35, mod 97
    let remainder = bytes[4..]
        .iter()
        .chain(&bytes[..4])
        .fold(0u32, |acc, &b| {
            let value = if b.is_ascii_digit() {
                u32::from(b - b'0')
            } else {
                u32::from(b - b'A') + 10
            };
            if value >= 10 {
                (acc * 100 + value) % 97
            } else {
                (acc * 10 + value) % 97
            }
        });

    if remainder != 1 {
        return Err(invalid("checksum mismatch"));
    }
    Ok(iban)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_spanish_iban() {
        assert_eq!(
            normalize_iban("es91 2100 0418 4502 0005 1332").unwrap(),
            "ES9121000418450200051332"
        );
    }

    #[test]
    fn test_checksum_mismatch() {
        assert!(normalize_iban("ES9221000418450200051332").is_err());
    }

    #[test]
    fn test_bad_shape() {
        assert!(normalize_iban("1234").is_err());
        assert!(normalize_iban("E59121000418450200051332").is_err());
        assert!(normalize_iban("ES91-2100-0418-4502-0005-1332").is_err());
    }
}
