//! CNPJ and CPF (Brazilian taxpayer IDs) validation and formatting.

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Mod-11 check digit used by both CNPJ and CPF.
fn check_digit(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let rest = sum % 11;
    if rest < 2 { 0 } else { 11 - rest }
}

/// Validate a CNPJ using its two check digits.
///
/// CNPJ format: 14 digits (`XX.XXX.XXX/XXXX-XX`), punctuation optional.
pub fn validate_cnpj(cnpj: &str) -> bool {
    let digits = digits_of(cnpj);

    if digits.len() != 14 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let first = check_digit(&digits[..12], &[5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&digits[..13], &[6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2]);

    digits[12] == first && digits[13] == second
}

/// Validate a CPF using its two check digits.
///
/// CPF format: 11 digits (`XXX.XXX.XXX-XX`), punctuation optional.
pub fn validate_cpf(cpf: &str) -> bool {
    let digits = digits_of(cpf);

    if digits.len() != 11 || digits.iter().all(|d| *d == digits[0]) {
        return false;
    }

    let first = check_digit(&digits[..9], &[10, 9, 8, 7, 6, 5, 4, 3, 2]);
    let second = check_digit(&digits[..10], &[11, 10, 9, 8, 7, 6, 5, 4, 3, 2]);

    digits[9] == first && digits[10] == second
}

/// Validate either a CNPJ or a CPF, chosen by digit count.
pub fn validate_document(value: &str) -> bool {
    match digits_of(value).len() {
        14 => validate_cnpj(value),
        11 => validate_cpf(value),
        _ => false,
    }
}

/// Format a CNPJ as `XX.XXX.XXX/XXXX-XX`.
pub fn format_cnpj(cnpj: &str) -> String {
    let digits: String = cnpj.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.len() != 14 {
        return cnpj.to_string();
    }

    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}
