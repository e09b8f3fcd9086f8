//! Plant bed letter codes: `A`..`Z`, then `A1`, `A2`, …

/// First code not present in `existing`. Comparison is case-insensitive.
pub fn next_letter_code<S: AsRef<str>>(existing: &[S]) -> String {
    let taken: Vec<String> = existing
        .iter()
        .map(|c| c.as_ref().trim().to_ascii_uppercase())
        .collect();

    for letter in b'A'..=b'Z' {
        let code = (letter as char).to_string();
        if !taken.contains(&code) {
            return code;
        }
    }

    (1..)
        .map(|n| format!("A{}", n))
        .find(|code| !taken.contains(code))
        .unwrap_or_else(|| "A1".to_string())
}

/// A letter code is one uppercase letter optionally followed by digits.
pub fn is_valid_letter_code(code: &str) -> bool {
    let mut chars = code.chars();
    match chars.next() {
        Some(c) if c.is_ascii_uppercase() => chars.all(|c| c.is_ascii_digit()),
        _ => false,
    }
}

/// Sort key placing `B` before `A1` and `A2` before `A10`.
pub fn sort_key(code: &str) -> (usize, String) {
    (code.len(), code.to_string())
}
