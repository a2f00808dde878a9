/// Whether `v` looks like a 256-bit hash: `0x`-prefixed, 64 hex digits.
pub fn is_256bit_hash(v: &str) -> bool {
    let v = v.strip_prefix("0x").unwrap_or(v);
    v.len() == 64 && v.chars().all(|c| c.is_ascii_hexdigit())
}

/// Whether `v` looks like a 20-byte Ethereum address: `0x`-prefixed, 40 hex
/// digits.
pub fn is_address(v: &str) -> bool {
    let v = v.strip_prefix("0x").unwrap_or(v);
    v.len() == 40 && v.chars().all(|c| c.is_ascii_hexdigit())
}

/// Validate a list of `(condition, error-if-false)` pairs, collecting every
/// failing condition's message rather than stopping at the first.
pub fn validate_conditions(conds: &[(bool, &str)]) -> (bool, Vec<String>) {
    let errors: Vec<String> =
        conds.iter().filter(|(ok, _)| !ok).map(|(_, msg)| msg.to_string()).collect();

    (errors.is_empty(), errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_well_formed_hash() {
        let hash = format!("0x{}", "ab".repeat(32));
        assert!(is_256bit_hash(&hash));
    }

    #[test]
    fn rejects_short_hash() {
        assert!(!is_256bit_hash("0xabcd"));
    }

    #[test]
    fn recognizes_well_formed_address() {
        let addr = format!("0x{}", "ab".repeat(20));
        assert!(is_address(&addr));
    }

    #[test]
    fn rejects_non_hex_address() {
        let addr = format!("0x{}zz", "ab".repeat(19));
        assert!(!is_address(&addr));
    }

    #[test]
    fn collects_all_failing_conditions() {
        let (ok, errors) = validate_conditions(&[(true, "a"), (false, "b"), (false, "c")]);
        assert!(!ok);
        assert_eq!(errors, vec!["b".to_string(), "c".to_string()]);
    }
}
