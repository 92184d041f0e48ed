use crate::error::FamilyError;

const HEX_DIGEST_LEN: usize = 40;
const MAX_NICKNAME_LEN: usize = 19;

fn is_hex_digest(s: &str) -> bool {
    s.len() == HEX_DIGEST_LEN && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn is_nickname(s: &str) -> bool {
    (1..=MAX_NICKNAME_LEN).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Puts a `$` in front of bare hex digests in a `MyFamily` list.
pub fn fix_my_family(value: &str) -> Result<String, FamilyError> {
    let mut fixed = Vec::new();

    for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let entry = match entry.strip_prefix('$') {
            Some(digest) if is_hex_digest(digest) => entry.to_string(),
            None if is_hex_digest(entry) => format!("${}", entry),
            None if is_nickname(entry) => entry.to_string(),
            _ => return Err(FamilyError::InvalidEntry(entry.to_string())),
        };
        fixed.push(entry);
    }

    Ok(fixed.join(", "))
}
