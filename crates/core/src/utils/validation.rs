//! Small input checks shared by the sign-up, donation and campaign forms.

/// Loose structural email check: one `@`, a non-empty local part and a
/// dotted domain without whitespace.
pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    let mut labels = domain.split('.');
    let first = labels.next().unwrap_or_default();
    let rest: Vec<&str> = labels.collect();
    !first.is_empty() && !rest.is_empty() && rest.iter().all(|l| !l.is_empty())
}

/// Whether `value`, trimmed, has at least `min` characters.
pub fn has_min_chars(value: &str, min: usize) -> bool {
    value.trim().chars().count() >= min
}
