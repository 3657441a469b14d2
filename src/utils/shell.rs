//! POSIX shell quoting and secret masking for remote command strings.

pub const REDACTED: &str = "****";

/// Quotes a value for a POSIX shell. Values made only of safe characters
/// are returned unchanged so logged commands stay readable.
pub fn quote(value: &str) -> String {
    let safe = |c: char| {
        c.is_ascii_alphanumeric()
            || matches!(c, '-' | '_' | '.' | '/' | ':' | '@' | '=' | ',' | '+')
    };
    if !value.is_empty() && value.chars().all(safe) {
        return value.to_string();
    }

    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Replaces every occurrence of each non-empty secret, in raw and quoted form.
pub fn redact(command: &str, secrets: &[&str]) -> String {
    let mut result = command.to_string();
    for secret in secrets.iter().filter(|s| !s.is_empty()) {
        let quoted = quote(secret);
        if quoted != *secret {
            result = result.replace(&quoted, REDACTED);
        }
        result = result.replace(secret, REDACTED);
    }
    result
}
