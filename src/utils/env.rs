/// Get environment variable with SUBLEDGER_ prefix, falling back to unprefixed version
///
/// Checks `SUBLEDGER_{key}` first, then `{key}`, so conventional names such as
/// `DATABASE_URL` or `JWT_SECRET` keep working.
pub fn get_env_with_prefix(key: &str) -> Option<String> {
    std::env::var(format!("SUBLEDGER_{}", key))
        .or_else(|_| std::env::var(key))
        .ok()
}

/// Parse an environment variable, ignoring values that fail to parse
pub fn parse_env_with_prefix<T: std::str::FromStr>(key: &str) -> Option<T> {
    get_env_with_prefix(key).and_then(|value| match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!(key = %key, value = %value, "Ignoring unparsable environment variable");
            None
        }
    })
}
