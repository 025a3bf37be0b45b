//! Cache key layout.
//!
//! These strings are shared with anything else reading the same Redis, so
//! their format is fixed.

/// Key holding the full plan catalog
pub const PLANS: &str = "plans";

/// Key holding a user's current subscription: `"<user_id>:sub"`
pub fn subscription(user_id: i64) -> String {
    format!("{}:sub", user_id)
}

/// Key holding the most recently issued session token: `"user:<user_id>:session"`
pub fn session(user_id: i64) -> String {
    format!("user:{}:session", user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        assert_eq!(PLANS, "plans");
        assert_eq!(subscription(42), "42:sub");
        assert_eq!(session(42), "user:42:session");
    }
}
