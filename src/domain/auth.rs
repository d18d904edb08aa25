// Bearer credential
use std::fmt;

/// Opaque bearer credential. Freshness is tracked by the token manager, not here.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    /// Value for the `X-Authorization` header.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_header_value() {
        assert_eq!(AuthToken::new("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn test_debug_redacts_value() {
        assert_eq!(format!("{:?}", AuthToken::new("secret")), "AuthToken(***)");
    }
}
