//! Secret wrapper for sensitive values (access/refresh tokens).

use std::fmt;

use zeroize::Zeroize;

/// Sensitive value, redacted in `Debug`/`Display` and zeroized on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value. Use sparingly, and never log the result.
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Zeroize + serde::Serialize> serde::Serialize for Secret<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Zeroize + serde::Deserialize<'de>> serde::Deserialize<'de> for Secret<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Secret(T::deserialize(deserializer)?))
    }
}

/// Redacts a token down to a short fingerprint suitable for dashboards/logs.
pub fn fingerprint(token: &str) -> String {
    if token.len() <= 8 {
        return "*".repeat(token.len());
    }
    format!("{}…{}", &token[..4], &token[token.len() - 4..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_debug_and_display() {
        let secret = Secret::new(String::from("sk-my-api-key"));
        assert_eq!(format!("{secret:?}"), "[REDACTED]");
        assert_eq!(format!("{secret}"), "[REDACTED]");
    }

    #[test]
    fn exposes_inner_value() {
        let secret = Secret::new(String::from("sk-my-api-key"));
        assert_eq!(secret.expose(), "sk-my-api-key");
    }

    #[test]
    fn clone_is_independent() {
        let secret = Secret::new(String::from("token-a"));
        let cloned = secret.clone();
        drop(secret);
        assert_eq!(cloned.expose(), "token-a");
    }

    #[test]
    fn fingerprint_short_token_is_fully_masked() {
        assert_eq!(fingerprint("abc"), "***");
    }

    #[test]
    fn fingerprint_long_token_keeps_head_and_tail() {
        assert_eq!(fingerprint("sk-ant-0123456789abcdef"), "sk-a…cdef");
    }
}
