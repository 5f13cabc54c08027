//! Authentication for OpenSubsonic requests.

use md5::{Digest, Md5};
use rand::Rng;

/// Credentials used to sign each request.
#[derive(Debug, Clone)]
pub enum Credentials {
    /// Salted token authentication (API 1.13.0+). A fresh salt is drawn for
    /// every request, so every signed URL differs.
    Token { username: String, password: String },
    /// API key authentication (OpenSubsonic extension)
    ApiKey { api_key: String },
}

impl Credentials {
    pub fn from_password(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Token {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        Self::ApiKey {
            api_key: api_key.into(),
        }
    }

    /// Query parameters signing one request.
    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Token { username, password } => {
                let salt = generate_salt();
                let token = generate_token(password, &salt);
                vec![("u", username.clone()), ("t", token), ("s", salt)]
            }
            Self::ApiKey { api_key } => vec![("apiKey", api_key.clone())],
        }
    }
}

/// Generate a random lowercase alphanumeric salt.
fn generate_salt() -> String {
    let mut rng = rand::thread_rng();
    (0..16)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}

/// md5(password + salt), hex encoded.
fn generate_token(password: &str, salt: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_generation() {
        // password = "sesame", salt = "c19b2d"
        let token = generate_token("sesame", "c19b2d");
        assert_eq!(token, "26719a1196d2a940705a59634eb18eab");
    }

    #[test]
    fn test_salt_shape() {
        let salt = generate_salt();
        assert_eq!(salt.len(), 16);
        assert!(salt
            .chars()
            .all(|c| c.is_ascii_digit() || c.is_ascii_lowercase()));
    }

    #[test]
    fn test_token_params_are_fresh_per_request() {
        let credentials = Credentials::from_password("testuser", "testpass");
        let first = credentials.query_params();
        let second = credentials.query_params();

        let keys: Vec<_> = first.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec!["u", "t", "s"]);
        assert_eq!(first[0].1, "testuser");
        assert_eq!(first[1].1, generate_token("testpass", &first[2].1));
        assert_ne!(first[2].1, second[2].1);
    }

    #[test]
    fn test_api_key_params() {
        let params = Credentials::from_api_key("my-api-key").query_params();
        assert_eq!(params, vec![("apiKey", String::from("my-api-key"))]);
    }
}
