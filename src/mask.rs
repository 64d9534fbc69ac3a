//! Log masking for credentials.

use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

/// Renders a secret in a non-reversible-at-a-glance form for logs:
/// the Base64 of its UTF-8 bytes in reverse order. Empty input renders empty.
#[derive(Clone, Copy)]
pub struct Masked<'a>(pub &'a str);

impl Masked<'_> {
    pub fn render(&self) -> String {
        if self.0.is_empty() {
            return String::new();
        }
        let reversed: Vec<u8> = self.0.bytes().rev().collect();
        STANDARD.encode(reversed)
    }
}

impl fmt::Display for Masked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl fmt::Debug for Masked<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_renders_empty() {
        assert_eq!(Masked("").to_string(), "");
    }

    #[test]
    fn reverses_then_encodes() {
        // "abc" reversed is "cba"
        assert_eq!(Masked("abc").to_string(), STANDARD.encode("cba"));
    }

    #[test]
    fn never_echoes_plaintext() {
        let secret = "FAKEPASSWORD1234";
        assert!(!Masked(secret).to_string().contains(secret));
        assert!(!format!("{:?}", Masked(secret)).contains(secret));
    }
}
