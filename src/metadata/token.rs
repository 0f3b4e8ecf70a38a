use std::fmt;
use std::hash::{Hash, Hasher};

/// An opaque native metadata token identifying a descriptor in the AOT-compiled binary.
///
/// Tokens are carried over from the native metadata tables onto every reconstructed
/// managed entity, both as the entity's identity within the type graph and as the
/// value of the injected token provenance attribute. They are *never* used for
/// override resolution - the native data carries no token cross-reference for
/// explicit overrides, which is why that resolution is name-based.
///
/// The 32-bit layout follows the usual convention:
/// - The high byte (bits 24-31) indicates the table type
/// - The low 24 bits (bits 0-23) indicate the row index within that table
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Token(pub u32);

impl Token {
    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Renders the token the way provenance attributes carry it: a `0x`-prefixed,
    /// uppercase hexadecimal string without zero padding.
    #[must_use]
    pub fn provenance_string(&self) -> String {
        format!("0x{:X}", self.0)
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl From<Token> for u32 {
    fn from(token: Token) -> Self {
        token.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_table_and_row() {
        let token = Token::new(0x06000001);
        assert_eq!(token.value(), 0x06000001);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 1);

        let token2 = Token(0x02FFFFFF);
        assert_eq!(token2.table(), 0x02);
        assert_eq!(token2.row(), 0x00FFFFFF);
    }

    #[test]
    fn test_token_is_null() {
        assert!(Token(0).is_null());
        assert!(!Token(0x06000001).is_null());
    }

    #[test]
    fn test_token_display() {
        let token = Token(0x06000001);
        assert_eq!(format!("{}", token), "0x06000001");
    }

    #[test]
    fn test_token_provenance_string() {
        // Uppercase hex, no zero padding - matches the injected attribute format.
        assert_eq!(Token(0x060001AB).provenance_string(), "0x60001AB");
        assert_eq!(Token(0x1).provenance_string(), "0x1");
    }

    #[test]
    fn test_token_from_conversion() {
        let token: Token = 0x04000002u32.into();
        assert_eq!(token.value(), 0x04000002);
        let raw: u32 = token.into();
        assert_eq!(raw, 0x04000002);
    }
}
