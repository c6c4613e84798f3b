//! Metadata tokens identifying definition rows.

use std::fmt;

/// A metadata token identifying a row in one of the definition tables.
///
/// Tokens consist of a 32-bit value where:
/// - The high byte (bits 24-31) indicates the table
/// - The low 24 bits (bits 0-23) indicate the 1-based row within that table
///
/// The patch engine identifies methods exclusively through `MethodDef` tokens, so a
/// method keeps its identity for the whole session no matter how its body is edited.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Table id of `TypeDef`
    pub const TYPE_DEF: u8 = 0x02;
    /// Table id of `Field`
    pub const FIELD: u8 = 0x04;
    /// Table id of `MethodDef`
    pub const METHOD_DEF: u8 = 0x06;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Creates a token for `row` of `table`
    #[must_use]
    pub fn from_parts(table: u8, row: u32) -> Self {
        Token((u32::from(table) << 24) | (row & 0x00FF_FFFF))
    }

    /// Creates a `MethodDef` token
    #[must_use]
    pub fn method_def(row: u32) -> Self {
        Self::from_parts(Self::METHOD_DEF, row)
    }

    /// Creates a `TypeDef` token
    #[must_use]
    pub fn type_def(row: u32) -> Self {
        Self::from_parts(Self::TYPE_DEF, row)
    }

    /// Creates a `Field` token
    #[must_use]
    pub fn field_def(row: u32) -> Self {
        Self::from_parts(Self::FIELD, row)
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

    /// Returns true if this token points into the `MethodDef` table
    #[must_use]
    pub fn is_method_def(&self) -> bool {
        self.table() == Self::METHOD_DEF && self.row() != 0
    }

    /// Returns true if this is a null token (value 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.0 == 0
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token::method_def(0x2A);
        assert_eq!(token.value(), 0x0600_002A);
        assert_eq!(token.table(), Token::METHOD_DEF);
        assert_eq!(token.row(), 0x2A);
        assert!(token.is_method_def());
    }

    #[test]
    fn test_token_kinds() {
        assert!(!Token::type_def(1).is_method_def());
        assert_eq!(Token::field_def(3).table(), 0x04);
        assert!(!Token::method_def(0).is_method_def());
        assert!(Token(0).is_null());
    }

    #[test]
    fn test_token_row_is_masked() {
        let token = Token::from_parts(0x06, 0x0100_0005);
        assert_eq!(token.table(), 0x06);
        assert_eq!(token.row(), 5);
    }

    #[test]
    fn test_token_formatting() {
        let token = Token::method_def(1);
        assert_eq!(format!("{token}"), "0x06000001");
        assert_eq!(
            format!("{token:?}"),
            "Token(0x06000001, table: 0x06, row: 1)"
        );
    }

    #[test]
    fn test_token_ordering() {
        let mut tokens = vec![Token::method_def(3), Token::type_def(9), Token::method_def(1)];
        tokens.sort();
        assert_eq!(
            tokens,
            vec![Token::type_def(9), Token::method_def(1), Token::method_def(3)]
        );
    }
}
