//! Data connection modes and representation types.

use std::fmt;

/// Which side opens the data connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferMode {
    /// PORT/EPRT: the server connects to the client.
    Active,
    /// PASV/EPSV: the client connects to a listener opened by the server.
    Passive,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferMode::Active => f.write_str("active"),
            TransferMode::Passive => f.write_str("passive"),
        }
    }
}

/// Data channel protection selected with PROT.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProtectionLevel {
    #[default]
    Clear,
    Private,
}

/// Representation type selected with TYPE. Transfers are byte-for-byte in both cases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DataType {
    Ascii,
    #[default]
    Image,
}

impl DataType {
    pub fn from_argument(argument: &str) -> Option<Self> {
        let mut parts = argument.split_whitespace();
        match parts.next()?.to_ascii_uppercase().as_str() {
            "A" => Some(DataType::Ascii),
            "I" | "L" => Some(DataType::Image),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Ascii => f.write_str("ASCII"),
            DataType::Image => f.write_str("BINARY"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_arguments() {
        assert_eq!(DataType::from_argument("A"), Some(DataType::Ascii));
        assert_eq!(DataType::from_argument("a N"), Some(DataType::Ascii));
        assert_eq!(DataType::from_argument("I"), Some(DataType::Image));
        assert_eq!(DataType::from_argument("L 8"), Some(DataType::Image));
        assert_eq!(DataType::from_argument("E"), None);
        assert_eq!(DataType::from_argument(""), None);
    }
}
