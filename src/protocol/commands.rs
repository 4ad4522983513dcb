//! Module `commands`
//!
//! Defines the FTP command value produced from one terminated input line.

use std::fmt;

/// An FTP command: upper-cased verb plus its (trimmed) argument text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    name: String,
    argument: String,
}

impl Command {
    pub fn new(name: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            name: name.into().to_ascii_uppercase(),
            argument: argument.into().trim().to_string(),
        }
    }

    /// Splits a line at the first space. A line without a space is a verb
    /// with an empty argument.
    pub fn parse(line: &str) -> Self {
        match line.split_once(' ') {
            Some((name, argument)) => Self::new(name, argument),
            None => Self::new(line, ""),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn argument(&self) -> &str {
        &self.argument
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.argument.is_empty() {
            write!(f, "{}", self.name)
        } else if self.name == "PASS" {
            write!(f, "PASS ****")
        } else {
            write!(f, "{} {}", self.name, self.argument)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic_commands() {
        let command = Command::parse("quit");
        assert_eq!(command.name(), "QUIT");
        assert_eq!(command.argument(), "");
    }

    #[test]
    fn test_parse_commands_with_args() {
        let command = Command::parse("Cwd  /some/path  ");
        assert_eq!(command.name(), "CWD");
        assert_eq!(command.argument(), "/some/path");
    }

    #[test]
    fn test_argument_keeps_inner_spaces() {
        let command = Command::parse("STOR my file.txt");
        assert_eq!(command.argument(), "my file.txt");
    }

    #[test]
    fn test_display_masks_password() {
        assert_eq!(Command::parse("PASS secret").to_string(), "PASS ****");
        assert_eq!(Command::parse("USER bob").to_string(), "USER bob");
    }
}
