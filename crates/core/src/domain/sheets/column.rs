use std::{fmt::Formatter, str::FromStr};

use thiserror::Error;

/// A worksheet column, stored as a zero-based index and displayed as letters (`A`, `B`, ..., `AA`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Column {
    index: u32,
}

impl Column {
    pub fn from_index(index: u32) -> Self {
        Column { index }
    }

    /// Builds a column from its 1-based number, as the spreadsheet service counts them.
    pub fn from_number(number: u32) -> Option<Self> {
        number.checked_sub(1).map(Column::from_index)
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn number(&self) -> u32 {
        self.index + 1
    }

    pub fn letters(&self) -> String {
        number_to_letters(self.number())
    }
}

impl std::fmt::Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.letters())
    }
}

impl std::fmt::Debug for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Column(number: {}, letters: {})", self.number(), self)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnParseError {
    #[error("column is empty")]
    Empty,
    #[error("column number must be 1 or greater")]
    Zero,
    #[error("column must be a number or letters, got '{0}'")]
    Invalid(String),
}

/// Accepts either a 1-based column number (`"6"`) or column letters (`"F"`, case-insensitive).
impl FromStr for Column {
    type Err = ColumnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ColumnParseError::Empty);
        }

        if s.chars().all(|c| c.is_ascii_digit()) {
            let number = s
                .parse::<u32>()
                .map_err(|_| ColumnParseError::Invalid(s.to_owned()))?;
            return Column::from_number(number).ok_or(ColumnParseError::Zero);
        }

        parse_letters(s)
    }
}

fn parse_letters(letters: &str) -> Result<Column, ColumnParseError> {
    if letters.chars().any(|c| !c.is_ascii_alphabetic()) {
        return Err(ColumnParseError::Invalid(letters.to_owned()));
    }

    let number = letters
        .chars()
        .map(|c| c.to_ascii_uppercase())
        .try_fold(0u32, |acc, c| {
            acc.checked_mul(26)?
                .checked_add(c as u32 - 'A' as u32 + 1)
        })
        .ok_or_else(|| ColumnParseError::Invalid(letters.to_owned()))?;

    Column::from_number(number).ok_or(ColumnParseError::Zero)
}

fn number_to_letters(number: u32) -> String {
    let mut number = number;
    let mut result = Vec::new();
    while number > 0 {
        let remainder = (number - 1) % 26;
        result.push((remainder as u8 + b'A') as char);
        number = (number - remainder) / 26;
    }
    result.iter().rev().collect()
}
