//! ISO 4217 currency codes.

use std::{fmt::Display, str::FromStr};

use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};

use crate::Error;

/// A three letter currency code such as "USD" or "PLN", always upper case.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Create a currency code.
    ///
    /// Surrounding whitespace is ignored and letters are converted to upper case.
    ///
    /// # Errors
    ///
    /// This function will return an [Error::InvalidCurrency] if `code` is not
    /// exactly three ASCII letters.
    pub fn new(code: &str) -> Result<Self, Error> {
        let code = code.trim();

        if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
            Ok(Self(code.to_ascii_uppercase()))
        } else {
            Err(Error::InvalidCurrency(code.to_owned()))
        }
    }

    /// Create a currency code without validation.
    ///
    /// The caller should ensure that the string is a three letter upper case code.
    ///
    /// This function has `_unchecked` in the name but is not `unsafe`, because if the invariant
    /// is violated it will cause incorrect behaviour but not affect memory safety.
    pub fn new_unchecked(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl Default for CurrencyCode {
    fn default() -> Self {
        Self::new_unchecked("USD")
    }
}

impl AsRef<str> for CurrencyCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for CurrencyCode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::new(s)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        CurrencyCode::new(&value)
    }
}

impl From<CurrencyCode> for String {
    fn from(value: CurrencyCode) -> Self {
        value.0
    }
}

impl Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ToSql for CurrencyCode {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        self.0.to_sql()
    }
}

impl FromSql for CurrencyCode {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value.as_str().map(CurrencyCode::new_unchecked)
    }
}
