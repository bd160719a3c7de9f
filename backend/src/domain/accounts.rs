//! Ordered account lists claimed by a role.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered sequence of OS account tokens.
///
/// Persisted as a single space-joined string. Parsing never fails: runs of
/// whitespace collapse and empty tokens are dropped, so blank input yields an
/// empty set. Duplicates are kept as typed; the uniqueness validator is the
/// one that rejects them.
///
/// # Examples
/// ```
/// use edgeconfig::domain::AccountSet;
///
/// let accounts = AccountSet::parse("  edge \t query\n");
/// assert_eq!(accounts.tokens(), ["edge", "query"]);
/// assert_eq!(accounts.serialize(), "edge query");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct AccountSet(Vec<String>);

impl AccountSet {
    /// Split a raw account list into tokens.
    pub fn parse(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_owned).collect())
    }

    /// Build a set from already separated tokens.
    pub fn from_tokens<I, T>(tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        Self::parse(
            &tokens
                .into_iter()
                .map(|token| token.as_ref().to_owned())
                .collect::<Vec<_>>()
                .join(" "),
        )
    }

    /// Space-joined form written to the store.
    pub fn serialize(&self) -> String {
        self.0.join(" ")
    }

    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.0.iter().any(|token| token == account)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl fmt::Display for AccountSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

impl From<String> for AccountSet {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<AccountSet> for String {
    fn from(value: AccountSet) -> Self {
        value.serialize()
    }
}
