use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Eq, PartialEq, Ord, PartialOrd, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum MatchCase {
    #[default]
    Sensitive,
    Insensitive,
}

/// Glob pattern over labels where `*` matches any run of characters.
///
/// `*` is the only metacharacter and a pattern always matches the whole
/// label, so `"Radio Astronomy*"` matches `"Radio Astronomy"` and
/// `"Radio Astronomy (passive)"` but not `"The Radio Astronomy"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct WildcardPattern {
    raw: String,
    case: MatchCase,
    parts: Vec<String>,
}

impl WildcardPattern {
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self::with_case(raw, MatchCase::Sensitive)
    }

    #[must_use]
    pub fn with_case(raw: impl Into<String>, case: MatchCase) -> Self {
        let raw = raw.into();
        let parts = match case {
            MatchCase::Sensitive => raw.split('*').map(str::to_string).collect(),
            MatchCase::Insensitive => raw.split('*').map(str::to_lowercase).collect(),
        };
        Self { raw, case, parts }
    }

    #[must_use]
    pub fn case_insensitive(self) -> Self {
        Self::with_case(self.raw, MatchCase::Insensitive)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    #[must_use]
    pub fn case(&self) -> MatchCase {
        self.case
    }

    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        match self.case {
            MatchCase::Sensitive => match_parts(&self.parts, text),
            MatchCase::Insensitive => match_parts(&self.parts, &text.to_lowercase()),
        }
    }
}

/// `parts` are the literal runs between `*`s. Leftmost placement of each
/// middle run is optimal for this grammar, so no backtracking is needed.
fn match_parts(parts: &[String], text: &str) -> bool {
    let Some((first, rest)) = parts.split_first() else {
        return text.is_empty();
    };
    let Some((last, middle)) = rest.split_last() else {
        return text == first;
    };
    let Some(mut remaining) = text.strip_prefix(first.as_str()) else {
        return false;
    };
    for part in middle {
        match remaining.find(part.as_str()) {
            Some(index) => remaining = &remaining[index + part.len()..],
            None => return false,
        }
    }
    remaining.ends_with(last.as_str())
}

impl PartialEq for WildcardPattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw && self.case == other.case
    }
}

impl Eq for WildcardPattern {}

impl From<String> for WildcardPattern {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&str> for WildcardPattern {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<WildcardPattern> for String {
    fn from(pattern: WildcardPattern) -> Self {
        pattern.raw
    }
}

impl FromStr for WildcardPattern {
    type Err = std::convert::Infallible;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Ok(Self::new(raw))
    }
}

impl Display for WildcardPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}
