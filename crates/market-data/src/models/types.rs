use std::fmt;

use serde::{Deserialize, Serialize};

/// The three record kinds kept per symbol.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataKind {
    Quote,
    Historical,
    Company,
}

impl DataKind {
    pub const ALL: [DataKind; 3] = [DataKind::Quote, DataKind::Historical, DataKind::Company];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Historical => "historical",
            Self::Company => "company",
        }
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical form of a ticker symbol: trimmed, upper case.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_ascii_uppercase()
}
