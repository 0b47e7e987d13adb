// src/core/language.rs

//! The closed set of source languages the service accepts.

use crate::core::MossError;
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};

/// A source language, rendered as the exact token sent in the `language` header
/// and in every `file` line.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Display,
    AsRefStr,
    EnumString,
    EnumIter,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(try_from = "String", into = "String")]
pub enum Language {
    #[default]
    C,
    Cc,
    Java,
    Ml,
    Pascal,
    Ada,
    Lisp,
    Scheme,
    Haskell,
    Fortran,
    Ascii,
    Vhdl,
    Perl,
    Matlab,
    Python,
    Mips,
    Prolog,
    Spice,
    Vb,
    CSharp,
    Modula2,
    A8086,
    JavaScript,
    Plsql,
}

impl Language {
    /// Parses a protocol token, ignoring ASCII case. Unknown tokens are rejected
    /// here, at configuration time, never at send time.
    pub fn parse(token: &str) -> Result<Self, MossError> {
        token
            .trim()
            .parse::<Language>()
            .map_err(|_| MossError::InvalidConfig(format!("unknown language '{token}'")))
    }

    /// The wire token, e.g. `"python"` or `"csharp"`.
    pub fn as_token(&self) -> &str {
        self.as_ref()
    }

    /// Every supported language, in declaration order.
    pub fn all() -> impl Iterator<Item = Language> {
        Language::iter()
    }
}

impl TryFrom<String> for Language {
    type Error = MossError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Language::parse(&value)
    }
}

impl From<Language> for String {
    fn from(language: Language) -> Self {
        language.as_token().to_string()
    }
}
