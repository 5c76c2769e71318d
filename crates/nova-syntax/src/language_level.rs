//! Java language level and the library features it unlocks.
//!
//! Nova parses a superset grammar regardless of level. The level only decides
//! which `java.util.stream` APIs a rewrite is allowed to emit.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The Java feature release a source file targets (8, 11, 17, 21, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JavaLanguageLevel {
    pub major: u16,
}

impl JavaLanguageLevel {
    pub const JAVA_8: Self = Self { major: 8 };
    pub const JAVA_9: Self = Self { major: 9 };
    pub const JAVA_11: Self = Self { major: 11 };
    pub const JAVA_17: Self = Self { major: 17 };
    pub const JAVA_21: Self = Self { major: 21 };

    #[inline]
    pub const fn from_major(major: u16) -> Self {
        Self { major }
    }

    pub fn is_enabled(self, feature: JavaFeature) -> bool {
        self.major >= feature.stable_since()
    }

    #[inline]
    pub fn supports_take_while(self) -> bool {
        self.is_enabled(JavaFeature::StreamTakeWhile)
    }

    #[inline]
    pub fn supports_iterate_with_predicate(self) -> bool {
        self.is_enabled(JavaFeature::StreamIterateWithPredicate)
    }

    #[inline]
    pub fn supports_unmodifiable_collectors(self) -> bool {
        self.is_enabled(JavaFeature::UnmodifiableCollectors)
    }

    #[inline]
    pub fn supports_char_sequence_is_empty(self) -> bool {
        self.is_enabled(JavaFeature::CharSequenceIsEmpty)
    }
}

impl Default for JavaLanguageLevel {
    fn default() -> Self {
        JavaLanguageLevel::JAVA_8
    }
}

impl fmt::Display for JavaLanguageLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.major)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid Java language level `{0}`")]
pub struct ParseLanguageLevelError(String);

impl FromStr for JavaLanguageLevel {
    type Err = ParseLanguageLevelError;

    /// Accepts `17`, `1.8` and `JDK_17`-style spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("JDK_")
            .or_else(|| trimmed.strip_prefix("jdk"))
            .unwrap_or(trimmed);
        let digits = digits.strip_prefix("1.").or_else(|| digits.strip_prefix("1_")).unwrap_or(digits);
        match digits.parse::<u16>() {
            Ok(major) if major >= 1 => Ok(Self { major }),
            _ => Err(ParseLanguageLevelError(s.to_string())),
        }
    }
}

impl Serialize for JavaLanguageLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for JavaLanguageLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u16),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(major) => Ok(Self { major }),
            Raw::Text(text) => text.parse().map_err(serde::de::Error::custom),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JavaFeature {
    StreamTakeWhile,            // Java 9+
    StreamIterateWithPredicate, // Java 9+
    UnmodifiableCollectors,     // Java 10+
    CharSequenceIsEmpty,        // Java 15+
}

impl JavaFeature {
    pub const fn display_name(self) -> &'static str {
        match self {
            JavaFeature::StreamTakeWhile => "Stream.takeWhile",
            JavaFeature::StreamIterateWithPredicate => "Stream.iterate with a predicate",
            JavaFeature::UnmodifiableCollectors => "Collectors.toUnmodifiable*",
            JavaFeature::CharSequenceIsEmpty => "CharSequence.isEmpty",
        }
    }

    pub const fn stable_since(self) -> u16 {
        match self {
            JavaFeature::StreamTakeWhile | JavaFeature::StreamIterateWithPredicate => 9,
            JavaFeature::UnmodifiableCollectors => 10,
            JavaFeature::CharSequenceIsEmpty => 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_common_spellings() {
        assert_eq!("1.8".parse(), Ok(JavaLanguageLevel::JAVA_8));
        assert_eq!("17".parse(), Ok(JavaLanguageLevel::JAVA_17));
        assert_eq!("JDK_11".parse(), Ok(JavaLanguageLevel::JAVA_11));
        assert!("latest".parse::<JavaLanguageLevel>().is_err());
    }

    #[test]
    fn gates_library_features() {
        assert!(!JavaLanguageLevel::JAVA_8.supports_take_while());
        assert!(JavaLanguageLevel::JAVA_9.supports_iterate_with_predicate());
        assert!(!JavaLanguageLevel::JAVA_9.supports_unmodifiable_collectors());
        assert!(JavaLanguageLevel::JAVA_11.supports_unmodifiable_collectors());
        assert!(!JavaLanguageLevel::JAVA_11.supports_char_sequence_is_empty());
        assert!(JavaLanguageLevel::JAVA_17.supports_char_sequence_is_empty());
    }
}
