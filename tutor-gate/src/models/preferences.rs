//! Per-user tutoring preferences
//!
//! Stored as text columns; older rows carry legacy spellings (`fr`,
//! `explanation`, ...) which are mapped onto the current variants when read.

use serde::{Deserialize, Serialize};

pub const DEFAULT_SCHOOL_LEVEL: &str = "Tronc Commun";

/// Language the tutor answers in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    French,
    English,
    Arabic,
}

impl Language {
    /// Column value written to the users table
    pub fn as_stored(&self) -> &'static str {
        match self {
            Language::French => "Francais",
            Language::English => "Anglais",
            Language::Arabic => "Arabe",
        }
    }

    /// Lenient read of a stored value; anything unknown is French
    pub fn from_stored(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "anglais" | "english" | "en" => Language::English,
            "arabe" | "arabic" | "ar" => Language::Arabic,
            _ => Language::French,
        }
    }
}

/// How much of the solution the tutor shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStyle {
    /// Final answer only
    Answer,
    /// Worked solution, step by step
    #[default]
    Steps,
    /// Theory and concepts behind the problem
    Conceptual,
}

impl ResponseStyle {
    pub fn as_stored(&self) -> &'static str {
        match self {
            ResponseStyle::Answer => "answer",
            ResponseStyle::Steps => "steps",
            ResponseStyle::Conceptual => "conceptual",
        }
    }

    pub fn from_stored(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "answer" => ResponseStyle::Answer,
            "conceptual" | "explanation" => ResponseStyle::Conceptual,
            _ => ResponseStyle::Steps,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    pub language: Language,
    pub response_style: ResponseStyle,
    pub school_level: String,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: Language::default(),
            response_style: ResponseStyle::default(),
            school_level: DEFAULT_SCHOOL_LEVEL.to_string(),
        }
    }
}

impl Preferences {
    /// Build from raw column values
    pub fn from_stored(lang: &str, response_type: &str, school_level: &str) -> Self {
        let school_level = school_level.trim();
        Self {
            language: Language::from_stored(lang),
            response_style: ResponseStyle::from_stored(response_type),
            school_level: if school_level.is_empty() {
                DEFAULT_SCHOOL_LEVEL.to_string()
            } else {
                school_level.to_string()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_language_values() {
        assert_eq!(Language::from_stored("fr"), Language::French);
        assert_eq!(Language::from_stored("Francais"), Language::French);
        assert_eq!(Language::from_stored("Anglais"), Language::English);
        assert_eq!(Language::from_stored("ar"), Language::Arabic);
        assert_eq!(Language::from_stored("klingon"), Language::French);
    }

    #[test]
    fn test_language_round_trips_through_column() {
        for lang in [Language::French, Language::English, Language::Arabic] {
            assert_eq!(Language::from_stored(lang.as_stored()), lang);
        }
    }

    #[test]
    fn test_legacy_response_style_values() {
        assert_eq!(ResponseStyle::from_stored("explanation"), ResponseStyle::Conceptual);
        assert_eq!(ResponseStyle::from_stored("answer"), ResponseStyle::Answer);
        assert_eq!(ResponseStyle::from_stored(""), ResponseStyle::Steps);
    }

    #[test]
    fn test_blank_school_level_defaults() {
        let prefs = Preferences::from_stored("fr", "steps", "  ");
        assert_eq!(prefs.school_level, DEFAULT_SCHOOL_LEVEL);
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_value(Preferences::default()).unwrap();
        assert_eq!(json["language"], "french");
        assert_eq!(json["response_style"], "steps");
    }
}
