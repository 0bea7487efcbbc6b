//! Language and model selection

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::Error;

/// Supported synthesis languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "gu")]
    Gujarati,
    #[serde(rename = "mr")]
    Marathi,
}

impl Language {
    /// All supported languages
    pub const ALL: [Language; 2] = [Language::Gujarati, Language::Marathi];

    /// ISO 639-1 code used on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Language::Gujarati => "gu",
            Language::Marathi => "mr",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gu" => Ok(Language::Gujarati),
            "mr" => Ok(Language::Marathi),
            other => Err(Error::validation(format!(
                "Invalid language: {}. Must be 'gu' or 'mr'",
                other
            ))),
        }
    }
}

/// Client-facing model selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelChoice {
    /// MMS-TTS (high quality)
    #[default]
    Mms,
    /// IndicTTS (fallback)
    Indic,
}

impl ModelChoice {
    /// All selectable models
    pub const ALL: [ModelChoice; 2] = [ModelChoice::Mms, ModelChoice::Indic];

    /// Name used in API requests and responses
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelChoice::Mms => "mms",
            ModelChoice::Indic => "indic",
        }
    }

    /// Engine type identifier behind this choice
    pub fn engine_type(&self) -> &'static str {
        match self {
            ModelChoice::Mms => "mms_tts",
            ModelChoice::Indic => "indictts",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelChoice {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mms" => Ok(ModelChoice::Mms),
            "indic" => Ok(ModelChoice::Indic),
            other => Err(Error::validation(format!(
                "Invalid model: {}. Must be 'mms' or 'indic'",
                other
            ))),
        }
    }
}
