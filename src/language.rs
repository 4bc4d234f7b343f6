//! Language detection for incoming questions.
//!
//! Questions arrive either in English or Arabic. Detection is script based:
//! a question is Arabic when Arabic letters make up a large enough share of
//! its alphabetic characters, so that an English question naming an Arabic
//! place still reads as English.

use crate::error::{AssistantError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum share of Arabic letters among alphabetic characters.
pub const ARABIC_SHARE_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn is_rtl(&self) -> bool {
        matches!(self, Language::Ar)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl FromStr for Language {
    type Err = AssistantError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "ar" | "arabic" | "العربية" => Ok(Language::Ar),
            other => Err(AssistantError::InvalidFilter(format!(
                "Unknown language '{}', expected 'en' or 'ar'",
                other
            ))),
        }
    }
}

/// Whether a code point belongs to one of the Arabic script blocks.
pub fn is_arabic_char(c: char) -> bool {
    matches!(
        c as u32,
        0x0600..=0x06FF | 0x0750..=0x077F | 0x08A0..=0x08FF | 0xFB50..=0xFDFF | 0xFE70..=0xFEFF
    )
}

/// Detect the language of a question. Empty or non-alphabetic input is English.
pub fn detect_language(text: &str) -> Language {
    let mut letters = 0usize;
    let mut arabic = 0usize;

    for c in text.chars() {
        if is_arabic_char(c) {
            // Arabic diacritics and punctuation live in the same blocks;
            // count them so all-Arabic text always clears the threshold.
            letters += 1;
            arabic += 1;
        } else if c.is_alphabetic() {
            letters += 1;
        }
    }

    if letters == 0 {
        return Language::En;
    }

    if arabic as f64 / letters as f64 >= ARABIC_SHARE_THRESHOLD {
        Language::Ar
    } else {
        Language::En
    }
}
