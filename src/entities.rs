//! Emirate mentions in question text.

use crate::language::Language;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emirate {
    Dubai,
    AbuDhabi,
    Sharjah,
    Ajman,
    Fujairah,
    RasAlKhaimah,
    UmmAlQuwain,
}

impl Emirate {
    pub const ALL: [Emirate; 7] = [
        Emirate::Dubai,
        Emirate::AbuDhabi,
        Emirate::Sharjah,
        Emirate::Ajman,
        Emirate::Fujairah,
        Emirate::RasAlKhaimah,
        Emirate::UmmAlQuwain,
    ];

    /// Value stored in the `buyer_emirate` / `seller_emirate` columns.
    pub fn data_value(&self) -> &'static str {
        match self {
            Emirate::Dubai => "Dubai",
            Emirate::AbuDhabi => "Abu Dhabi",
            Emirate::Sharjah => "Sharjah",
            Emirate::Ajman => "Ajman",
            Emirate::Fujairah => "Fujairah",
            Emirate::RasAlKhaimah => "Ras Al Khaimah",
            Emirate::UmmAlQuwain => "Umm Al Quwain",
        }
    }

    fn arabic_spellings(&self) -> &'static [&'static str] {
        match self {
            Emirate::Dubai => &["دبي"],
            Emirate::AbuDhabi => &["أبوظبي", "أبو ظبي", "ابوظبي"],
            Emirate::Sharjah => &["الشارقة", "شارقة"],
            Emirate::Ajman => &["عجمان"],
            Emirate::Fujairah => &["الفجيرة", "فجيرة"],
            Emirate::RasAlKhaimah => &["رأس الخيمة", "راس الخيمة"],
            Emirate::UmmAlQuwain => &["أم القيوين", "ام القيوين"],
        }
    }

    pub fn display_name(&self, language: Language) -> &'static str {
        match language {
            Language::En => self.data_value(),
            Language::Ar => self.arabic_spellings()[0],
        }
    }

    pub fn from_data_value(value: &str) -> Option<Emirate> {
        Emirate::ALL
            .iter()
            .copied()
            .find(|e| e.data_value().eq_ignore_ascii_case(value.trim()))
    }
}

impl fmt::Display for Emirate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data_value())
    }
}

/// First emirate mentioned in the text, by position.
pub fn find_emirate(text: &str) -> Option<Emirate> {
    let text_lower = text.to_lowercase();

    Emirate::ALL
        .iter()
        .filter_map(|emirate| {
            let english = emirate.data_value().to_lowercase();
            std::iter::once(text_lower.find(&english))
                .chain(emirate.arabic_spellings().iter().map(|s| text_lower.find(s)))
                .flatten()
                .min()
                .map(|pos| (pos, *emirate))
        })
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, emirate)| emirate)
}
