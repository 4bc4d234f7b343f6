//! Response Formatter
//!
//! English text passes through untouched. Arabic text is isolated line by
//! line in right-to-left runs and its numerals are rendered with Arabic-Indic
//! digits and separators.

use crate::language::Language;
use lazy_static::lazy_static;
use regex::Regex;

/// RIGHT-TO-LEFT ISOLATE
pub const RLI: char = '\u{2067}';
/// POP DIRECTIONAL ISOLATE
pub const PDI: char = '\u{2069}';

const ARABIC_THOUSANDS_SEPARATOR: char = '\u{066C}';
const ARABIC_DECIMAL_SEPARATOR: char = '\u{066B}';

lazy_static! {
    // Standalone numerals only; digits inside identifiers such as INV001 stay as-is
    static ref NUMBER_PATTERN: Regex = Regex::new(r"\b\d+(?:[.,]\d+)*\b").unwrap();
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter;

impl ResponseFormatter {
    pub fn new() -> Self {
        Self
    }

    /// Display-ready text for the target language.
    pub fn format(&self, text: &str, language: Language) -> String {
        match language {
            Language::En => text.to_string(),
            Language::Ar => text
                .lines()
                .map(|line| {
                    if line.trim().is_empty() {
                        line.to_string()
                    } else {
                        format!("{}{}{}", RLI, localize_digits(line), PDI)
                    }
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Rewrite every standalone numeral in `text` with Arabic-Indic digits and separators.
pub fn localize_digits(text: &str) -> String {
    NUMBER_PATTERN
        .replace_all(text, |caps: &regex::Captures| to_arabic_numeral(&caps[0]))
        .into_owned()
}

fn to_arabic_numeral(numeral: &str) -> String {
    numeral
        .chars()
        .map(|c| match c {
            '0'..='9' => char::from_u32(0x0660 + (c as u32 - '0' as u32)).unwrap_or(c),
            ',' => ARABIC_THOUSANDS_SEPARATOR,
            '.' => ARABIC_DECIMAL_SEPARATOR,
            other => other,
        })
        .collect()
}

/// Two-decimal amount with thousands grouping, e.g. `1,234.56`.
pub fn format_number(value: f64, language: Language) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }

    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    let english = format!("{}{}.{}", sign, group_thousands(int_part), frac_part);

    match language {
        Language::En => english,
        Language::Ar => to_arabic_numeral(&english),
    }
}

/// Whole count with thousands grouping.
pub fn format_count(value: usize, language: Language) -> String {
    let english = group_thousands(&value.to_string());
    match language {
        Language::En => english,
        Language::Ar => to_arabic_numeral(&english),
    }
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_passes_through() {
        let formatter = ResponseFormatter::new();
        let text = "Total VAT: 1,234.56 AED\n\nDone.";
        assert_eq!(formatter.format(text, Language::En), text);
    }

    #[test]
    fn test_arabic_lines_are_isolated() {
        let formatter = ResponseFormatter::new();
        let out = formatter.format("السطر الأول 12\n\nالسطر الثاني", Language::Ar);
        let lines: Vec<&str> = out.split('\n').collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "\u{2067}السطر الأول ١٢\u{2069}");
        assert_eq!(lines[1], "");
        assert!(lines[2].starts_with(RLI) && lines[2].ends_with(PDI));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(1234.5, Language::En), "1,234.50");
        assert_eq!(format_number(0.0, Language::En), "0.00");
        assert_eq!(format_number(-987654.321, Language::En), "-987,654.32");
        assert_eq!(format_number(1234.5, Language::Ar), "١٬٢٣٤٫٥٠");
        assert_eq!(format_number(f64::NAN, Language::En), "-");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(100, Language::En), "100");
        assert_eq!(format_count(1_000_000, Language::En), "1,000,000");
        assert_eq!(format_count(25, Language::Ar), "٢٥");
    }

    #[test]
    fn test_localize_digits_keeps_punctuation() {
        assert_eq!(localize_digits("in 15 invoices."), "in ١٥ invoices.");
        assert_eq!(localize_digits("2024-01"), "٢٠٢٤-٠١");
    }

    #[test]
    fn test_identifiers_keep_their_digits() {
        let formatter = ResponseFormatter::new();
        assert_eq!(
            formatter.format("الفاتورة INV001 للرقم TRN000123", Language::Ar),
            "\u{2067}الفاتورة INV001 للرقم TRN000123\u{2069}"
        );
        assert_eq!(localize_digits("INV001: 1,250.00 AED"), "INV001: ١٬٢٥٠٫٠٠ AED");
    }
}
