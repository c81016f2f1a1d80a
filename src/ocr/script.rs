use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Writing systems recognised in OCR output
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Script {
    Latin,
    Greek,
    Cyrillic,
    Arabic,
    #[serde(rename = "CJK")]
    Cjk,
    Hiragana,
    Katakana,
}

impl Script {
    pub fn name(&self) -> &'static str {
        match self {
            Script::Latin => "Latin",
            Script::Greek => "Greek",
            Script::Cyrillic => "Cyrillic",
            Script::Arabic => "Arabic",
            Script::Cjk => "CJK",
            Script::Hiragana => "Hiragana",
            Script::Katakana => "Katakana",
        }
    }

    fn of(ch: char) -> Option<Script> {
        match ch as u32 {
            0x0370..=0x03FF => Some(Script::Greek),
            0x0400..=0x04FF => Some(Script::Cyrillic),
            0x0600..=0x06FF => Some(Script::Arabic),
            0x4E00..=0x9FFF => Some(Script::Cjk),
            0x3040..=0x309F => Some(Script::Hiragana),
            0x30A0..=0x30FF => Some(Script::Katakana),
            _ => None,
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collect the scripts present in `text`.
///
/// Non-empty text that contains none of the tracked ranges counts as Latin;
/// blank text has no script.
pub fn detect_scripts(text: &str) -> BTreeSet<Script> {
    let mut scripts: BTreeSet<Script> = text.chars().filter_map(Script::of).collect();

    if scripts.is_empty() && !text.trim().is_empty() {
        scripts.insert(Script::Latin);
    }

    scripts
}

/// Comma separated script names, e.g. "Greek, Cyrillic"
pub fn script_label(scripts: &BTreeSet<Script>) -> String {
    scripts.iter().map(Script::name).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_ascii_is_latin() {
        let scripts = detect_scripts("Invoice number 42");
        assert_eq!(scripts.into_iter().collect::<Vec<_>>(), vec![Script::Latin]);
    }

    #[test]
    fn test_blank_text_has_no_script() {
        assert!(detect_scripts("").is_empty());
        assert!(detect_scripts("  \n\t").is_empty());
    }

    #[test]
    fn test_mixed_scripts() {
        let scripts = detect_scripts("Καλημέρα Привет مرحبا 你好 ひらがな カタカナ");
        assert!(scripts.contains(&Script::Greek));
        assert!(scripts.contains(&Script::Cyrillic));
        assert!(scripts.contains(&Script::Arabic));
        assert!(scripts.contains(&Script::Cjk));
        assert!(scripts.contains(&Script::Hiragana));
        assert!(scripts.contains(&Script::Katakana));
        assert!(!scripts.contains(&Script::Latin));
    }

    #[test]
    fn test_latin_mixed_with_greek_reports_greek_only() {
        let scripts = detect_scripts("Hello Αθήνα");
        assert_eq!(script_label(&scripts), "Greek");
    }

    #[test]
    fn test_label_is_ordered() {
        let scripts = detect_scripts("Привет Γειά");
        assert_eq!(script_label(&scripts), "Greek, Cyrillic");
    }
}
