/// Known-misspelling fixes applied wherever player or team names are surfaced,
/// so two exports using slightly different spellings for the same entity are
/// recognized as identical. Passed in explicitly so tests can substitute their
/// own table.
#[derive(Debug, Clone, Default)]
pub struct NameCorrections {
    rules: Vec<(String, String)>,
}

impl NameCorrections {
    pub fn new(rules: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            rules: rules.into_iter().collect(),
        }
    }

    /// The league's hard-coded correction table.
    pub fn league_defaults() -> Self {
        Self::new([
            ("Meathead".to_string(), "Marshall".to_string()),
            ("Mccrossin".to_string(), "McCrossin".to_string()),
        ])
    }

    /// Apply every rule to `text`, matching case-insensitively.
    pub fn apply(&self, text: &str) -> String {
        let mut corrected = text.to_string();
        for (pattern, replacement) in &self.rules {
            corrected = replace_ascii_ci(&corrected, pattern, replacement);
        }
        corrected
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Replace every ASCII-case-insensitive occurrence of `pattern` in `text`.
fn replace_ascii_ci(text: &str, pattern: &str, replacement: &str) -> String {
    if pattern.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let bytes = text.as_bytes();
    let needle = pattern.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if i + needle.len() <= bytes.len() && bytes[i..i + needle.len()].eq_ignore_ascii_case(needle)
        {
            out.push_str(replacement);
            i += needle.len();
        } else {
            // Advance one full character to keep the output valid UTF-8.
            let ch_len = text[i..].chars().next().map_or(1, char::len_utf8);
            out.push_str(&text[i..i + ch_len]);
            i += ch_len;
        }
    }
    out
}
