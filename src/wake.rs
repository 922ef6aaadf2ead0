//! Wake-word detection on recognized text.

use regex::{Regex, RegexBuilder};

/// Case-insensitive substring matcher over the configured wake words.
#[derive(Debug, Clone)]
pub struct WakeWords {
    words: Vec<String>,
    strip: Vec<Regex>,
}

impl WakeWords {
    pub fn new<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.as_ref().trim().to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        let strip = words
            .iter()
            .filter_map(|w| {
                RegexBuilder::new(&regex::escape(w))
                    .case_insensitive(true)
                    .build()
                    .ok()
            })
            .collect();

        Self { words, strip }
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn contains(&self, text: &str) -> bool {
        let t = text.to_lowercase();
        self.words.iter().any(|w| t.contains(w.as_str()))
    }

    /// Removes every wake-word occurrence, then trims whitespace and punctuation
    /// left behind ("Unip, pare." -> "pare").
    pub fn strip(&self, text: &str) -> String {
        let mut t = text.to_string();
        for re in &self.strip {
            t = re.replace_all(&t, "").into_owned();
        }
        t.trim_matches(|c: char| c.is_whitespace() || c.is_ascii_punctuation())
            .to_string()
    }
}
