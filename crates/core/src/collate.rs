//! Human-friendly ordering: transliteration for sorting/search and natural
//! ordering for directory listings.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

/// Locale-aware transliteration used for tag ordering and search.
pub trait Transliterator: Send + Sync {
    fn transliterate(&self, text: &str) -> String;

    fn sort_key(&self, text: &str) -> String {
        self.transliterate(text).to_lowercase()
    }
}

/// Table-driven transliterator: per-character replacements plus whole-word
/// overrides. With empty tables it is the identity.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TableTransliterator {
    #[serde(default)]
    chars: HashMap<char, String>,
    #[serde(default)]
    words: HashMap<String, String>,
}

impl TableTransliterator {
    pub fn new(chars: HashMap<char, String>, words: HashMap<String, String>) -> Self {
        Self { chars, words }
    }

    /// Loads `{ "chars": {..}, "words": {..} }`. Falls back to the identity
    /// table when the file is missing or malformed.
    pub fn load(path: &Path) -> Self {
        let parsed = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|b| serde_json::from_slice::<Self>(&b).map_err(|e| e.to_string()));
        match parsed {
            Ok(table) => {
                info!(
                    "loaded transliteration table {} ({} chars, {} words)",
                    path.display(),
                    table.chars.len(),
                    table.words.len()
                );
                table
            }
            Err(e) => {
                warn!("can't load transliteration table {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

impl Transliterator for TableTransliterator {
    fn transliterate(&self, text: &str) -> String {
        if let Some(word) = self.words.get(text) {
            return word.clone();
        }
        let mut count = 0usize;
        let mut translated = false;
        let mut out = String::new();
        for c in text.chars() {
            count += 1;
            match self.chars.get(&c) {
                Some(t) => {
                    translated = true;
                    out.push_str(t);
                }
                None => out.push(c),
            }
        }
        if count == 1 && translated {
            return out.chars().take(3).collect();
        }
        out
    }
}

/// Natural ordering: runs of ASCII digits compare numerically, everything
/// else compares case-insensitively.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut ai = a.chars().peekable();
    let mut bi = b.chars().peekable();
    loop {
        match (ai.peek().copied(), bi.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let na = take_digits(&mut ai);
                let nb = take_digits(&mut bi);
                let ord = na
                    .trim_start_matches('0')
                    .len()
                    .cmp(&nb.trim_start_matches('0').len())
                    .then_with(|| na.trim_start_matches('0').cmp(nb.trim_start_matches('0')));
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.to_lowercase().cmp(y.to_lowercase());
                if ord != Ordering::Equal {
                    return ord;
                }
                ai.next();
                bi.next();
            }
        }
    }
}

fn take_digits(it: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut s = String::new();
    while let Some(c) = it.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        s.push(c);
        it.next();
    }
    s
}
