//! Canonical token form for source column and target field names.
//!
//! Source files arrive with every naming convention imaginable
//! (`PersonID`, `person_id`, `Person-Id`, `  person id`, `\u{feff}PERSON_ID`).
//! All of them normalize to the same tokens (`person`, `id`) and the same
//! compact key (`personid`).

/// A name split into lowercase tokens.
///
/// Tokens break on any non-alphanumeric character, on camelCase boundaries
/// (`workEmails`), on acronym boundaries (`HTTPServer`) and between letters
/// and digits (`address2`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedName {
    tokens: Vec<String>,
    compact: String,
}

impl NormalizedName {
    /// Normalize a raw name.
    pub fn new(raw: &str) -> Self {
        let tokens = tokenize(raw);
        let compact = tokens.concat();
        Self { tokens, compact }
    }

    /// Lowercase tokens in source order.
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Tokens joined without separators; the exact/alias lookup key.
    pub fn compact(&self) -> &str {
        &self.compact
    }

    /// Tokens joined with single spaces.
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Tokens sorted and joined with single spaces, for order-insensitive comparison.
    pub fn sorted(&self) -> String {
        let mut tokens: Vec<&str> = self.tokens.iter().map(String::as_str).collect();
        tokens.sort_unstable();
        tokens.join(" ")
    }

    /// True when the name has no alphanumeric content.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Shorthand for `NormalizedName::new(raw).compact()`.
pub fn compact_key(raw: &str) -> String {
    NormalizedName::new(raw).compact
}

fn tokenize(raw: &str) -> Vec<String> {
    let chars: Vec<char> = raw.chars().filter(|ch| *ch != '\u{feff}').collect();
    let mut tokens = Vec::new();
    let mut current = String::new();

    for (idx, &ch) in chars.iter().enumerate() {
        if !ch.is_alphanumeric() {
            flush(&mut current, &mut tokens);
            continue;
        }
        if !current.is_empty() && idx > 0 && is_boundary(&chars, idx) {
            flush(&mut current, &mut tokens);
        }
        current.extend(ch.to_lowercase());
    }
    flush(&mut current, &mut tokens);
    tokens
}

fn is_boundary(chars: &[char], idx: usize) -> bool {
    let prev = chars[idx - 1];
    let ch = chars[idx];
    if prev.is_lowercase() && ch.is_uppercase() {
        return true;
    }
    if prev.is_alphabetic() != ch.is_alphabetic() {
        return true;
    }
    // Acronym followed by a word: "HTTPServer" splits before "Server",
    // but a plural acronym like "IDs" stays whole.
    if prev.is_uppercase() && ch.is_uppercase() {
        let next = chars.get(idx + 1).copied();
        let after = chars.get(idx + 2).copied();
        return next.is_some_and(char::is_lowercase) && after.is_some_and(char::is_lowercase);
    }
    false
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}
