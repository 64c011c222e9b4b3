use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use log::{debug, warn};
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use whatlang::Lang;

use crate::stopwords::STOPWORDS_PT;

static NON_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\w\s]").unwrap());
static DIGITS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d+").unwrap());

/// Tokens of this many chars or fewer are always dropped.
pub const MIN_TOKEN_CHARS: usize = 2;

///Normalizes free text: lowercase, punctuation to spaces, digits removed, whitespace collapsed.
///A missing value yields an empty string.
/// # Example
/// ```
/// use text_cloud::clean_text;
/// let cleaned = clean_text(Some("O paciente relatou dor. Dor intensa!!! 123"));
/// assert_eq!(cleaned, "o paciente relatou dor dor intensa");
/// assert_eq!(clean_text(None), "");
/// ```
pub fn clean_text(text: Option<&str>) -> String {
    let Some(text) = text else {
        return String::new();
    };
    let lowered = text.to_lowercase();
    let no_punct = NON_WORD.replace_all(&lowered, " ");
    let no_digits = DIGITS.replace_all(&no_punct, "");
    no_digits.split_whitespace().collect::<Vec<_>>().join(" ")
}

///Removes built-in Portuguese stopwords, any word in `extra`, and every word of
///two chars or fewer. Word order is kept.
/// # Example
/// ```
/// use std::collections::HashSet;
/// use text_cloud::remove_stopwords;
/// let extra: HashSet<String> = ["intensa".to_string()].into_iter().collect();
/// assert_eq!(remove_stopwords("o paciente relatou dor dor intensa", &extra), "dor dor");
/// ```
pub fn remove_stopwords(text: &str, extra: &HashSet<String>) -> String {
    text.split_whitespace()
        .filter(|w| is_kept(w, extra))
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_kept(word: &str, extra: &HashSet<String>) -> bool {
    word.chars().count() > MIN_TOKEN_CHARS
        && !STOPWORDS_PT.contains(word)
        && !extra.contains(word)
}

///Reads a stopword file: one word per line, blank lines and `#` comments ignored.
///Words are lowercased so they match normalized text.
pub fn load_stopword_file(path: &Path) -> std::io::Result<HashSet<String>> {
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_lowercase)
        .collect())
}

///Lowercases caller-supplied stopwords so they match normalized tokens.
pub fn normalize_stopwords<I, S>(words: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    words
        .into_iter()
        .map(|w| w.as_ref().trim().to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

///Reduces each token to its Portuguese stem, then filters again so stems that
///collapse into a stopword or a short token are dropped as well.
pub fn stem_tokens(text: &str, extra: &HashSet<String>) -> String {
    let stemmer = Stemmer::create(Algorithm::Portuguese);
    let stemmed = text
        .split_whitespace()
        .map(|w| stemmer.stem(w).into_owned())
        .collect::<Vec<_>>()
        .join(" ");
    remove_stopwords(&stemmed, extra)
}

///Warns when the text is reliably detected as something other than Portuguese.
///Returns the detected language, if any.
pub fn check_language(text: &str) -> Option<Lang> {
    let info = whatlang::detect(text)?;
    debug!(
        "Detected language {} (confidence {:.2})",
        info.lang().eng_name(),
        info.confidence()
    );
    if info.is_reliable() && info.lang() != Lang::Por {
        warn!(
            "Text looks like {} rather than Portuguese; the stopword list only covers Portuguese",
            info.lang().eng_name()
        );
    }
    Some(info.lang())
}
