//! Sentence segmentation and term extraction

use rustc_hash::FxHashSet;
use stop_words::{get, LANGUAGE};
use unicode_segmentation::UnicodeSegmentation;

/// A sentence with its position and content terms
#[derive(Debug, Clone)]
pub struct Sentence {
    pub text: String,
    pub position: usize,
    /// Lowercased words with stopwords removed
    pub terms: Vec<String>,
}

/// Collapse whitespace runs to single spaces and trim
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Stopword list for a language, or `None` when the language is unsupported
pub fn load_stopwords(language: &str) -> Option<FxHashSet<String>> {
    let lang = match language.to_lowercase().as_str() {
        "en" | "english" => LANGUAGE::English,
        "de" | "german" => LANGUAGE::German,
        "fr" | "french" => LANGUAGE::French,
        "es" | "spanish" => LANGUAGE::Spanish,
        "it" | "italian" => LANGUAGE::Italian,
        "pt" | "portuguese" => LANGUAGE::Portuguese,
        "nl" | "dutch" => LANGUAGE::Dutch,
        "ru" | "russian" => LANGUAGE::Russian,
        "sv" | "swedish" => LANGUAGE::Swedish,
        "no" | "norwegian" => LANGUAGE::Norwegian,
        "da" | "danish" => LANGUAGE::Danish,
        "fi" | "finnish" => LANGUAGE::Finnish,
        "hu" | "hungarian" => LANGUAGE::Hungarian,
        "tr" | "turkish" => LANGUAGE::Turkish,
        "pl" | "polish" => LANGUAGE::Polish,
        _ => return None,
    };
    Some(get(lang).iter().map(|s| s.to_string()).collect())
}

/// Segment text into sentences on Unicode sentence boundaries
pub fn segment(text: &str, stopwords: &FxHashSet<String>) -> Vec<Sentence> {
    text.unicode_sentences()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .map(|(position, s)| Sentence {
            text: s.to_string(),
            position,
            terms: terms(s, stopwords),
        })
        .collect()
}

fn terms(sentence: &str, stopwords: &FxHashSet<String>) -> Vec<String> {
    sentence
        .unicode_words()
        .map(str::to_lowercase)
        .filter(|w| !stopwords.contains(w))
        .collect()
}

/// Split after `.`, `!` or `?` followed by whitespace
///
/// Needs no linguistic resources, so the heuristic scorer can always run.
pub fn split_on_terminators(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        if let Some(&(next, n)) = chars.peek() {
            if n.is_whitespace() {
                sentences.push(&text[start..next]);
                start = next;
            }
        }
    }
    sentences.push(&text[start..]);

    sentences
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_stopwords_load() {
        let stopwords = load_stopwords("english").unwrap();
        assert!(stopwords.contains("the"));
        assert!(load_stopwords("en").is_some());
    }

    #[test]
    fn test_unsupported_language_is_missing() {
        assert!(load_stopwords("klingon").is_none());
    }

    #[test]
    fn test_segment_sentences() {
        let stopwords = load_stopwords("english").unwrap();
        let sentences = segment("The cat sat. The dog ran away! Did it?", &stopwords);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[1].text, "The dog ran away!");
        assert_eq!(sentences[1].position, 1);
        assert!(sentences[1].terms.contains(&"dog".to_string()));
        assert!(!sentences[1].terms.contains(&"the".to_string()));
    }

    #[test]
    fn test_split_on_terminators() {
        let sentences = split_on_terminators("One here. Two there!  Three?Four");
        assert_eq!(sentences, vec!["One here.", "Two there!", "Three?Four"]);
        assert!(split_on_terminators("   ").is_empty());
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  a\n\n b\tc  "), "a b c");
    }
}
