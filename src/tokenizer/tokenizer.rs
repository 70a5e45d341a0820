use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fmt;
use std::str::CharIndices;

use crate::config::TokenizerConfig;

/// English stop set applied at both index and query time.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// A token produced by analysis.
///
/// `start` and `end` are byte offsets into the analyzed value; `position`
/// counts words from the start of the value, including filtered ones.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub start: usize,
    pub end: usize,
    pub position: u32,
}

/// Turns a field value into a lazy stream of tokens.
pub trait Analyzer: Send + Sync + fmt::Debug {
    fn analyze<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = Token> + 'a>;

    /// Collect token texts, mostly useful for query construction.
    fn tokenize(&self, text: &str) -> Vec<String> {
        self.analyze(text).map(|t| t.text).collect()
    }
}

/// Text tokenizer with optional stemming and stopword removal
pub struct StandardAnalyzer {
    config: TokenizerConfig,
    stemmer: Option<Stemmer>,
    stopwords: HashSet<String>,
}

impl StandardAnalyzer {
    /// Create a new tokenizer from configuration
    pub fn new(config: &TokenizerConfig) -> Self {
        let stemmer = if config.stem {
            Some(Stemmer::create(algorithm_for(&config.language)))
        } else {
            None
        };

        let stopwords = if config.remove_stopwords {
            ENGLISH_STOP_WORDS.iter().map(|s| s.to_string()).collect()
        } else {
            HashSet::new()
        };

        Self {
            config: config.clone(),
            stemmer,
            stopwords,
        }
    }

    fn accept(&self, word: &str) -> Option<String> {
        let mut token = if self.config.lowercase {
            word.to_lowercase()
        } else {
            word.to_string()
        };

        let len = token.chars().count();
        if len < self.config.min_token_length || len > self.config.max_token_length {
            return None;
        }

        if self.stopwords.contains(&token) {
            return None;
        }

        if let Some(stemmer) = &self.stemmer {
            token = stemmer.stem(&token).into_owned();
        }

        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }
}

impl fmt::Debug for StandardAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StandardAnalyzer")
            .field("config", &self.config)
            .field("stem", &self.stemmer.is_some())
            .field("stopwords", &self.stopwords.len())
            .finish()
    }
}

impl Analyzer for StandardAnalyzer {
    fn analyze<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = Token> + 'a> {
        Box::new(TokenStream {
            analyzer: self,
            text,
            chars: text.char_indices(),
            position: 0,
        })
    }
}

fn algorithm_for(language: &str) -> Algorithm {
    match language.to_ascii_lowercase().as_str() {
        "french" => Algorithm::French,
        "german" => Algorithm::German,
        "spanish" => Algorithm::Spanish,
        "italian" => Algorithm::Italian,
        "portuguese" => Algorithm::Portuguese,
        "dutch" => Algorithm::Dutch,
        "russian" => Algorithm::Russian,
        _ => Algorithm::English,
    }
}

/// Splits on non-alphanumeric boundaries, one word at a time.
struct TokenStream<'a> {
    analyzer: &'a StandardAnalyzer,
    text: &'a str,
    chars: CharIndices<'a>,
    position: u32,
}

impl<'a> TokenStream<'a> {
    fn next_word(&mut self) -> Option<(usize, usize)> {
        let start = loop {
            let (idx, c) = self.chars.next()?;
            if c.is_alphanumeric() {
                break idx;
            }
        };
        let mut end = self.text.len();
        for (idx, c) in self.chars.by_ref() {
            if !c.is_alphanumeric() {
                end = idx;
                break;
            }
        }
        Some((start, end))
    }
}

impl<'a> Iterator for TokenStream<'a> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let (start, end) = self.next_word()?;
            let position = self.position;
            self.position += 1;
            if let Some(text) = self.analyzer.accept(&self.text[start..end]) {
                return Some(Token {
                    text,
                    start,
                    end,
                    position,
                });
            }
        }
    }
}

/// Emits the whole value as a single token
#[derive(Clone, Copy, Debug, Default)]
pub struct KeywordAnalyzer;

impl Analyzer for KeywordAnalyzer {
    fn analyze<'a>(&'a self, text: &'a str) -> Box<dyn Iterator<Item = Token> + 'a> {
        if text.is_empty() {
            return Box::new(std::iter::empty());
        }
        Box::new(std::iter::once(Token {
            text: text.to_string(),
            start: 0,
            end: text.len(),
            position: 0,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard() -> StandardAnalyzer {
        StandardAnalyzer::new(&TokenizerConfig::default())
    }

    #[test]
    fn test_basic_tokenization() {
        let analyzer = standard();
        let tokens = analyzer.tokenize("The quick brown fox");
        assert_eq!(tokens, vec!["the", "quick", "brown", "fox"]);
    }

    #[test]
    fn test_offsets_and_positions() {
        let analyzer = standard();
        let tokens: Vec<Token> = analyzer.analyze("Hello, World!").collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "hello");
        assert_eq!((tokens[0].start, tokens[0].end), (0, 5));
        assert_eq!(tokens[1].text, "world");
        assert_eq!((tokens[1].start, tokens[1].end), (7, 12));
        assert_eq!(tokens[1].position, 1);
    }

    #[test]
    fn test_empty_and_punctuation_only() {
        let analyzer = standard();
        assert!(analyzer.tokenize("").is_empty());
        assert!(analyzer.tokenize("--- !!! ...").is_empty());
    }

    #[test]
    fn test_unicode_lowercase() {
        let analyzer = standard();
        let tokens = analyzer.tokenize("ÜBER Straße 42x");
        assert_eq!(tokens, vec!["über", "straße", "42x"]);
    }

    #[test]
    fn test_stopwords_keep_positions() {
        let analyzer = StandardAnalyzer::new(&TokenizerConfig::english());
        let tokens: Vec<Token> = analyzer.analyze("the running dogs").collect();
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].text, "run");
        assert_eq!(tokens[0].position, 1);
        assert_eq!(tokens[1].text, "dog");
        assert_eq!(tokens[1].position, 2);
    }

    #[test]
    fn test_english_keeps_content_words() {
        let analyzer = StandardAnalyzer::new(&TokenizerConfig::english());
        let tokens = analyzer.tokenize("The world of information, run and new");
        assert_eq!(tokens, vec!["world", "inform", "run", "new"]);
        assert_eq!(analyzer.tokenize("running"), analyzer.tokenize("run"));
    }

    #[test]
    fn test_keyword_analyzer() {
        let tokens: Vec<Token> = KeywordAnalyzer.analyze("Docs/A File.txt").collect();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].text, "Docs/A File.txt");
        assert!(KeywordAnalyzer.tokenize("").is_empty());
    }
}
