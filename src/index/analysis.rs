//! Text analysis shared by the indexer and the seeker.
//!
//! Both sides must produce identical terms for identical input, so
//! they are always built from the same `StemmerKind`.

use rust_stemmers::{Algorithm, Stemmer as SnowballAlgorithm};

use crate::models::StemmerKind;

/// Splits raw text into lower-cased tokens.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, input: &str) -> Vec<String>;
}

/// Reduces a token to its stem.
pub trait Stemmer: Send + Sync {
    fn stem(&self, token: &str) -> String;
}

/// Splits on every character that is not alphanumeric.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnicodeTokenizer;

impl Tokenizer for UnicodeTokenizer {
    fn tokenize(&self, input: &str) -> Vec<String> {
        input
            .split(|c: char| !c.is_alphanumeric())
            .filter(|piece| !piece.is_empty())
            .map(str::to_lowercase)
            .collect()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullStemmer;

impl Stemmer for NullStemmer {
    fn stem(&self, token: &str) -> String {
        token.to_string()
    }
}

/// Snowball stemmer backed by `rust-stemmers`.
pub struct SnowballStemmer {
    inner: SnowballAlgorithm,
}

impl SnowballStemmer {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            inner: SnowballAlgorithm::create(algorithm),
        }
    }
}

impl Stemmer for SnowballStemmer {
    fn stem(&self, token: &str) -> String {
        self.inner.stem(token).into_owned()
    }
}

/// Tokenizer plus stemmer.
pub struct Analyzer {
    tokenizer: Box<dyn Tokenizer>,
    stemmer: Box<dyn Stemmer>,
}

impl Analyzer {
    pub fn new(tokenizer: Box<dyn Tokenizer>, stemmer: Box<dyn Stemmer>) -> Self {
        Self { tokenizer, stemmer }
    }

    pub fn for_kind(kind: StemmerKind) -> Self {
        let stemmer: Box<dyn Stemmer> = match kind.algorithm() {
            Some(algorithm) => Box::new(SnowballStemmer::new(algorithm)),
            None => Box::new(NullStemmer),
        };
        Self::new(Box::new(UnicodeTokenizer), stemmer)
    }

    /// Tokenize and stem `text`, keeping duplicates and input order.
    pub fn analyze(&self, text: &str) -> Vec<String> {
        self.tokenizer
            .tokenize(text)
            .into_iter()
            .map(|token| self.stemmer.stem(&token))
            .filter(|term| !term.is_empty())
            .collect()
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::for_kind(StemmerKind::default())
    }
}
