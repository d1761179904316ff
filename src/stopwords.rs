use crate::language::Language;
use fnv::FnvHashSet;
use lazy_static::lazy_static;
use std::ops::Deref;

macro_rules! stop_words {
    ($($name:ident $lang:tt $file:literal,)*) => {
        lazy_static! {
            $(
                pub(crate) static ref $name: StopWords = StopWords::from_list(
                    Language::$lang,
                    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/resources/stopwords/", $file)),
                );
            )*
        }
    };
}

stop_words!(
    ENGLISH_STOPWORDS English "stopwords-en.txt",
);

/// A closed set of words that carry no meaning for term counting.
#[derive(Debug, Clone)]
pub struct StopWords {
    pub language: Language,
    words: FnvHashSet<String>,
}

impl Deref for StopWords {
    type Target = FnvHashSet<String>;

    fn deref(&self) -> &Self::Target {
        &self.words
    }
}

impl StopWords {
    /// Parse a newline separated word list. Blank lines and lines starting
    /// with `#` are ignored, words are lowercased.
    pub fn from_list(language: Language, list: &str) -> Self {
        let words = list
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_lowercase)
            .collect();
        Self { language, words }
    }

    /// The bundled stop words for the `language`, if there are any.
    pub fn for_language(language: &Language) -> Option<&'static StopWords> {
        match language {
            Language::English => Some(&*ENGLISH_STOPWORDS),
            Language::Other(_) => None,
        }
    }

    #[inline]
    pub fn is_stopword(&self, word: &str) -> bool {
        self.words.contains(word)
    }
}
