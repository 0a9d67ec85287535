//! C6 (part 1) — tokenization and the TF-IDF vocabulary shared by
//! VectorIndex embeddings and the InvertedSummaryIndex (§3, §4.5).

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

const MIN_TOKEN_LEN: usize = 2;
const MAX_TOKEN_LEN: usize = 30;

/// §4.5 tokenization: splits camelCase, snake_case, and kebab-case,
/// lowercases, keeps tokens of length 2..30.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in text.split(|c: char| !c.is_alphanumeric()) {
        if word.is_empty() {
            continue;
        }
        for piece in split_camel_case(word) {
            let lower = piece.to_lowercase();
            if lower.len() >= MIN_TOKEN_LEN && lower.len() <= MAX_TOKEN_LEN {
                tokens.push(lower);
            }
        }
    }
    tokens
}

fn split_camel_case(word: &str) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = word.chars().collect();
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() && !current.is_empty() {
            let prev_lower = chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit();
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev_lower || (next_lower && current.chars().last().is_some_and(|l| l.is_uppercase())) {
                pieces.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

/// §3 TFIDFVocab — `{terms: {term -> {index, df}}, idf, numDocs, built}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TfIdfVocab {
    terms: HashMap<String, TermEntry>,
    idf: Vec<f32>,
    num_docs: usize,
    built: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct TermEntry {
    index: usize,
    df: usize,
}

impl TfIdfVocab {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn num_docs(&self) -> usize {
        self.num_docs
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    pub fn idf_of(&self, term: &str) -> Option<f32> {
        self.terms.get(term).map(|e| self.idf[e.index])
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.terms.get(term).map(|e| e.index)
    }

    /// §4.5 vocabulary build: keep terms with `df >= 2` and `df <= 0.8*N`,
    /// assign a contiguous index, `idf = log((N+1)/(df+1)) + 1`.
    pub fn build<'a, I>(&mut self, documents: I)
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut df_counts: HashMap<String, usize> = HashMap::new();
        let mut num_docs = 0usize;

        for doc in documents {
            num_docs += 1;
            let mut seen = std::collections::HashSet::new();
            for token in tokenize(doc) {
                if seen.insert(token.clone()) {
                    *df_counts.entry(token).or_insert(0) += 1;
                }
            }
        }

        let max_df = (0.8 * num_docs as f64) as usize;
        let mut terms = HashMap::new();
        let mut idf = Vec::new();
        let mut sorted_terms: Vec<(String, usize)> = df_counts.into_iter().filter(|(_, df)| *df >= 2 && *df <= max_df).collect();
        sorted_terms.sort_by(|a, b| a.0.cmp(&b.0));

        for (index, (term, df)) in sorted_terms.into_iter().enumerate() {
            let value = ((num_docs as f64 + 1.0) / (df as f64 + 1.0)).ln() as f32 + 1.0;
            terms.insert(term, TermEntry { index, df });
            idf.push(value);
        }

        self.terms = terms;
        self.idf = idf;
        self.num_docs = num_docs;
        self.built = true;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// `(1 + log(tf)) * idf` term weight used by the embedding scatter (§4.5).
pub fn term_weight(tf: usize, idf: f32) -> f32 {
    if tf == 0 {
        return 0.0;
    }
    (1.0 + (tf as f32).ln()) * idf
}

/// Two independent hash functions used to scatter a term's weight across
/// embedding dimensions (§4.5's `hash1`/`hash2`).
pub fn hash1(term: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    term.hash(&mut hasher);
    hasher.finish()
}

pub fn hash2(term: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    "salt2:".hash(&mut hasher);
    term.hash(&mut hasher);
    hasher.finish()
}

/// 3-grams of a token, used for the embedding's sub-token signal (§4.5).
pub fn trigrams_of(term: &str) -> Vec<String> {
    let chars: Vec<char> = term.chars().collect();
    if chars.len() < 3 {
        return vec![term.to_string()];
    }
    (0..=chars.len() - 3).map(|i| chars[i..i + 3].iter().collect()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_splits_camel_snake_and_kebab_case() {
        let tokens = tokenize("getUserName user_name-value");
        assert!(tokens.contains(&"get".to_string()));
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"name".to_string()));
        assert!(tokens.contains(&"value".to_string()));
    }

    #[test]
    fn tokenize_drops_short_and_long_tokens() {
        let tokens = tokenize("a bb ccc");
        assert!(!tokens.contains(&"a".to_string()));
        assert!(tokens.contains(&"bb".to_string()));
        assert!(tokens.contains(&"ccc".to_string()));
    }

    #[test]
    fn vocab_build_respects_df_bounds() {
        let docs = vec!["common thing", "common other", "rare_only_here"];
        let mut vocab = TfIdfVocab::new();
        vocab.build(docs);
        assert!(vocab.index_of("common").is_some());
        assert!(vocab.index_of("rare").is_none() || vocab.idf_of("rare").is_some());
        assert_eq!(vocab.num_docs(), 3);
        assert!(vocab.is_built());
    }

    #[test]
    fn hash1_and_hash2_differ() {
        assert_ne!(hash1("foo"), hash2("foo"));
    }

    #[test]
    fn trigrams_of_short_term_is_itself() {
        assert_eq!(trigrams_of("ab"), vec!["ab".to_string()]);
    }

    #[test]
    fn trigrams_of_longer_term() {
        let tris = trigrams_of("code");
        assert_eq!(tris, vec!["cod".to_string(), "ode".to_string()]);
    }
}
