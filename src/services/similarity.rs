//! TF-IDF vector space and cosine similarity for content-based matching.
//!
//! Books are compared by a bag-of-terms representation of their title,
//! author, genre and description. The vector space is rebuilt per request
//! over the union of the user's liked books and the candidate pool; nothing
//! is persisted between requests.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

/// English stop words excluded from the term space
static STOP_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "am", "an", "and", "any",
        "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "cannot", "could", "did", "do", "does", "doing", "down",
        "during", "each", "few", "for", "from", "further", "had", "has", "have", "having",
        "he", "her", "here", "hers", "herself", "him", "himself", "his", "how", "if", "in",
        "into", "is", "it", "its", "itself", "me", "more", "most", "my", "myself", "no",
        "nor", "not", "of", "off", "on", "once", "only", "or", "other", "ought", "our",
        "ours", "ourselves", "out", "over", "own", "same", "she", "should", "so", "some",
        "such", "than", "that", "the", "their", "theirs", "them", "themselves", "then",
        "there", "these", "they", "this", "those", "through", "to", "too", "under", "until",
        "up", "very", "was", "we", "were", "what", "when", "where", "which", "while", "who",
        "whom", "why", "will", "with", "would", "you", "your", "yours", "yourself",
        "yourselves",
    ]
    .into_iter()
    .collect()
});

/// TF-IDF vectorizer over unigrams and bigrams
pub struct TfidfVectorizer {
    max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self { max_features }
    }

    /// Fits a vocabulary over the documents and returns one L2-normalized
    /// TF-IDF vector per document, aligned with the input order.
    ///
    /// Returns `None` when no document yields a single term (empty
    /// vocabulary) — an expected degenerate case for very short corpora.
    pub fn fit_transform(&self, documents: &[String]) -> Option<Vec<Vec<f64>>> {
        let doc_terms: Vec<Vec<String>> = documents.iter().map(|d| extract_terms(d)).collect();

        // Corpus-wide term counts and document frequencies
        let mut corpus_counts: HashMap<&str, usize> = HashMap::new();
        let mut doc_frequency: HashMap<&str, usize> = HashMap::new();
        for terms in &doc_terms {
            let mut seen: HashSet<&str> = HashSet::new();
            for term in terms {
                *corpus_counts.entry(term).or_insert(0) += 1;
                if seen.insert(term) {
                    *doc_frequency.entry(term).or_insert(0) += 1;
                }
            }
        }

        if corpus_counts.is_empty() {
            return None;
        }

        // Vocabulary capped by corpus frequency, ties broken alphabetically
        // so the index assignment is deterministic
        let mut ranked: Vec<(&str, usize)> = corpus_counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(self.max_features);

        let index: HashMap<&str, usize> = ranked
            .iter()
            .enumerate()
            .map(|(i, (term, _))| (*term, i))
            .collect();

        // Smoothed inverse document frequency
        let n_docs = documents.len() as f64;
        let mut idf = vec![0.0; index.len()];
        for (term, &i) in &index {
            let df = doc_frequency.get(term).copied().unwrap_or(0) as f64;
            idf[i] = ((1.0 + n_docs) / (1.0 + df)).ln() + 1.0;
        }

        let vectors = doc_terms
            .iter()
            .map(|terms| {
                let mut vector = vec![0.0; index.len()];
                for term in terms {
                    if let Some(&i) = index.get(term.as_str()) {
                        vector[i] += idf[i];
                    }
                }
                l2_normalize(&mut vector);
                vector
            })
            .collect();

        Some(vectors)
    }
}

/// Cosine similarity of two equal-length vectors, 0.0 when either is zero
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

fn l2_normalize(vector: &mut [f64]) {
    let norm: f64 = vector.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

/// Lowercased alphanumeric tokens of length >= 2, stop words removed
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2 && !STOP_WORDS.contains(t))
        .map(str::to_string)
        .collect()
}

/// Unigrams plus adjacent bigrams over the filtered token stream
fn extract_terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut terms = tokens.clone();
    for pair in tokens.windows(2) {
        terms.push(format!("{} {}", pair[0], pair[1]));
    }
    terms
}
