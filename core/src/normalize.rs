use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::{BTreeSet, HashSet};
use unicode_normalization::UnicodeNormalization;

const UNITS: &str = r"(cups?|tablespoons?|teaspoons?|pounds?|ounces?|lbs?|oz|tsp|tbsp|cloves?|pieces?|slices?|cans?|packages?|jars?|grams?|kg|ml|liters?|pinch(es)?|dash(es)?)";

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref LEADING_MEASURE: Regex = Regex::new(&format!(r"^\d+(\.\d+)?\s*{UNITS}\s+")).expect("valid regex");
    static ref LEADING_FRACTION: Regex = Regex::new(&format!(r"^\d+\s*[/⁄]\s*\d+\s+({UNITS}\s+)?")).expect("valid regex");
    static ref LEADING_RANGE: Regex = Regex::new(&format!(r"^\d+\s*-\s*\d+\s+({UNITS}\s+)?")).expect("valid regex");
    static ref QUANTITY: Regex = Regex::new(r"^[\d./⁄\-½¼¾⅓⅔]+$").expect("valid regex");
    static ref NON_WORD: Regex = Regex::new(r"[^\w\-]").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref DESCRIPTORS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "fresh","dried","chopped","minced","diced","sliced","grated","ground",
            "whole","large","small","medium","fine","coarse","extra","virgin",
            "unsalted","salted","raw","cooked","frozen","canned","organic",
            "finely","coarsely","thinly","thickly","roughly","plus","more","for",
            "about","approximately","room","temperature","cold","warm","hot",
            "preferably","optional","divided","separated","peeled","trimmed",
            "boneless","skinless","lean","fat","reduced","low","free","range",
            "of","and","or","to","taste","a","an","the"
        ];
        words.iter().copied().collect()
    };
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","cannot","could","did","do","does","doing","down","during",
            "each","few","for","from","further",
            "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
            "i","if","in","into","is","it","its","itself",
            "me","more","most","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","should","so","some","such",
            "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
            "under","until","up","very",
            "was","we","were","what","when","where","which","while","who","whom","why","with","would",
            "you","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// Deterministic ingredient canonicalization.
///
/// Identical input always yields identical output; indexing and querying
/// both go through the same instance configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Normalizer {
    stemming: bool,
}

impl Normalizer {
    pub fn new(stemming: bool) -> Self {
        Self { stemming }
    }

    pub fn stemming(&self) -> bool {
        self.stemming
    }

    /// Strip quantities, units, descriptors and punctuation from a raw phrase.
    pub fn normalize(&self, raw: &str) -> String {
        let lowered = raw.nfkc().collect::<String>().to_lowercase();
        let trimmed = lowered.trim();
        if trimmed.is_empty() {
            return String::new();
        }
        let stripped = LEADING_MEASURE.replace(trimmed, "");
        let stripped = LEADING_FRACTION.replace(&stripped, "");
        let stripped = LEADING_RANGE.replace(&stripped, "");

        let mut words: Vec<String> = Vec::new();
        for word in stripped.split_whitespace() {
            if QUANTITY.is_match(word) {
                continue;
            }
            let clean = NON_WORD.replace_all(word, "");
            let clean = clean.trim_matches('-');
            if clean.chars().count() <= 1 || DESCRIPTORS.contains(clean) {
                continue;
            }
            if clean.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            if self.stemming {
                words.push(STEMMER.stem(clean).into_owned());
            } else {
                words.push(clean.to_string());
            }
        }
        words.join(" ")
    }

    /// Plural/singular forms of a phrase, the normalized phrase included.
    ///
    /// Multi-word phrases vary only their last word.
    pub fn variants(&self, raw: &str) -> BTreeSet<String> {
        let normalized = self.normalize(raw);
        let mut out = BTreeSet::new();
        if normalized.is_empty() {
            return out;
        }
        match normalized.rsplit_once(' ') {
            None => out.extend(word_variants(&normalized)),
            Some((head, last)) => {
                for form in word_variants(last) {
                    out.insert(format!("{head} {form}"));
                }
            }
        }
        out.insert(normalized);
        out
    }
}

fn word_variants(word: &str) -> Vec<String> {
    let mut forms = vec![word.to_string()];
    let len = word.chars().count();
    if word.ends_with('s') && len > 3 {
        forms.push(word[..word.len() - 1].to_string());
        if word.ends_with("es") && len > 4 {
            forms.push(word[..word.len() - 2].to_string());
        }
        if word.ends_with("ies") && len > 4 {
            forms.push(format!("{}y", &word[..word.len() - 3]));
        }
    } else {
        forms.push(format!("{word}s"));
        forms.push(format!("{word}es"));
        if let Some(stem) = word.strip_suffix('y') {
            let consonant = stem.chars().last().map(|c| !"aeiou".contains(c)).unwrap_or(false);
            if consonant && len > 2 {
                forms.push(format!("{stem}ies"));
            }
        }
    }
    forms
}

/// Tokenize free text using NFKC normalization, lowercase, stopword removal
/// and optional stemming. Used by the recipe text model.
pub fn tokenize(text: &str, stemming: bool) -> Vec<String> {
    let normalized = text.nfkc().collect::<String>().to_lowercase();
    let mut tokens = Vec::new();
    for mat in WORD.find_iter(&normalized) {
        let token = mat.as_str();
        if token.chars().count() < 2 || STOPWORDS.contains(token) {
            continue;
        }
        if stemming {
            tokens.push(STEMMER.stem(token).into_owned());
        } else {
            tokens.push(token.to_string());
        }
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_measures_and_descriptors() {
        let n = Normalizer::default();
        assert_eq!(n.normalize("2 cups chopped fresh tomatoes"), "tomatoes");
        assert_eq!(n.normalize("1/2 teaspoon salt, for serving"), "salt serving");
        assert_eq!(n.normalize("  Boneless, skinless CHICKEN breasts "), "chicken breasts");
        assert_eq!(n.normalize("12 large eggs"), "eggs");
        assert_eq!(n.normalize(""), "");
    }

    #[test]
    fn normalization_is_deterministic() {
        let n = Normalizer::new(true);
        let a = n.normalize("3 Tbsp extra-virgin olive oil");
        let b = n.normalize("3 Tbsp extra-virgin olive oil");
        assert_eq!(a, b);
    }

    #[test]
    fn variants_cover_plural_forms() {
        let n = Normalizer::default();
        assert!(n.variants("tomatoes").contains("tomato"));
        assert!(n.variants("tomato").contains("tomatoes"));
        assert!(n.variants("berries").contains("berry"));
        assert!(n.variants("berry").contains("berries"));
        assert!(n.variants("red onion").contains("red onions"));
    }

    #[test]
    fn tokenize_drops_stopwords() {
        let t = tokenize("Whisk the eggs and the sugar", false);
        assert_eq!(t, vec!["whisk", "eggs", "sugar"]);
    }
}
