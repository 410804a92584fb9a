//! Tokenization, stopword filtering and lemmatization for search phrases.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Turns text into an ordered list of content lemmas.
pub trait Lemmatizer: Send + Sync {
    /// Tokenize `text`, drop stopwords and punctuation, and return the
    /// lemma of every remaining token in order.
    fn tokenize_and_filter(&self, text: &str) -> Vec<String>;
}

impl<T: Lemmatizer + ?Sized> Lemmatizer for Arc<T> {
    fn tokenize_and_filter(&self, text: &str) -> Vec<String> {
        (**self).tokenize_and_filter(text)
    }
}

/// English stopwords, modelled on spaCy's default list.
pub const STOPWORDS: &[&str] = &[
    "'d", "'ll", "'m", "'re", "'s", "'ve", "a", "about", "above", "across", "after", "afterwards",
    "again", "against", "all", "almost", "alone", "along", "already", "also", "although", "always",
    "am", "among", "amongst", "amount", "an", "and", "another", "any", "anyhow", "anyone",
    "anything", "anyway", "anywhere", "are", "around", "as", "at", "back", "be", "became",
    "because", "become", "becomes", "becoming", "been", "before", "beforehand", "behind", "being",
    "below", "beside", "besides", "between", "beyond", "both", "bottom", "but", "by", "ca", "call",
    "can", "cannot", "could", "did", "do", "does", "doing", "done", "down", "due", "during",
    "each", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "even", "ever",
    "every", "everyone", "everything", "everywhere", "except", "few", "fifteen", "fifty", "first",
    "five", "for", "former", "formerly", "forty", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "have", "he", "hence", "her", "here", "hereafter",
    "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his", "how", "however",
    "hundred", "i", "if", "in", "indeed", "into", "is", "it", "its", "itself", "just", "keep",
    "last", "latter", "latterly", "least", "less", "made", "make", "many", "may", "me",
    "meanwhile", "might", "mine", "more", "moreover", "most", "mostly", "move", "much", "must",
    "my", "myself", "n't", "name", "namely", "neither", "never", "nevertheless", "next", "nine",
    "no", "nobody", "none", "noone", "nor", "not", "nothing", "now", "nowhere", "of", "off",
    "often", "on", "once", "one", "only", "onto", "or", "other", "others", "otherwise", "our",
    "ours", "ourselves", "out", "over", "own", "part", "per", "perhaps", "please", "put", "quite",
    "rather", "re", "really", "regarding", "same", "say", "see", "seem", "seemed", "seeming",
    "seems", "serious", "several", "she", "should", "show", "side", "since", "six", "sixty", "so",
    "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere", "still",
    "such", "take", "ten", "than", "that", "the", "their", "them", "themselves", "then", "thence",
    "there", "thereafter", "thereby", "therefore", "therein", "thereupon", "these", "they",
    "third", "this", "those", "though", "three", "through", "throughout", "thru", "thus", "to",
    "together", "too", "top", "toward", "towards", "twelve", "twenty", "two", "under", "unless",
    "until", "up", "upon", "us", "used", "using", "various", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would",
    "yet", "you", "your", "yours", "yourself", "yourselves",
];

/// Contractions split off the end of a word, longest first.
const CLITICS: &[&str] = &["n't", "'re", "'ll", "'ve", "'s", "'m", "'d"];

/// Forms whose lemma does not follow the suffix rules.
const IRREGULAR: &[(&str, &str)] = &[
    ("children", "child"),
    ("men", "man"),
    ("women", "woman"),
    ("mice", "mouse"),
    ("geese", "goose"),
    ("feet", "foot"),
    ("teeth", "tooth"),
    ("oxen", "ox"),
    ("wolves", "wolf"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("loaves", "loaf"),
    ("shelves", "shelf"),
    ("wives", "wife"),
    ("lives", "life"),
    ("halves", "half"),
    ("calves", "calf"),
    ("buses", "bus"),
    ("horses", "horse"),
    ("houses", "house"),
    ("glasses", "glass"),
    ("went", "go"),
    ("ran", "run"),
    ("sat", "sit"),
    ("ate", "eat"),
    ("flew", "fly"),
    ("swam", "swim"),
    ("rode", "ride"),
    ("drove", "drive"),
    ("threw", "throw"),
    ("caught", "catch"),
    ("held", "hold"),
    ("stood", "stand"),
    ("lying", "lie"),
    ("dying", "die"),
    ("tying", "tie"),
];

/// Words that look inflected but are their own lemma.
const INVARIANT: &[&str] = &[
    "bus", "gas", "glass", "grass", "news", "series", "species", "tennis", "lens", "jeans",
    "pants", "shorts", "scissors", "clothes", "physics", "bed", "red", "shed", "sled", "speed",
    "seed", "weed", "feed", "need", "bred", "naked", "wicked", "sacred", "building", "ceiling",
    "clothing", "evening", "morning", "painting", "wedding", "pudding", "sibling", "icing",
    "king", "ring", "thing", "wing", "spring", "string", "swing", "sing", "sting",
];

/// Rule-based English lemmatizer with a built-in stopword list.
#[derive(Debug, Clone)]
pub struct EnglishLemmatizer {
    stopwords: HashSet<String>,
    irregular: HashMap<&'static str, &'static str>,
    invariant: HashSet<&'static str>,
}

impl EnglishLemmatizer {
    pub fn new() -> Self {
        Self {
            stopwords: STOPWORDS.iter().map(|w| w.to_string()).collect(),
            irregular: IRREGULAR.iter().copied().collect(),
            invariant: INVARIANT.iter().copied().collect(),
        }
    }

    /// Treat these words as stopwords as well.
    pub fn with_extra_stopwords<I, S>(mut self, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.stopwords
            .extend(words.into_iter().map(|w| w.as_ref().to_lowercase()));
        self
    }

    pub fn is_stopword(&self, token: &str) -> bool {
        self.stopwords.contains(token)
    }

    /// Lemma of a single lowercase token.
    pub fn lemma(&self, token: &str) -> String {
        if let Some(lemma) = self.irregular.get(token) {
            return lemma.to_string();
        }
        if self.invariant.contains(token) || !token.chars().all(|c| c.is_ascii_alphabetic()) {
            return token.to_string();
        }
        if let Some(stem) = token.strip_suffix("ing")
            && token.len() >= 5
            && has_vowel(stem)
        {
            return repair_stem(stem);
        }
        if let Some(stem) = token.strip_suffix("ied")
            && token.len() >= 5
        {
            return format!("{stem}y");
        }
        if let Some(stem) = token.strip_suffix("ed")
            && token.len() >= 5
            && has_vowel(stem)
        {
            return repair_stem(stem);
        }
        plural_to_singular(token)
    }
}

impl Default for EnglishLemmatizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Lemmatizer for EnglishLemmatizer {
    fn tokenize_and_filter(&self, text: &str) -> Vec<String> {
        tokenize(text)
            .into_iter()
            .filter(|token| token.chars().any(char::is_alphanumeric))
            .filter(|token| !self.is_stopword(token))
            .map(|token| self.lemma(&token))
            .collect()
    }
}

/// Split lowercase text into words and clitics.
///
/// `"don't"` becomes `["do", "n't"]`, `"dog's"` becomes `["dog", "'s"]`.
/// Punctuation is dropped.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let normalized = text.replace('\u{2019}', "'");
    for raw in normalized.split(|c: char| !(c.is_alphanumeric() || c == '\'')) {
        let word = raw.trim_matches('\'');
        if word.is_empty() {
            continue;
        }
        match CLITICS.iter().find(|clitic| word.len() > clitic.len() && word.ends_with(*clitic)) {
            Some(clitic) => {
                let head = &word[..word.len() - clitic.len()];
                tokens.push(head.to_string());
                tokens.push(clitic.to_string());
            }
            None => tokens.push(word.to_string()),
        }
    }
    tokens
}

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

fn has_vowel(stem: &str) -> bool {
    stem.chars().any(|c| is_vowel(c) || c == 'y')
}

/// Undo doubled final consonants and restore a dropped silent `e` after
/// stripping `-ing` or `-ed`.
fn repair_stem(stem: &str) -> String {
    let chars: Vec<char> = stem.chars().collect();
    let n = chars.len();

    if n >= 2 && chars[n - 1] == chars[n - 2] && !is_vowel(chars[n - 1]) {
        if matches!(chars[n - 1], 'l' | 's' | 'z' | 'f') {
            return stem.to_string();
        }
        return chars[..n - 1].iter().collect();
    }

    let last = chars[n - 1];
    if matches!(last, 'c' | 'v' | 'z') || (stem.ends_with("at") && n >= 4) {
        return format!("{stem}e");
    }
    // consonant-vowel-consonant short stems: mak(ing) → make, rid(ing) → ride
    if n == 3
        && !is_vowel(chars[0])
        && is_vowel(chars[1])
        && !is_vowel(last)
        && !matches!(last, 'w' | 'x' | 'y')
    {
        return format!("{stem}e");
    }
    stem.to_string()
}

fn plural_to_singular(token: &str) -> String {
    if token.len() <= 3 {
        return token.to_string();
    }
    if let Some(stem) = token.strip_suffix("ies")
        && token.len() > 4
    {
        return format!("{stem}y");
    }
    if token.ends_with("sses") {
        return token[..token.len() - 2].to_string();
    }
    for suffix in ["xes", "ches", "shes", "zzes"] {
        if token.ends_with(suffix) {
            return token[..token.len() - 2].to_string();
        }
    }
    if token.ends_with('s') && !token.ends_with("ss") && !token.ends_with("us") && !token.ends_with("is") {
        return token[..token.len() - 1].to_string();
    }
    token.to_string()
}
