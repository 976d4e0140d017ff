//! Local extractive fallback answering
//!
//! When the answer provider is unreachable after retries, the question is
//! answered from the assembled context directly: extract keywords, score
//! sentences by keyword hits, and shape the best sentences by question
//! type. Non-generative, but it keeps the request from failing outright.

use lectern_search::tokenize;

/// Canned reply when the context holds nothing relevant
pub const NO_INFORMATION_ANSWER: &str =
    "I don't have enough information to answer this question.";

const SENTENCE_LIMIT: usize = 5;

const WH_STARTERS: &[&str] = &["what", "who", "when", "where", "why", "how"];

const YES_NO_STARTERS: &[&str] = &[
    "is", "are", "was", "were", "do", "does", "did", "can", "could", "will", "would",
];

const NEGATIONS: &[&str] = &["not", "no", "n't", "never"];

/// Produce a locally computed answer from the question and context
pub fn extractive_answer(question: &str, context: &str) -> String {
    let keywords = extract_keywords(question);
    let sentences = find_relevant_sentences(context, &keywords);

    if sentences.is_empty() {
        return NO_INFORMATION_ANSWER.to_string();
    }

    generate_simple_answer(question, &sentences)
}

/// Content-bearing keywords: tokenized, stop words gone, length > 2
fn extract_keywords(text: &str) -> Vec<String> {
    tokenize(text)
        .into_iter()
        .filter(|word| word.len() > 2)
        .collect()
}

/// Sentences containing the most keywords, best first, capped at five
fn find_relevant_sentences(context: &str, keywords: &[String]) -> Vec<String> {
    let mut scored: Vec<(String, usize)> = split_sentences(context)
        .into_iter()
        .filter_map(|sentence| {
            let lowered = sentence.to_lowercase();
            let score = keywords.iter().filter(|k| lowered.contains(k.as_str())).count();
            (score > 0).then(|| (sentence, score))
        })
        .collect();

    // Stable sort keeps document order among equally scored sentences
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    scored
        .into_iter()
        .take(SENTENCE_LIMIT)
        .map(|(sentence, _)| sentence)
        .collect()
}

/// Split text after sentence-ending punctuation followed by whitespace
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        current.push(ch);
        if matches!(ch, '.' | '!' | '?') {
            if chars.peek().map(|next| next.is_whitespace()).unwrap_or(true) {
                // Consume the separating whitespace
                while chars.peek().map(|next| next.is_whitespace()).unwrap_or(false) {
                    chars.next();
                }
                let sentence = current.trim().to_string();
                if !sentence.is_empty() {
                    sentences.push(sentence);
                }
                current.clear();
            }
        }
    }

    let tail = current.trim().to_string();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Shape the answer by question type
fn generate_simple_answer(question: &str, sentences: &[String]) -> String {
    let question_lower = question.to_lowercase();

    if WH_STARTERS.iter().any(|w| question_lower.starts_with(w)) {
        if let Some(best) = sentences.first() {
            return best.clone();
        }
    } else if YES_NO_STARTERS
        .iter()
        .any(|w| question_lower.starts_with(w))
    {
        if let Some(best) = sentences.first() {
            let best_lower = best.to_lowercase();
            if NEGATIONS.iter().any(|neg| best_lower.contains(neg)) {
                return format!("Based on the information, no. {best}");
            }
            return format!("Based on the information, yes. {best}");
        }
    }

    if sentences.is_empty() {
        return NO_INFORMATION_ANSWER.to_string();
    }
    sentences.join(" ")
}
