//! Generated-answer normalization
//!
//! Light formatting cleanup applied to every provider answer: asterisk
//! list markers become bullets, headings get their space, and substantial
//! answers without a heading get one derived from the question.

use regex_lite::Regex;
use std::sync::OnceLock;

/// Answers shorter than this skip the derived heading
const MIN_HEADED_ANSWER_CHARS: usize = 100;

/// Leading words of the question used for the derived heading
const HEADING_TOPIC_WORDS: usize = 5;

fn star_list_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^\s*\*\s+").expect("static regex"))
}

fn cramped_heading() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(#{1,6})([^#\s])").expect("static regex"))
}

/// Normalize a generated answer
pub fn polish(answer: &str, question: &str) -> String {
    // Asterisk list markers -> bullets
    let answer = star_list_marker().replace_all(answer, "• ");

    // Space between heading hashes and text
    let mut answer = cramped_heading().replace_all(&answer, "$1 $2").into_owned();

    // Derive a heading from the question when a substantial answer lacks one
    if !answer.trim_start().starts_with('#') && answer.len() > MIN_HEADED_ANSWER_CHARS {
        let topic = question
            .trim_end_matches(['?', '!', '.'])
            .split_whitespace()
            .take(HEADING_TOPIC_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        answer = format!("# Response to: {topic}...\n\n{answer}");
    }

    answer
}
