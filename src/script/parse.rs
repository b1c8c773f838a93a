use serde::{Deserialize, Serialize};

use crate::model::scene::clamp_scene_duration;

/// Speaking rate used to estimate a scene's authored duration from its text.
pub const ESTIMATE_WORDS_PER_SEC: f64 = 2.5;
/// A single paragraph longer than this is split into sentence groups.
pub const MAX_WORDS_PER_SCENE: usize = 30;

/// One scene's worth of narration parsed from script text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneDraft {
    pub text: String,
    pub duration_seconds: f64,
}

impl SceneDraft {
    fn from_text(text: String) -> Self {
        let words = text.split_whitespace().count();
        Self {
            duration_seconds: estimate_duration(words),
            text,
        }
    }
}

/// Estimated authored duration for `words` words, clamped to the scene range.
pub fn estimate_duration(words: usize) -> f64 {
    let secs = (words as f64 / ESTIMATE_WORDS_PER_SEC).round();
    clamp_scene_duration(secs)
}

/// Split script text into ordered scene drafts.
///
/// Blank-line separated paragraphs become scenes. A paragraph over [`MAX_WORDS_PER_SCENE`]
/// words is split at sentence boundaries into groups that stay under the limit where possible.
pub fn parse_script(text: &str) -> Vec<SceneDraft> {
    paragraphs(text)
        .into_iter()
        .flat_map(|para| {
            if para.split_whitespace().count() <= MAX_WORDS_PER_SCENE {
                vec![para]
            } else {
                group_sentences(&para)
            }
        })
        .map(SceneDraft::from_text)
        .collect()
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            if !current.is_empty() {
                out.push(normalize(&current.join(" ")));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        out.push(normalize(&current.join(" ")));
    }
    out
}

fn normalize(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn sentences(para: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let bytes = para.as_bytes();
    for (i, c) in para.char_indices() {
        if matches!(c, '.' | '!' | '?') {
            let end = i + c.len_utf8();
            // Sentence ends at terminal punctuation followed by whitespace or end of text.
            if end == para.len() || bytes[end].is_ascii_whitespace() {
                let s = para[start..end].trim();
                if !s.is_empty() {
                    out.push(s);
                }
                start = end;
            }
        }
    }
    let tail = para[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}

fn group_sentences(para: &str) -> Vec<String> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut current_words = 0usize;
    for sentence in sentences(para) {
        let words = sentence.split_whitespace().count();
        if current_words > 0 && current_words + words > MAX_WORDS_PER_SCENE {
            groups.push(std::mem::take(&mut current));
            current_words = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(sentence);
        current_words += words;
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

#[cfg(test)]
#[path = "../../tests/unit/script/parse.rs"]
mod tests;
