//! Parsing of model answers: fenced code blocks, saveable artifacts, display segments.

use fancy_regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// Every answer handed to the shell starts with this.
pub const AGENT_PREFIX: &str = "ai_agent> ";

/// Width of the dashed rule drawn above and below an answer.
pub const SEPARATOR_WIDTH: usize = 104;

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```([\w+#.-]*)[^\n]*\n(.*?)```").expect("fence pattern is valid")
});

/// A piece of an answer, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Code { language: String, body: String },
}

impl Segment {
    /// Header shown above a code block: capitalized language, or `Code`.
    pub fn code_header(language: &str) -> String {
        let mut chars = language.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
            None => "Code".into(),
        }
    }
}

struct Fence {
    span: Range<usize>,
    language: String,
    body: String,
}

fn fences(text: &str) -> Vec<Fence> {
    FENCE
        .captures_iter(text)
        .map_while(Result::ok)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            Some(Fence {
                span: whole.start()..whole.end(),
                language: caps.get(1).map(|m| m.as_str()).unwrap_or_default().to_string(),
                body: caps.get(2).map(|m| m.as_str().trim()).unwrap_or_default().to_string(),
            })
        })
        .collect()
}

pub fn strip_agent_prefix(answer: &str) -> &str {
    answer
        .strip_prefix(AGENT_PREFIX)
        .map(str::trim)
        .unwrap_or(answer)
}

/// Splits an answer into text and code segments. Blank text between blocks is dropped.
pub fn split_blocks(answer: &str) -> Vec<Segment> {
    let text = strip_agent_prefix(answer);
    let mut segments = Vec::new();
    let mut cursor = 0;
    for fence in fences(text) {
        push_text(&mut segments, &text[cursor..fence.span.start]);
        segments.push(Segment::Code {
            language: fence.language,
            body: fence.body,
        });
        cursor = fence.span.end;
    }
    push_text(&mut segments, &text[cursor..]);
    segments
}

fn push_text(segments: &mut Vec<Segment>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        segments.push(Segment::Text(text.to_string()));
    }
}

/// File extension for a fence language; unknown languages save as `.txt`.
pub fn extension_for(language: &str) -> &'static str {
    match language.to_ascii_lowercase().as_str() {
        "python" => ".py",
        "java" => ".java",
        "javascript" => ".js",
        "html" => ".html",
        "css" => ".css",
        "cpp" => ".cpp",
        _ => ".txt",
    }
}

/// What gets written to disk when the user saves an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedArtifact {
    /// Body of the first code block, empty when the answer has none.
    pub code: String,
    /// The answer with each code block replaced by a pointer to the code file.
    pub docs: String,
    pub extension: &'static str,
}

impl SavedArtifact {
    pub fn has_code(&self) -> bool {
        !self.code.is_empty()
    }
}

pub fn extract_artifact(answer: &str) -> SavedArtifact {
    let text = strip_agent_prefix(answer);
    let fences = fences(text);
    let Some(first) = fences.first() else {
        return SavedArtifact {
            code: String::new(),
            docs: text.to_string(),
            extension: ".txt",
        };
    };

    let extension = extension_for(&first.language);
    let placeholder = format!("\n[See code in {extension} file]\n");
    let mut docs = String::with_capacity(text.len());
    let mut cursor = 0;
    for fence in &fences {
        docs.push_str(&text[cursor..fence.span.start]);
        docs.push_str(&placeholder);
        cursor = fence.span.end;
    }
    docs.push_str(&text[cursor..]);

    SavedArtifact {
        code: first.body.clone(),
        docs,
        extension,
    }
}
