use regex::RegexBuilder;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum MatchSegment {
    Plain(String),
    Match(String),
}

impl MatchSegment {
    pub fn text(&self) -> &str {
        match self {
            MatchSegment::Plain(text) | MatchSegment::Match(text) => text,
        }
    }

    pub fn is_match(&self) -> bool {
        matches!(self, MatchSegment::Match(_))
    }
}

/// Splits `text` around every case-insensitive, non-overlapping occurrence of
/// `query`. The query is matched literally.
pub fn highlight(text: &str, query: &str) -> Vec<MatchSegment> {
    if query.is_empty() {
        return vec![MatchSegment::Plain(text.to_string())];
    }

    let pattern = match RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    {
        Ok(pattern) => pattern,
        Err(e) => {
            log::warn!("> Could not build highlight pattern for {query:?}: {e}");
            return vec![MatchSegment::Plain(text.to_string())];
        }
    };

    let mut segments = Vec::new();
    let mut last_idx = 0;

    for found in pattern.find_iter(text) {
        if found.start() > last_idx {
            segments.push(MatchSegment::Plain(text[last_idx..found.start()].to_string()));
        }
        segments.push(MatchSegment::Match(found.as_str().to_string()));
        last_idx = found.end();
    }

    if last_idx < text.len() || segments.is_empty() {
        segments.push(MatchSegment::Plain(text[last_idx..].to_string()));
    }

    segments
}

/// Joins segments back into text, wrapping matches in `open`/`close`.
pub fn render(segments: &[MatchSegment], open: &str, close: &str) -> String {
    segments
        .iter()
        .map(|segment| match segment {
            MatchSegment::Plain(text) => text.to_owned(),
            MatchSegment::Match(text) => format!("{open}{text}{close}"),
        })
        .collect()
}
