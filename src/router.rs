//! Lexical query routing.
//!
//! Routing is a pure function over the query string: a small fixed cue set decides whether
//! the caller wants summaries or detail, and an optional `kw:<word>` token supplies a
//! substring filter for the rich index. Ambiguous queries (both summary cues and detail
//! terms) intentionally route to the summary index; no classifier lives here.

use regex::Regex;
use std::sync::OnceLock;

/// Lexical cues that route a query toward the summary index.
const SUMMARY_CUES: [&str; 3] = ["summary", "summarize", "overview"];

/// Which index a query primarily targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    /// Query asks for condensed summaries.
    Summary,
    /// Query asks for full-document detail.
    Detail,
}

/// Outcome of routing one query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDecision {
    /// Primary index the query targets.
    pub intent: Intent,
    /// Optional keyword filter extracted from a `kw:<word>` token.
    pub keyword: Option<String>,
}

fn keyword_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"kw:(\w+)").expect("keyword pattern compiles"))
}

/// Classify a query and extract its optional keyword filter.
///
/// Stateless and deterministic: the same input always yields the same decision.
pub fn route(query: &str) -> RouteDecision {
    let lowered = query.to_lowercase();
    let intent = if SUMMARY_CUES.iter().any(|cue| lowered.contains(cue)) {
        Intent::Summary
    } else {
        Intent::Detail
    };

    let keyword = if query.contains(':') {
        keyword_pattern()
            .captures(query)
            .map(|captures| captures[1].to_string())
    } else {
        None
    };

    RouteDecision { intent, keyword }
}

#[cfg(test)]
mod tests {
    use super::{Intent, route};

    #[test]
    fn summary_cues_route_to_summary_index() {
        assert_eq!(route("summarize findings").intent, Intent::Summary);
        assert_eq!(route("give me an OVERVIEW of plant biology").intent, Intent::Summary);
    }

    #[test]
    fn detail_queries_route_to_vector_index() {
        let decision = route("effects of microgravity on mice");
        assert_eq!(decision.intent, Intent::Detail);
        assert!(decision.keyword.is_none());
    }

    #[test]
    fn keyword_extraction_captures_first_token_word() {
        let decision = route("kw:bone density results");
        assert_eq!(decision.intent, Intent::Detail);
        assert_eq!(decision.keyword.as_deref(), Some("bone"));
    }

    #[test]
    fn summary_intent_and_keyword_combine() {
        let decision = route("give me a summary kw:plants");
        assert_eq!(decision.intent, Intent::Summary);
        assert_eq!(decision.keyword.as_deref(), Some("plants"));
    }

    #[test]
    fn colon_without_kw_token_yields_no_keyword() {
        let decision = route("mission: artemis gene expression");
        assert!(decision.keyword.is_none());
    }

    #[test]
    fn routing_is_deterministic() {
        let first = route("summary kw:radiation");
        let second = route("summary kw:radiation");
        assert_eq!(first, second);
    }
}
