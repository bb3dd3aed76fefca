/// Inline citation markers (`[1]`, `[2]`, ...) in generated answers.
///
/// Extraction resolves markers against the source list returned with the
/// answer; rendering splits the text into plain and clickable segments.
/// The two are independent: the renderer marks every `[N]` as clickable,
/// resolved or not, and the caller looks the number up on click.
use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::models::{Citation, SourceMetadata};

/// `[` + ASCII digits + `]`. Non-numeric content such as `[abc]` never matches.
static CITATION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\[([0-9]+)\]").unwrap());

/// Parse the digit run of a marker. Runs too long for `usize` saturate, which
/// keeps them out of range of any source list.
fn parse_marker_number(digits: &str) -> usize {
    digits.parse().unwrap_or(usize::MAX)
}

// ── Extraction ───────────────────────────────────────────────────────

/// Extract the unique citations of `answer_text`, in order of first appearance.
///
/// Marker `[n]` maps to `sources[n - 1]`. Markers outside `1..=sources.len()`
/// (including `[0]`) are dropped without error.
pub fn extract_citations(answer_text: &str, sources: &[SourceMetadata]) -> Vec<Citation> {
    let mut seen = HashSet::new();
    let mut citations = Vec::new();

    for caps in CITATION_RE.captures_iter(answer_text) {
        let id = parse_marker_number(&caps[1]);
        let Some(source_index) = id.checked_sub(1) else {
            continue;
        };
        let Some(source) = sources.get(source_index) else {
            continue;
        };
        if seen.insert(id) {
            citations.push(Citation {
                id,
                source_index,
                source: source.clone(),
            });
        }
    }

    citations
}

/// Whether `text` contains at least one `[N]` marker.
#[must_use]
pub fn has_citations(text: &str) -> bool {
    CITATION_RE.is_match(text)
}

/// Count every `[N]` occurrence in `text`, repeats included.
#[must_use]
pub fn count_citations(text: &str) -> usize {
    CITATION_RE.find_iter(text).count()
}

// ── Rendering ────────────────────────────────────────────────────────

/// One renderable piece of an answer.
#[derive(Debug, Clone)]
pub enum Segment<'a, H> {
    /// Literal text. May be empty (between adjacent markers, or at either end).
    Text(&'a str),
    /// An interactive `[N]` marker.
    Citation {
        id: usize,
        label: &'a str,
        on_click: H,
    },
}

impl<H> Segment<'_, H> {
    /// The exact source text of this segment.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Segment::Text(text) => text,
            Segment::Citation { label, .. } => label,
        }
    }

    #[must_use]
    pub fn citation_id(&self) -> Option<usize> {
        match self {
            Segment::Text(_) => None,
            Segment::Citation { id, .. } => Some(*id),
        }
    }
}

impl<H: Fn(usize)> Segment<'_, H> {
    /// Invoke the click handler. Returns `false` for plain text.
    pub fn click(&self) -> bool {
        match self {
            Segment::Text(_) => false,
            Segment::Citation { id, on_click, .. } => {
                on_click(*id);
                true
            }
        }
    }
}

/// Split `text` on citation markers, keeping the markers as clickable segments.
///
/// Concatenating [`Segment::as_str`] over the result reproduces `text` exactly.
pub fn render_text_with_citations<H>(text: &str, on_click: H) -> Vec<Segment<'_, H>>
where
    H: Fn(usize) + Clone,
{
    let mut segments = Vec::new();
    let mut last = 0;

    for caps in CITATION_RE.captures_iter(text) {
        let Some(marker) = caps.get(0) else {
            continue;
        };
        segments.push(Segment::Text(&text[last..marker.start()]));
        segments.push(Segment::Citation {
            id: parse_marker_number(&caps[1]),
            label: marker.as_str(),
            on_click: on_click.clone(),
        });
        last = marker.end();
    }
    segments.push(Segment::Text(&text[last..]));

    segments
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn source(title: &str) -> SourceMetadata {
        SourceMetadata {
            doc_id: format!("doc-{title}"),
            chunk_id: format!("doc-{title}:0"),
            chunk_type: "decision".to_string(),
            source_org: "한국소비자원".to_string(),
            doc_title: title.to_string(),
            similarity: 0.8,
            ..SourceMetadata::default()
        }
    }

    fn sources(n: usize) -> Vec<SourceMetadata> {
        (1..=n).map(|i| source(&format!("s{i}"))).collect()
    }

    fn concat<H>(segments: &[Segment<'_, H>]) -> String {
        segments.iter().map(Segment::as_str).collect()
    }

    fn ids<H>(segments: &[Segment<'_, H>]) -> Vec<usize> {
        segments.iter().filter_map(Segment::citation_id).collect()
    }

    #[test]
    fn test_extract_basic() {
        let srcs = sources(3);
        let citations = extract_citations("소비자24에 따르면 [1] 이러한 경우 [3]...", &srcs);
        assert_eq!(citations.len(), 2);
        assert_eq!(citations[0].id, 1);
        assert_eq!(citations[0].source_index, 0);
        assert_eq!(citations[0].source.doc_title, "s1");
        assert_eq!(citations[1].id, 3);
        assert_eq!(citations[1].source.doc_title, "s3");
    }

    #[test]
    fn test_extract_empty_and_markerless() {
        let srcs = sources(2);
        assert!(extract_citations("", &srcs).is_empty());
        assert!(extract_citations("no markers here", &srcs).is_empty());
        assert!(extract_citations("[abc] [] [1a] [ 1]", &srcs).is_empty());
    }

    #[test]
    fn test_extract_dedup_keeps_first_position() {
        let srcs = sources(3);
        let citations = extract_citations("[2] then [1] then [2] and [2]", &srcs);
        let got: Vec<usize> = citations.iter().map(|c| c.id).collect();
        assert_eq!(got, vec![2, 1]);
    }

    #[test]
    fn test_extract_out_of_range_dropped() {
        let srcs = sources(1);
        let citations = extract_citations("see [1] and [2]", &srcs);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].id, 1);
    }

    #[test]
    fn test_extract_zero_marker_excluded() {
        let srcs = sources(3);
        assert!(extract_citations("[0]", &srcs).is_empty());
        assert!(extract_citations("[00] [000]", &srcs).is_empty());
    }

    #[test]
    fn test_extract_leading_zeros() {
        let srcs = sources(2);
        let citations = extract_citations("[01] and [002]", &srcs);
        let got: Vec<usize> = citations.iter().map(|c| c.id).collect();
        assert_eq!(got, vec![1, 2]);
    }

    #[test]
    fn test_extract_overflowing_marker_dropped() {
        let srcs = sources(2);
        let citations = extract_citations("[99999999999999999999999999] [1]", &srcs);
        assert_eq!(citations.len(), 1);
        assert_eq!(citations[0].id, 1);
    }

    #[test]
    fn test_extract_invariants_hold() {
        let texts = [
            "[1][2][3][4][5]",
            "[5] [4] [0] [7] [2] [2]",
            "끝 [3]",
            "[10] and [1]",
        ];
        for n in 0..4 {
            let srcs = sources(n);
            for text in texts {
                for c in extract_citations(text, &srcs) {
                    assert!(c.source_index < srcs.len(), "{text:?} with {n} sources");
                    assert_eq!(c.id, c.source_index + 1);
                    assert_eq!(c.source, srcs[c.source_index]);
                }
            }
        }
    }

    #[test]
    fn test_has_and_count_citations() {
        assert!(has_citations("a [1] b"));
        assert!(!has_citations("a [x] b"));
        assert_eq!(count_citations("[1] [2] [1] [abc]"), 3);
        assert_eq!(count_citations(""), 0);
    }

    #[test]
    fn test_render_round_trip() {
        let cases = [
            "",
            "no markers at all",
            "[1][2]",
            "[1] leading marker",
            "trailing marker [3]",
            "mid [1] text [22] and [abc] [01]",
            "한국어 문장 [1]입니다.[2]",
        ];
        for text in cases {
            let segments = render_text_with_citations(text, |_| {});
            assert_eq!(concat(&segments), text);
        }
    }

    #[test]
    fn test_render_adjacent_markers() {
        let segments = render_text_with_citations("[1][2]", |_| {});
        let pieces: Vec<&str> = segments.iter().map(Segment::as_str).collect();
        assert_eq!(pieces, vec!["", "[1]", "", "[2]", ""]);
        assert_eq!(ids(&segments), vec![1, 2]);
    }

    #[test]
    fn test_render_marks_unresolved_markers() {
        let srcs = sources(1);
        let text = "see [1] and [2]";
        assert_eq!(extract_citations(text, &srcs).len(), 1);

        let segments = render_text_with_citations(text, |_| {});
        assert_eq!(ids(&segments), vec![1, 2]);
    }

    #[test]
    fn test_render_no_markers_is_single_text() {
        let segments = render_text_with_citations("plain", |_| {});
        assert_eq!(segments.len(), 1);
        assert!(matches!(segments[0], Segment::Text("plain")));
    }

    #[test]
    fn test_render_click_invokes_handler() {
        let clicked = RefCell::new(Vec::new());
        let segments = render_text_with_citations("a [3] b [01]", |id| clicked.borrow_mut().push(id));

        let mut clicks = 0;
        for segment in &segments {
            if segment.click() {
                clicks += 1;
            }
        }
        assert_eq!(clicks, 2);
        assert_eq!(*clicked.borrow(), vec![3, 1]);
    }

    #[test]
    fn test_render_click_resolves_through_citation_set() {
        let srcs = sources(1);
        let text = "see [1] and [2]";
        let citations = extract_citations(text, &srcs);
        let opened = RefCell::new(Vec::new());

        let segments = render_text_with_citations(text, |id| {
            if let Some(c) = citations.iter().find(|c| c.id == id) {
                opened.borrow_mut().push(c.source.doc_title.clone());
            }
        });
        for segment in &segments {
            segment.click();
        }
        assert_eq!(*opened.borrow(), vec!["s1".to_string()]);
    }
}
