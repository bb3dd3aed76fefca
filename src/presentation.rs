/// Terminal rendering of messages, citation details and warnings.
///
/// Everything here returns a `String`; the REPL decides when to print.
use colored::Colorize;

use crate::citation::{Segment, render_text_with_citations};
use crate::models::{CaseResponse, Citation, Message, Role};

const SIMILARITY_BAR_WIDTH: usize = 20;

/// Header line for a message: sender label and `HH:MM` timestamp.
#[must_use]
pub fn format_header(message: &Message) -> String {
    let time = message.timestamp.format("%H:%M").to_string();
    match message.role {
        Role::User => format!("{} {}", message.role.label().green().bold(), time.dimmed()),
        Role::Assistant => format!("{} {}", message.role.label().cyan().bold(), time.dimmed()),
    }
}

/// Answer body with every `[N]` marker highlighted.
///
/// Markers are highlighted whether or not they resolved to a source;
/// `/cite N` on an unresolved one simply opens nothing.
#[must_use]
pub fn format_answer_text(text: &str) -> String {
    render_text_with_citations(text, |_| {})
        .iter()
        .map(|segment| match segment {
            Segment::Text(text) => (*text).to_string(),
            Segment::Citation { label, .. } => label.cyan().bold().to_string(),
        })
        .collect()
}

/// Whether the `[N]` markers of `message` are drawn as citations.
///
/// Only regular answers with at least one resolved source qualify.
#[must_use]
pub fn highlights_markers(message: &Message) -> bool {
    message.is_assistant() && !message.has_safety_warning && !message.citations.is_empty()
}

/// `text` from `message` (its whole content or a typed-out piece of it),
/// highlighted when the message qualifies.
#[must_use]
pub fn format_body(message: &Message, text: &str) -> String {
    if highlights_markers(message) {
        format_answer_text(text)
    } else {
        text.to_string()
    }
}

/// A full message: header, body, and the resolved source list for answers.
///
/// Warning messages show their text verbatim followed by the question panel;
/// markers in them are not highlighted.
#[must_use]
pub fn format_message(message: &Message) -> String {
    if message.has_safety_warning {
        let mut out = format_header(message);
        if !message.content.is_empty() {
            out.push('\n');
            out.push_str(&message.content);
        }
        if let Some(warning) = format_safety_warning(&message.clarifying_questions) {
            out.push_str("\n\n");
            out.push_str(&warning);
        }
        return out;
    }

    let body = format_body(message, &message.content);
    let mut out = format!("{}\n{}", format_header(message), body);
    if highlights_markers(message) {
        out.push_str("\n\n");
        out.push_str(&format_citation_list(&message.citations));
    }
    out
}

/// One line per resolved citation, in order of first appearance.
#[must_use]
pub fn format_citation_list(citations: &[Citation]) -> String {
    citations
        .iter()
        .map(|c| {
            format!(
                "  {} {} · {} ({})",
                format!("[{}]", c.id).cyan(),
                c.source.doc_title,
                c.source.source_org.dimmed(),
                format_similarity(c.source.similarity)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_similarity(similarity: f64) -> String {
    format!("{:.1}%", similarity * 100.0)
}

fn similarity_bar(similarity: f64) -> String {
    let clamped = similarity.clamp(0.0, 1.0);
    let filled = (clamped * SIMILARITY_BAR_WIDTH as f64).round() as usize;
    format!(
        "{}{}",
        "█".repeat(filled),
        "░".repeat(SIMILARITY_BAR_WIDTH - filled)
    )
}

/// Detail view for one citation: every metadata field of its source.
///
/// Optional fields (decision date, collection date, URL) are left out when
/// the backend did not send them.
#[must_use]
pub fn format_citation_detail(citation: &Citation) -> String {
    let source = &citation.source;
    let mut rows: Vec<(&str, String)> = vec![
        ("문서 제목", source.doc_title.clone()),
        ("출처 기관", source.source_org.clone()),
    ];
    if let Some(date) = &source.decision_date {
        rows.push(("결정일", date.clone()));
    }
    rows.push((
        "유사도",
        format!(
            "{} {}",
            similarity_bar(source.similarity),
            format_similarity(source.similarity)
        ),
    ));
    rows.push(("문서 ID", source.doc_id.clone()));
    rows.push(("청크 유형", source.chunk_type.clone()));
    rows.push(("청크 ID", source.chunk_id.clone()));
    if let Some(date) = &source.collected_at {
        rows.push(("수집일", date.clone()));
    }
    if let Some(url) = &source.url {
        rows.push(("원문 링크", url.clone()));
    }

    let title = format!("참고 자료 [{}]", citation.id);
    let mut out = format!("┌─ {}\n", title.bold());
    for (label, value) in rows {
        out.push_str(&format!("│ {}\n│   {value}\n", label.dimmed()));
    }
    out.push_str("└─");
    out
}

/// A whole case document: title, agency and date, then every chunk in order.
#[must_use]
pub fn format_case(case: &CaseResponse) -> String {
    let first = case.chunks.first();
    let title = first
        .map(|c| c.case_no.as_str())
        .filter(|t| !t.is_empty())
        .unwrap_or(case.case_uid.as_str());

    let mut out = format!(
        "┌─ {} {}\n",
        title.bold(),
        format!("({}, {}개 청크)", case.case_uid, case.chunks_count).dimmed()
    );
    if let Some(chunk) = first {
        let mut meta = vec![chunk.agency.as_str()];
        if let Some(date) = &chunk.decision_date {
            meta.push(date);
        }
        meta.retain(|m| !m.is_empty());
        if !meta.is_empty() {
            out.push_str(&format!("│ {}\n", meta.join(" · ").dimmed()));
        }
    }
    for chunk in &case.chunks {
        out.push_str(&format!(
            "│\n│ {}\n",
            format!("#{} {}", chunk.seq, chunk.chunk_type).cyan()
        ));
        for line in chunk.text.lines() {
            out.push_str(&format!("│   {line}\n"));
        }
    }
    out.push_str("└─");
    out
}

/// Warning panel for insufficient evidence. `None` when there is nothing to ask.
#[must_use]
pub fn format_safety_warning(questions: &[String]) -> Option<String> {
    if questions.is_empty() {
        return None;
    }

    let mut out = format!("⚠️  {}\n", "추가 정보가 필요합니다".yellow().bold());
    out.push_str("정확한 안내를 위해 다음 정보를 추가로 알려주시면 도움이 될 것 같습니다:\n");
    for question in questions {
        out.push_str(&format!("  • {question}\n"));
    }
    out.push_str(&format!(
        "{}",
        "💡 위 질문에 답변해 주시면 더 정확한 기관 추천과 유사 사례를 제공해 드릴 수 있습니다."
            .dimmed()
    ));
    Some(out)
}

// ── Tests ────────────────────────────────────────────────────────────
