/// Interactive chat loop.
///
/// Lines starting with `/` are commands; anything else is a question for the
/// backend. `/cite N` opens the source of marker `[N]` in the latest answer,
/// `/case N` the whole document behind it.
use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::citation::has_citations;
use crate::conversation::ChatSession;
use crate::models::Message;
use crate::presentation::{
    format_body, format_case, format_citation_detail, format_citation_list, format_header,
    format_message, highlights_markers,
};
use crate::streaming::{StreamingOptions, estimate_streaming_duration, simulate_streaming};
use crate::transport::{CaseLookup, ChatTransport, TransportError};

const HELP: &str = "\
명령어:
  /cite N     답변의 [N] 참고 자료 보기
  /case N     [N] 참고 자료의 원문 전체 보기
  /sources    마지막 답변의 참고 자료 목록
  /history    대화 내용 다시 보기
  /help       도움말
  /quit       종료";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Ask(String),
    Cite(usize),
    Case(usize),
    Sources,
    History,
    Help,
    Quit,
    Empty,
    Invalid(String),
}

/// Parse one input line.
#[must_use]
pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Empty;
    }
    let Some(rest) = line.strip_prefix('/') else {
        return ReplCommand::Ask(line.to_string());
    };

    let mut parts = rest.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let marker = |arg: Option<&str>| -> Option<usize> {
        arg.and_then(|n| n.trim_matches(['[', ']']).parse().ok())
    };
    match name {
        "cite" | "c" => match marker(parts.next()) {
            Some(id) => ReplCommand::Cite(id),
            None => ReplCommand::Invalid("사용법: /cite N".to_string()),
        },
        "case" => match marker(parts.next()) {
            Some(id) => ReplCommand::Case(id),
            None => ReplCommand::Invalid("사용법: /case N".to_string()),
        },
        "sources" | "s" => ReplCommand::Sources,
        "history" => ReplCommand::History,
        "help" | "h" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Invalid(format!("알 수 없는 명령어: /{other}")),
    }
}

/// Read stdin lines on a dedicated thread.
///
/// The thread blocks in `read_line` and is never joined, so an interrupted
/// REPL can return without waiting for input. The channel closes on EOF or on
/// the first read error.
pub fn spawn_stdin_lines() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("Failed to read stdin: {e}");
                    break;
                }
            }
        }
    });
    rx
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner} {msg}") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Type `message` out to `out` chunk by chunk.
///
/// The first write error ends the output: later chunks are skipped and the
/// error is returned.
pub async fn type_out<W: Write>(
    out: &mut W,
    message: &Message,
    options: StreamingOptions,
) -> io::Result<()> {
    let mut failure: Option<io::Error> = None;
    // Chunks break on spaces only, so a `[N]` marker never straddles two chunks.
    let result = simulate_streaming(
        &message.content,
        |chunk| {
            if failure.is_some() {
                return;
            }
            let written =
                write!(out, "{}", format_body(message, chunk)).and_then(|()| out.flush());
            if let Err(e) = written {
                failure = Some(e);
            }
        },
        options,
    )
    .await;

    if let Some(e) = failure {
        return Err(e);
    }
    if let Err(e) = result {
        debug!("Typing effect skipped: {e}");
        write!(out, "{}", format_body(message, &message.content))?;
    }
    Ok(())
}

/// Print a reply, typing regular answers out when `streaming` is set.
pub async fn print_reply(message: &Message, streaming: Option<StreamingOptions>) -> Result<()> {
    let typed = streaming.filter(|_| message.is_assistant() && !message.has_safety_warning);
    let Some(options) = typed else {
        println!("{}\n", format_message(message));
        return Ok(());
    };

    if let Ok(total) = estimate_streaming_duration(&message.content, options) {
        debug!(total_ms = total.as_millis() as u64, "Typing out reply");
    }
    println!("{}", format_header(message));
    type_out(&mut io::stdout(), message, options)
        .await
        .context("failed to write reply")?;
    println!();

    if highlights_markers(message) {
        println!("\n{}", format_citation_list(&message.citations));
    }
    println!();
    Ok(())
}

/// Send one question with a spinner running, then print the reply.
pub async fn ask<T: ChatTransport>(
    session: &mut ChatSession<T>,
    question: &str,
    streaming: Option<StreamingOptions>,
) -> Result<()> {
    let pb = spinner("답변을 생성하고 있습니다...");
    let reply = session.send(question).await;
    pb.finish_and_clear();

    if let Some(message) = reply? {
        print_reply(message, streaming).await?;
    }
    Ok(())
}

fn open_citation<T: ChatTransport>(session: &ChatSession<T>, id: usize) {
    let Some(answer) = session.conversation().last_assistant() else {
        println!("아직 답변이 없습니다.\n");
        return;
    };
    match answer.find_citation(id) {
        Some(citation) => println!("{}\n", format_citation_detail(citation)),
        // Unresolved markers are clickable but open nothing.
        None => debug!("No source for citation [{id}]"),
    }
}

async fn open_case<T: ChatTransport + CaseLookup>(session: &ChatSession<T>, id: usize) {
    let Some(answer) = session.conversation().last_assistant() else {
        println!("아직 답변이 없습니다.\n");
        return;
    };
    let Some(citation) = answer.find_citation(id) else {
        debug!("No source for citation [{id}]");
        return;
    };
    let doc_id = citation.source.doc_id.as_str();
    if doc_id.is_empty() {
        println!("[{id}] 참고 자료에 문서 ID가 없습니다.\n");
        return;
    }

    let pb = spinner("원문을 불러오고 있습니다...");
    let result = session.transport().get_case(doc_id).await;
    pb.finish_and_clear();

    match result {
        Ok(case) => println!("{}\n", format_case(&case)),
        Err(TransportError::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
            println!("원문을 찾을 수 없습니다: {doc_id}\n");
        }
        Err(e) => {
            warn!("Case lookup failed: {e}");
            println!("원문을 불러오지 못했습니다.\n");
        }
    }
}

fn list_sources<T: ChatTransport>(session: &ChatSession<T>) {
    match session.conversation().last_assistant() {
        Some(answer) if !answer.citations.is_empty() => {
            println!("{}\n", format_citation_list(&answer.citations));
        }
        Some(answer) if has_citations(&answer.content) => {
            println!("답변의 참고 번호에 해당하는 자료가 없습니다.\n");
        }
        _ => println!("참고 자료가 없습니다.\n"),
    }
}

/// Handle input lines until the channel closes or `/quit`.
pub async fn run<T: ChatTransport + CaseLookup>(
    session: &mut ChatSession<T>,
    streaming: Option<StreamingOptions>,
    mut input: mpsc::Receiver<String>,
) -> Result<()> {
    println!("똑소리 소비자 분쟁 상담 — 질문을 입력하세요. (/help 도움말)\n");

    loop {
        print!("> ");
        io::stdout().flush()?;

        let Some(line) = input.recv().await else {
            println!();
            break;
        };

        match parse_line(&line) {
            ReplCommand::Empty => {}
            ReplCommand::Ask(question) => ask(session, &question, streaming).await?,
            ReplCommand::Cite(id) => open_citation(session, id),
            ReplCommand::Case(id) => open_case(session, id).await,
            ReplCommand::Sources => list_sources(session),
            ReplCommand::History => {
                for message in session.conversation().messages() {
                    println!("{}\n", format_message(message));
                }
            }
            ReplCommand::Help => println!("{HELP}\n"),
            ReplCommand::Quit => break,
            ReplCommand::Invalid(msg) => println!("{msg}\n"),
        }
    }

    Ok(())
}

// ── Tests ────────────────────────────────────────────────────────────
