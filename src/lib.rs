//! # ddoksori-chat — consumer-dispute mediation chat client
//!
//! Terminal client for the dispute-mediation question-answering service.
//! Questions go to the backend's `/chat` endpoint; answers come back with
//! inline `[N]` markers that point into a list of source documents.
//!
//! ## Architecture
//!
//! - **[`models`]** — Wire payloads (`/chat`, `/health`, `/search`, `/case`) and conversation types
//! - **[`citation`]** — `[N]` marker extraction and split-and-keep rendering
//! - **[`streaming`]** — Word-chunked typing effect for completed answers
//! - **[`transport`]** — `reqwest` client for the backend, no retries
//! - **[`conversation`]** — Append-only message store and the request controller
//! - **[`presentation`]** — Terminal formatting: messages, citation details, warnings
//! - **[`repl`]** — Interactive loop and `/cite`, `/case` style commands
//! - **[`config`]** — JSON configuration loading and validation

pub mod citation;
pub mod config;
pub mod conversation;
pub mod models;
pub mod presentation;
pub mod repl;
pub mod streaming;
pub mod transport;
