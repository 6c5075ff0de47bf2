//! Ask command - one budgeted question to the local model
//!
//! Assembles knowledge excerpts and attached files around the question,
//! routes the result through the context budget (splitting and reducing
//! when it will not fit), and learns the server's real context size from
//! rejections.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

use crate::ai::LlmClient;
use crate::config::Config;
use crate::context::budget::parse_context_size;
use crate::context::reduce::{FOLD_MAX_TOKENS, FOLD_TEMPERATURE};
use crate::context::{assemble, run_ask, AskCall, AssembledInput};
use crate::history;
use crate::knowledge::persist;
use crate::session::Session;
use crate::util::truncate_chars_ellipsis;

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";
    pub const ERROR: &str = "\x1b[38;2;239;154;154m";
    pub const AI_ACCENT: &str = "\x1b[38;2;255;202;40m";
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";
    pub const FG: &str = "\x1b[38;2;212;212;215m";
}

mod symbols {
    pub const AI_ICON: &str = "✶";
    pub const ERROR: &str = "✗";
}

/// Cap on captured streaming output (the full answer is printed live; this
/// only bounds what is kept for `last_answer` and the history preview).
const CAPTURE_MAX: usize = 2_000_000;

/// One-shot `orbit ask` entry point.
pub async fn run(config: Config, question: &str, files: Vec<String>) -> Result<()> {
    print_header(question);

    let store = match persist::default_store_path() {
        Ok(path) => persist::load(&path, config.knowledge.enabled),
        Err(_) => crate::knowledge::KnowledgeStore::new(config.knowledge.enabled),
    };
    let mut session = Session::with_knowledge(&config, store);
    for file in &files {
        session.attach(file);
    }

    // Diagnostics are printed inside; a failed ask still exits cleanly.
    let _ = ask_once(&config, &mut session, question, "ask").await;

    if config.knowledge.enabled && config.knowledge.auto_ingest {
        if let Ok(path) = persist::default_store_path() {
            let _ = persist::save(&session.knowledge, &path);
        }
    }
    Ok(())
}

/// Run one question through the full ask flow against `session`.
///
/// Prints the answer (or a single diagnostic line) itself; the returned
/// error is for callers that want to abort a batch, not for display.
pub async fn ask_once(
    config: &Config,
    session: &mut Session,
    question: &str,
    kind: &str,
) -> Result<()> {
    let client = match LlmClient::new(&config.llm) {
        Ok(client) => client,
        Err(e) => {
            print_error(&e.to_string());
            return Err(e.into());
        }
    };

    let input = match assemble(question, &session.files, &session.knowledge, config) {
        Ok(input) => input,
        Err(e) => {
            print_error(&format!("{:#}", e));
            return Err(e);
        }
    };
    debug!(
        files = input.files.len(),
        content_len = input.content.len(),
        "assembled request"
    );

    let system = session.system_prompt(&config.llm.system_prompt);
    let deadline = Duration::from_secs(config.llm.timeout_secs.max(1));
    let stream = session.stream;

    let flow = drive_ask(&client, &system, question, &input, session, stream);
    let outcome = tokio::select! {
        res = tokio::time::timeout(deadline, flow) => match res {
            Ok(inner) => inner,
            Err(_) => Err(anyhow!("request timed out after {}s", deadline.as_secs())),
        },
        _ = tokio::signal::ctrl_c() => Err(anyhow!("interrupted")),
    };

    let answer = match outcome {
        Ok(answer) => answer,
        Err(e) => {
            let text = format!("{:#}", e);
            print_error(&text);
            if let Some(observed) = parse_context_size(&text) {
                session.budget.observe(observed);
                info!(observed, "learned context size from rejection");
                if session.budget.target_exceeds_observed() {
                    eprintln!(
                        "hint: server ctx-size={}. restart the server with --ctx-size {} to match the configured target",
                        observed,
                        session.budget.target.unwrap_or(0)
                    );
                }
            }
            return Err(e);
        }
    };

    if stream {
        // The answer was already printed token by token.
        println!();
    } else {
        print_response(&answer);
    }
    session.last_answer = answer.clone();

    if config.knowledge.enabled && config.knowledge.auto_ingest {
        let key = format!("usage:{}", chrono::Local::now().to_rfc3339());
        session
            .knowledge
            .upsert(&key, &format!("[{}] {}", kind, question.trim()), 0, 8_000);
    }

    if config.history.enabled {
        write_history(config, &client, question, kind, &input, &answer);
    }

    Ok(())
}

/// Bind the assembler's completion callback to the HTTP client.
async fn drive_ask(
    client: &LlmClient,
    system: &str,
    question: &str,
    input: &AssembledInput,
    session: &Session,
    stream: bool,
) -> Result<String> {
    run_ask(question, input, &session.budget, |call: AskCall| {
        let system = system.to_string();
        async move {
            if call.streaming && stream {
                let answer = client
                    .complete_stream(&system, &call.user, CAPTURE_MAX, |text| {
                        print!("{}", text);
                        let _ = io::stdout().flush();
                    })
                    .await?;
                Ok(answer)
            } else if call.streaming {
                Ok(client.complete(&system, &call.user).await?)
            } else {
                // Fold step: fixed low-temperature sampling, never streamed.
                Ok(client
                    .complete_with(&system, &call.user, FOLD_TEMPERATURE, FOLD_MAX_TOKENS)
                    .await?)
            }
        }
    })
    .await
}

/// Append one best-effort history record; failures are logged, not fatal.
fn write_history(
    config: &Config,
    client: &LlmClient,
    question: &str,
    kind: &str,
    input: &AssembledInput,
    answer: &str,
) {
    let path = match &config.history.path {
        Some(path) => path.clone(),
        None => match history::default_history_path() {
            Ok(path) => path,
            Err(e) => {
                debug!("history disabled: {}", e);
                return;
            }
        },
    };
    let mut record = history::Record::new(kind, &client.completions_url(), client.model(), question);
    record.files = input.files.clone();
    record.file_hashes = input.file_hashes.clone();
    record.response_preview = truncate_chars_ellipsis(answer, config.history.preview_chars);
    if let Err(e) = history::append(&path, &record) {
        debug!("history append failed: {}", e);
    }
}

/// Print the answer in a response box.
pub(crate) fn print_response(response: &str) {
    println!();
    println!(
        "{}{}  {} orbit {}",
        colors::AI_ACCENT,
        colors::BOLD,
        symbols::AI_ICON,
        colors::RESET
    );
    println!("{}  ╭{}─{}", colors::MUTED, "─".repeat(50), colors::RESET);
    for line in response.lines() {
        println!("{}  │ {}{}{}", colors::MUTED, colors::FG, line, colors::RESET);
    }
    println!("{}  ╰{}─{}", colors::MUTED, "─".repeat(50), colors::RESET);
    println!();
}

/// Print a single diagnostic line.
pub(crate) fn print_error(message: &str) {
    eprintln!(
        "{}  {} {}{}",
        colors::ERROR,
        symbols::ERROR,
        message,
        colors::RESET
    );
}

/// Print the ask header for the one-shot command.
fn print_header(question: &str) {
    println!();
    println!(
        "{}{}  Asking the local model...{}",
        colors::PRIMARY,
        colors::BOLD,
        colors::RESET
    );
    println!(
        "{}  │ {}{}{}",
        colors::MUTED,
        colors::FG,
        question,
        colors::RESET
    );
    println!("{}  ╰{}─{}", colors::MUTED, "─".repeat(50), colors::RESET);
}
