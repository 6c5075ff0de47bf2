//! Interactive shell for ORBIT
//!
//! Plain input goes straight to the ask flow; `:` commands mutate the
//! session (attached files, notes, knowledge store, budget) between asks.

use std::io::{self, Write};

use anyhow::Result;

use super::ask::{ask_once, print_error, print_response};
use crate::config::Config;
use crate::knowledge::persist;
use crate::session::Session;

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";
    pub const SUCCESS: &str = "\x1b[38;2;165;214;167m";
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";
    pub const FG: &str = "\x1b[38;2;212;212;215m";
}

mod symbols {
    pub const USER_ICON: &str = "❯";
    pub const SUCCESS: &str = "✓";
}

/// Main shell loop
pub async fn run(config: Config) -> Result<()> {
    let store = match persist::default_store_path() {
        Ok(path) => persist::load(&path, config.knowledge.enabled),
        Err(_) => crate::knowledge::KnowledgeStore::new(config.knowledge.enabled),
    };
    let mut session = Session::with_knowledge(&config, store);

    print_banner(&config);

    loop {
        let Some(line) = read_line() else {
            println!();
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(':') {
            if handle_command(line, &mut session, &config) {
                break;
            }
            continue;
        }

        // Diagnostics are printed inside the ask flow; the shell carries on.
        let _ = ask_once(&config, &mut session, line, "shell").await;
    }

    // Best-effort persist so the knowledge store survives the session.
    if let Ok(path) = persist::default_store_path() {
        let _ = persist::save(&session.knowledge, &path);
    }
    print_success("Goodbye!");
    Ok(())
}

/// Read one input line; `None` on EOF.
fn read_line() -> Option<String> {
    print!(
        "\n{}{} {}",
        colors::PRIMARY,
        symbols::USER_ICON,
        colors::RESET
    );
    io::stdout().flush().ok();

    let mut line = String::new();
    match io::stdin().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line),
    }
}

/// Handle a `:` command. Returns true when the shell should exit.
fn handle_command(input: &str, session: &mut Session, config: &Config) -> bool {
    let mut parts = input.splitn(3, char::is_whitespace);
    let command = parts.next().unwrap_or_default();
    let arg = parts.next().unwrap_or_default();
    let rest = parts.next().unwrap_or_default();

    match command {
        ":exit" | ":quit" | ":q" => return true,
        ":help" | ":h" => print_help(),
        ":last" => {
            if session.last_answer.is_empty() {
                print_status("no answer yet");
            } else {
                print_response(&session.last_answer);
            }
        }
        ":attach" => {
            if arg.is_empty() {
                print_error("usage: :attach <path>");
            } else if session.attach(arg) {
                // Attached files also feed the knowledge store, so later
                // questions can retrieve them without re-attaching.
                if session.knowledge.enabled() {
                    let _ = session.knowledge.upsert_file(
                        arg,
                        config.files.max_bytes,
                        config.files.max_chars,
                    );
                }
                print_success(&format!("attached {}", arg));
            } else {
                print_status("already attached");
            }
        }
        ":files" => {
            if session.files.is_empty() {
                print_status("no files attached");
            }
            for file in &session.files {
                print_status(file);
            }
        }
        ":detach" => {
            session.detach_all();
            print_success("cleared attached files");
        }
        ":note" => match (arg, rest) {
            ("set", rest) if !rest.is_empty() => {
                let mut kv = rest.splitn(2, char::is_whitespace);
                let key = kv.next().unwrap_or_default();
                let value = kv.next().unwrap_or_default();
                if value.is_empty() {
                    print_error("usage: :note set <key> <value>");
                } else {
                    session.note_set(key, value);
                    print_success(&format!("note {} set", key));
                }
            }
            ("del", key) if !key.is_empty() => {
                if session.note_del(key) {
                    print_success(&format!("note {} removed", key));
                } else {
                    print_status("no such note");
                }
            }
            _ => print_error("usage: :note set <key> <value> | :note del <key>"),
        },
        ":notes" => {
            if session.notes.is_empty() {
                print_status("no notes");
            }
            for (key, value) in &session.notes {
                print_status(&format!("{}: {}", key, value));
            }
        }
        ":kb" => handle_kb_command(arg, rest, session, config),
        ":stream" => match arg {
            "on" => {
                session.stream = true;
                print_success("streaming on");
            }
            "off" => {
                session.stream = false;
                print_success("streaming off");
            }
            _ => print_status(if session.stream {
                "streaming is on"
            } else {
                "streaming is off"
            }),
        },
        ":budget" => {
            if arg.is_empty() {
                let (target, observed) = (session.budget.target, session.budget.observed);
                print_status(&format!(
                    "target={} observed={} usable={}",
                    target.map_or("unset".to_string(), |n| n.to_string()),
                    observed.map_or("unset".to_string(), |n| n.to_string()),
                    session
                        .budget
                        .usable()
                        .map_or("unset".to_string(), |n| n.to_string()),
                ));
            } else {
                match arg.parse::<usize>() {
                    Ok(tokens) => {
                        session.budget.target = (tokens > 0).then_some(tokens);
                        print_success(&format!("budget target set to {}", tokens));
                    }
                    Err(_) => print_error("usage: :budget [tokens]"),
                }
            }
        }
        _ => {
            print_error(&format!("unknown command: {}", command));
            print_status("type :help for available commands");
        }
    }
    false
}

/// Knowledge store subcommands.
fn handle_kb_command(arg: &str, rest: &str, session: &mut Session, config: &Config) {
    match arg {
        "on" => {
            session.knowledge.set_enabled(true);
            print_success("knowledge store on");
        }
        "off" => {
            session.knowledge.set_enabled(false);
            print_success("knowledge store off");
        }
        "stats" => {
            let (enabled, docs) = session.knowledge.stats();
            print_status(&format!(
                "knowledge store: {} ({} documents)",
                if enabled { "on" } else { "off" },
                docs
            ));
        }
        "clear" => {
            session.knowledge.clear();
            print_success("knowledge store cleared");
        }
        "add" => {
            if rest.is_empty() {
                print_error("usage: :kb add <path>");
                return;
            }
            match session
                .knowledge
                .upsert_file(rest, config.files.max_bytes, config.files.max_chars)
            {
                Ok(doc) => print_success(&format!(
                    "indexed {} ({} chars)",
                    doc.path,
                    doc.text.chars().count()
                )),
                Err(e) => print_error(&format!("{:#}", e)),
            }
        }
        "search" => {
            if rest.is_empty() {
                print_error("usage: :kb search <query>");
                return;
            }
            let hits = session.knowledge.search(
                rest,
                config.knowledge.top_k,
                config.knowledge.excerpt_chars,
            );
            if hits.is_empty() {
                print_status("no matches");
            }
            for hit in hits {
                print_status(&format!("{} (score {})", hit.path, hit.score));
                for line in hit.snippet.lines().take(3) {
                    print_status(&format!("  {}", line));
                }
            }
        }
        _ => print_error("usage: :kb on|off|stats|clear|add <path>|search <query>"),
    }
}

fn print_banner(config: &Config) {
    println!();
    println!(
        "{}{}  ORBIT v{} - local AI shell{}",
        colors::PRIMARY,
        colors::BOLD,
        env!("CARGO_PKG_VERSION"),
        colors::RESET
    );
    println!(
        "{}  model {} at {}{}",
        colors::MUTED,
        config.llm.model,
        config.llm.endpoint,
        colors::RESET
    );
    println!(
        "{}  type a question, or :help for commands{}",
        colors::MUTED,
        colors::RESET
    );
}

fn print_help() {
    println!();
    println!(
        "{}{}  Available commands:{}",
        colors::PRIMARY,
        colors::BOLD,
        colors::RESET
    );
    let entries = [
        (":attach <path>", "attach a file to subsequent asks"),
        (":files / :detach", "list / clear attached files"),
        (":note set <k> <v>", "add a system-prompt note"),
        (":note del <k> / :notes", "remove / list notes"),
        (":kb on|off|stats|clear", "knowledge store control"),
        (":kb add <path>", "index a file into the store"),
        (":kb search <query>", "query the store directly"),
        (":stream on|off", "toggle streaming answers"),
        (":budget [tokens]", "show or set the context target"),
        (":last", "reprint the last answer"),
        (":exit", "leave the shell"),
    ];
    for (cmd, help) in entries {
        println!(
            "{}  {:<24}{}{}{}",
            colors::FG,
            cmd,
            colors::MUTED,
            help,
            colors::RESET
        );
    }
}

fn print_status(message: &str) {
    println!("{}  {}{}", colors::MUTED, message, colors::RESET);
}

fn print_success(message: &str) {
    println!(
        "{}  {} {}{}",
        colors::SUCCESS,
        symbols::SUCCESS,
        message,
        colors::RESET
    );
}
