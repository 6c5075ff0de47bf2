//! Search command - query the persisted knowledge store

use anyhow::Result;

use crate::config::Config;
use crate::knowledge::persist;

// ANSI color codes from design system
mod colors {
    pub const RESET: &str = "\x1b[0m";
    pub const BOLD: &str = "\x1b[1m";
    pub const PRIMARY: &str = "\x1b[38;2;100;181;246m";
    pub const WARNING: &str = "\x1b[38;2;255;245;157m";
    pub const MUTED: &str = "\x1b[38;2;84;110;122m";
    pub const FG: &str = "\x1b[38;2;212;212;215m";
}

pub async fn run(config: Config, query: &str, limit: usize) -> Result<()> {
    let store_path = persist::default_store_path()?;
    let store = persist::load(&store_path, true);

    if store.is_empty() {
        println!(
            "{}  knowledge store is empty; run `orbit index <path>` first{}",
            colors::WARNING,
            colors::RESET
        );
        return Ok(());
    }

    let hits = store.search(query, limit, config.knowledge.excerpt_chars);
    if hits.is_empty() {
        println!(
            "{}  no matches for \"{}\" across {} documents{}",
            colors::MUTED,
            query,
            store.len(),
            colors::RESET
        );
        return Ok(());
    }

    println!();
    println!(
        "{}{}  {} results for \"{}\"{}",
        colors::PRIMARY,
        colors::BOLD,
        hits.len(),
        query,
        colors::RESET
    );
    for hit in hits {
        println!();
        println!(
            "{}  {}{}{} (score {}){}",
            colors::MUTED,
            colors::FG,
            hit.path,
            colors::MUTED,
            hit.score,
            colors::RESET
        );
        for line in hit.snippet.lines() {
            println!("{}  │ {}{}{}", colors::MUTED, colors::FG, line, colors::RESET);
        }
    }
    println!();
    Ok(())
}
