// repl.rs

use crate::builtins::Flow;
use crate::completion::CommandCompleter;
use crate::config::ShellConfig;
use crate::expansion::submit_line;
use crate::history::History;
use crate::pipeline::{run_line, JobControl};
use anyhow::{Context, Result};
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Config, Editor};
use tracing::{debug, warn};

/// Reads lines until EOF or `exit`, returning the exit status.
pub fn start_repl(config: &ShellConfig) -> Result<i32> {
    let editor_config = Config::builder().completion_type(CompletionType::List).build();
    let mut rl: Editor<CommandCompleter, DefaultHistory> =
        Editor::with_config(editor_config).context("failed to create line editor")?;
    rl.set_helper(Some(CommandCompleter));

    let mut jobs = JobControl::init();
    let mut history = History::new();
    if let Some(path) = &config.histfile {
        match history.load_from(path) {
            Ok(count) => {
                for (_, text) in history.list_entries() {
                    let _ = rl.add_history_entry(text);
                }
                debug!(count, "restored history");
            }
            Err(err) => debug!("no history restored: {:#}", err),
        }
    }

    let mut stdout = std::io::stdout();
    let status = loop {
        for notice in jobs.reap() {
            println!("{}", notice);
        }
        let line = match rl.readline(&config.prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break 0,
            Err(err) => {
                warn!("read error: {}", err);
                break 1;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let expanded = match submit_line(line, &history) {
            Ok(expanded) => expanded,
            Err(err) => {
                eprintln!("histsh: {}", err);
                continue;
            }
        };
        if expanded.expanded {
            println!("{}", expanded.text);
        }
        let _ = rl.add_history_entry(expanded.text.as_str());
        history.append(expanded.text.as_str());
        if let Flow::Exit(code) = run_line(&expanded.text, &mut history, &mut jobs, &mut stdout) {
            break code;
        }
    };

    if let Some(path) = &config.histfile {
        history
            .save_to(path, config.histfile_size)
            .with_context(|| format!("saving history to {}", path.display()))?;
    }
    Ok(status)
}
