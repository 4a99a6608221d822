// completion.rs

use crate::builtins::BUILTINS;
use rustyline::completion::{Completer, Pair};
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::{ValidationContext, ValidationResult, Validator};
use rustyline::{Context, Helper};
use std::os::unix::fs::PermissionsExt;

/// Completes the command word against builtins and executables on `PATH`.
#[derive(Default)]
pub struct CommandCompleter;

impl CommandCompleter {
    pub fn candidates(prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = BUILTINS
            .iter()
            .filter(|b| b.starts_with(prefix))
            .map(|b| b.to_string())
            .collect();
        if let Some(path) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&path) {
                let Ok(entries) = std::fs::read_dir(dir) else { continue };
                for entry in entries.flatten() {
                    let Some(name) = entry.file_name().to_str().map(String::from) else {
                        continue;
                    };
                    if !name.starts_with(prefix) {
                        continue;
                    }
                    let executable = entry
                        .metadata()
                        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                        .unwrap_or(false);
                    if executable {
                        names.push(name);
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Result<(usize, Vec<Pair>), ReadlineError> {
        let before = &line[..pos];
        // Only the first word after a separator or pipe is a command name.
        let start = before.rfind([';', '&', '|']).map(|i| i + 1).unwrap_or(0);
        let start = start + (before[start..].len() - before[start..].trim_start().len());
        let word = &before[start..];
        if word.contains(char::is_whitespace) || word.starts_with(['!', '^']) {
            return Ok((pos, Vec::new()));
        }
        let pairs = Self::candidates(word)
            .into_iter()
            .map(|n| Pair { display: n.clone(), replacement: format!("{} ", n) })
            .collect();
        Ok((start, pairs))
    }
}

impl Hinter for CommandCompleter {
    type Hint = String;
    fn hint(&self, _line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        None
    }
}

impl Highlighter for CommandCompleter {}

impl Validator for CommandCompleter {
    fn validate(&self, _ctx: &mut ValidationContext) -> Result<ValidationResult, ReadlineError> {
        Ok(ValidationResult::Valid(None))
    }
}

impl Helper for CommandCompleter {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_complete_by_prefix() {
        let names = CommandCompleter::candidates("hist");
        assert!(names.contains(&"history".to_string()));
        assert!(!names.contains(&"echo".to_string()));
    }
}
