// builtins.rs

use crate::history::History;
use crate::util::writeln_ignore_broken_pipe;
use anyhow::{bail, Result};
use itertools::Itertools;
use std::env;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const BUILTINS: [&str; 6] = ["echo", "exit", "type", "pwd", "cd", "history"];

/// What the read loop should do after a builtin returns.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Flow {
    Continue,
    Exit(i32),
}

pub fn is_builtin(name: &str) -> bool {
    BUILTINS.contains(&name)
}

/// Runs builtin `words[0]`. Errors are returned for the caller to report.
pub fn run_builtin<W: Write>(words: &[String], history: &mut History, out: &mut W) -> Result<Flow> {
    let Some(command) = words.first() else {
        return Ok(Flow::Continue);
    };
    let args = &words[1..];
    match command.as_str() {
        "exit" => {
            let code = match args.first() {
                Some(raw) => match raw.parse::<i32>() {
                    Ok(code) => code,
                    Err(_) => bail!("exit: {}: numeric argument required", raw),
                },
                None => 0,
            };
            return Ok(Flow::Exit(code));
        }
        "echo" => writeln_ignore_broken_pipe(out, args.iter().join(" "))?,
        "type" => {
            for name in args {
                if is_builtin(name) {
                    writeln_ignore_broken_pipe(out, format!("{} is a shell builtin", name))?;
                } else if let Some(path) = find_in_path(name) {
                    writeln_ignore_broken_pipe(out, format!("{} is {}", name, path.display()))?;
                } else {
                    writeln_ignore_broken_pipe(out, format!("{}: not found", name))?;
                }
            }
        }
        "pwd" => {
            let cwd = env::current_dir()?;
            writeln_ignore_broken_pipe(out, cwd.display())?;
        }
        "cd" => change_dir(args.first().map(String::as_str))?,
        "history" => run_history(args, history, out)?,
        other => bail!("{}: not a builtin", other),
    }
    Ok(Flow::Continue)
}

fn change_dir(arg: Option<&str>) -> Result<()> {
    let home = env::var_os("HOME").map(PathBuf::from);
    let target = match arg {
        None | Some("~") => match home {
            Some(home) => home,
            None => bail!("cd: HOME not set"),
        },
        Some(dir) => match (dir.strip_prefix("~/"), home) {
            (Some(rest), Some(home)) => home.join(rest),
            _ => PathBuf::from(dir),
        },
    };
    if env::set_current_dir(&target).is_err() {
        bail!("cd: {}: No such file or directory", target.display());
    }
    Ok(())
}

fn run_history<W: Write>(args: &[String], history: &mut History, out: &mut W) -> Result<()> {
    match args {
        [] => print_entries(history.list_entries(), out),
        [flag] if flag == "-c" => {
            history.clear();
            Ok(())
        }
        [flag, file] if flag == "-r" => history.load_from(Path::new(file)).map(drop),
        [flag, file] if flag == "-w" => history.save_to(Path::new(file), None),
        [flag, file] if flag == "-a" => history.append_new_to(Path::new(file)).map(drop),
        [count] => match count.parse::<usize>() {
            Ok(n) => print_entries(history.tail(n), out),
            Err(_) => bail!("history: {}: numeric argument required", count),
        },
        _ => bail!("history: usage: history [-c] [N] [-r|-w|-a FILE]"),
    }
}

fn print_entries<'a, W: Write>(
    entries: impl Iterator<Item = (usize, &'a str)>,
    out: &mut W,
) -> Result<()> {
    for (index, text) in entries {
        writeln_ignore_broken_pipe(out, format!("{} {}", index, text))?;
    }
    Ok(())
}

/// First executable file named `name` on `PATH`.
pub fn find_in_path(name: &str) -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join(name))
        .find(|candidate| {
            std::fs::metadata(candidate)
                .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
                .unwrap_or(false)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    fn run(line: &str, history: &mut History) -> (Flow, String) {
        let mut out = Vec::new();
        let flow = run_builtin(&words(line), history, &mut out).unwrap();
        (flow, String::from_utf8(out).unwrap())
    }

    #[test]
    fn history_lists_index_and_text() {
        let mut h = History::new();
        for line in ["ls", "cd", "pwd", "history"] {
            h.append(line);
        }
        let (_, out) = run("history", &mut h);
        assert_eq!(out, "1 ls\n2 cd\n3 pwd\n4 history\n");
        let (_, out) = run("history 2", &mut h);
        assert_eq!(out, "3 pwd\n4 history\n");
    }

    #[test]
    fn history_clear_and_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("saved");
        let file = file.to_str().unwrap();
        let mut h = History::new();
        h.append("echo one");
        h.append("echo two");
        run(&format!("history -w {}", file), &mut h);
        run("history -c", &mut h);
        assert!(h.is_empty());
        run(&format!("history -r {}", file), &mut h);
        let (_, out) = run("history", &mut h);
        assert_eq!(out, "1 echo one\n2 echo two\n");
    }

    #[test]
    fn history_rejects_bad_arguments() {
        let mut h = History::new();
        let mut out = Vec::new();
        assert!(run_builtin(&words("history lots"), &mut h, &mut out).is_err());
        assert!(run_builtin(&words("history -x a b"), &mut h, &mut out).is_err());
    }

    #[test]
    fn echo_and_exit() {
        let mut h = History::new();
        assert_eq!(run("echo go away", &mut h), (Flow::Continue, "go away\n".to_string()));
        assert_eq!(run("exit 3", &mut h).0, Flow::Exit(3));
        assert_eq!(run("exit", &mut h).0, Flow::Exit(0));
    }

    #[test]
    fn type_reports_builtins() {
        let mut h = History::new();
        let (_, out) = run("type history", &mut h);
        assert_eq!(out, "history is a shell builtin\n");
    }
}
