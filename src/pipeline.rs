// pipeline.rs

use crate::builtins::{is_builtin, run_builtin, Flow};
use crate::history::History;
use crate::parser::{parse_pipeline, split_commands, Pipeline, Redirect};
use crate::util::writeln_ignore_broken_pipe;
use anyhow::{Context, Result};
use nix::errno::Errno;
use nix::sys::signal::{signal, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{
    close, dup2, execvp, fork, getpgrp, isatty, pipe, setpgid, tcsetpgrp, ForkResult, Pid,
};
use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::os::unix::io::{IntoRawFd, RawFd};
use tracing::{debug, warn};

/// Ignored by an interactive shell and restored to the default in children.
const JOB_SIGNALS: [Signal; 4] = [
    Signal::SIGINT,
    Signal::SIGQUIT,
    Signal::SIGTTIN,
    Signal::SIGTTOU,
];

struct Job {
    id: usize,
    pids: Vec<Pid>,
    text: String,
}

/// Terminal ownership and the list of background jobs.
pub struct JobControl {
    shell_pgid: Pid,
    tty: Option<RawFd>,
    jobs: Vec<Job>,
    next_id: usize,
}

impl JobControl {
    /// When stdin is a terminal, puts the shell in its own process group,
    /// takes the terminal and ignores the job-control signals. Ctrl-C then
    /// only reaches the foreground job. SIGTSTP stays ignored in children
    /// too, since there is no `fg` to resume a stopped job.
    pub fn init() -> Self {
        let tty = isatty(libc::STDIN_FILENO)
            .unwrap_or(false)
            .then_some(libc::STDIN_FILENO);
        if let Some(fd) = tty {
            for sig in JOB_SIGNALS.into_iter().chain([Signal::SIGTSTP]) {
                // SAFETY: SIG_IGN runs no handler code.
                if let Err(err) = unsafe { signal(sig, SigHandler::SigIgn) } {
                    warn!(?sig, %err, "cannot ignore signal");
                }
            }
            if let Err(err) = setpgid(Pid::from_raw(0), Pid::from_raw(0)) {
                debug!(%err, "keeping inherited process group");
            }
            if let Err(err) = tcsetpgrp(fd, getpgrp()) {
                warn!(%err, "cannot take the terminal");
            }
        }
        Self {
            shell_pgid: getpgrp(),
            tty,
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    /// Job control without a terminal.
    pub fn detached() -> Self {
        Self {
            shell_pgid: getpgrp(),
            tty: None,
            jobs: Vec::new(),
            next_id: 1,
        }
    }

    fn give_terminal(&self, pgid: Pid) {
        if let Some(fd) = self.tty {
            if let Err(err) = tcsetpgrp(fd, pgid) {
                debug!(%pgid, %err, "tcsetpgrp failed");
            }
        }
    }

    /// Waits for every process of a foreground job, then takes the terminal
    /// back. Returns the status of the last stage.
    fn wait_foreground(&self, pids: &[Pid]) -> Result<i32> {
        let mut status = 0;
        for &pid in pids {
            status = wait_for(pid)?;
        }
        self.give_terminal(self.shell_pgid);
        Ok(status)
    }

    fn track(&mut self, pids: Vec<Pid>, text: &str) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.jobs.push(Job {
            id,
            pids,
            text: text.to_string(),
        });
        id
    }

    pub fn background_count(&self) -> usize {
        self.jobs.len()
    }

    /// Collects finished background jobs and returns a notice for each.
    pub fn reap(&mut self) -> Vec<String> {
        let mut done = Vec::new();
        self.jobs.retain_mut(|job| {
            job.pids.retain(|&pid| {
                matches!(
                    waitpid(pid, Some(WaitPidFlag::WNOHANG)),
                    Ok(WaitStatus::StillAlive)
                )
            });
            if job.pids.is_empty() {
                done.push(format!("[{}]  Done    {}", job.id, job.text));
                false
            } else {
                true
            }
        });
        if self.jobs.is_empty() {
            self.next_id = 1;
        }
        done
    }
}

fn wait_for(pid: Pid) -> Result<i32> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => {
                debug!(%pid, code, "child exited");
                return Ok(code);
            }
            Ok(WaitStatus::Signaled(_, sig, _)) => {
                debug!(%pid, ?sig, "child killed by signal");
                return Ok(128 + sig as i32);
            }
            Ok(_) | Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(0),
            Err(err) => return Err(anyhow::Error::new(err).context("waitpid failed")),
        }
    }
}

/// Runs every command of an already expanded line.
pub fn run_line<W: Write>(
    line: &str,
    history: &mut History,
    jobs: &mut JobControl,
    out: &mut W,
) -> Flow {
    for command in split_commands(line) {
        let result = parse_pipeline(command)
            .and_then(|pipeline| run_pipeline(&pipeline, command.text, history, jobs, out));
        match result {
            Ok(Flow::Exit(code)) => return Flow::Exit(code),
            Ok(Flow::Continue) => {}
            Err(err) => eprintln!("histsh: {:#}", err),
        }
    }
    Flow::Continue
}

/// A lone foreground builtin runs inside the shell so `cd`, `exit` and
/// `history -c` take effect. Everything else is forked.
pub fn run_pipeline<W: Write>(
    pipeline: &Pipeline,
    text: &str,
    history: &mut History,
    jobs: &mut JobControl,
    out: &mut W,
) -> Result<Flow> {
    if pipeline.stages.len() == 1 && !pipeline.background && is_builtin(&pipeline.stages[0][0]) {
        return run_builtin_here(pipeline, history, out);
    }
    out.flush().ok();
    let pids = spawn(pipeline, history, jobs)?;
    if pipeline.background {
        let leader = pids[0];
        let id = jobs.track(pids, text);
        writeln_ignore_broken_pipe(out, format!("[{}] {}", id, leader))?;
    } else {
        let status = jobs.wait_foreground(&pids)?;
        debug!(status, command = text, "pipeline finished");
    }
    Ok(Flow::Continue)
}

fn run_builtin_here<W: Write>(
    pipeline: &Pipeline,
    history: &mut History,
    out: &mut W,
) -> Result<Flow> {
    let words = &pipeline.stages[0];
    let result = match &pipeline.output {
        Some(redirect) => run_builtin(words, history, &mut open_output(redirect)?),
        None => run_builtin(words, history, out),
    };
    match (&pipeline.error, result) {
        (Some(redirect), Err(err)) => {
            writeln_ignore_broken_pipe(&mut open_output(redirect)?, format!("{:#}", err))?;
            Ok(Flow::Continue)
        }
        (_, result) => result,
    }
}

fn open_output(redirect: &Redirect) -> Result<File> {
    let mut options = OpenOptions::new();
    options.create(true);
    if redirect.append {
        options.append(true);
    } else {
        options.write(true).truncate(true);
    }
    options
        .open(&redirect.path)
        .with_context(|| format!("{}: cannot open", redirect.path))
}

fn redirect_fd(file: File, target: RawFd) -> Result<()> {
    let fd = file.into_raw_fd();
    dup2(fd, target)?;
    close(fd)?;
    Ok(())
}

/// Forks one process per stage, chained with pipes, all in the process
/// group of the first stage.
fn spawn(pipeline: &Pipeline, history: &mut History, jobs: &JobControl) -> Result<Vec<Pid>> {
    let last = pipeline.stages.len() - 1;
    let mut pids: Vec<Pid> = Vec::with_capacity(pipeline.stages.len());
    let mut stdin: Option<RawFd> = None;
    for (i, words) in pipeline.stages.iter().enumerate() {
        let (next_stdin, stdout) = if i < last {
            let (read, write) = pipe().context("pipe failed")?;
            (Some(read), Some(write))
        } else {
            (None, None)
        };
        let stage = Stage {
            words,
            stdin,
            stdout,
            unused: next_stdin,
            input: if i == 0 { pipeline.input.as_ref() } else { None },
            output: if i == last { pipeline.output.as_ref() } else { None },
            error: if i == last { pipeline.error.as_ref() } else { None },
            pgid: pids.first().copied(),
            foreground: !pipeline.background,
        };
        let child = match unsafe { fork() }.context("fork failed")? {
            ForkResult::Child => {
                let code = stage.exec(history, jobs.tty);
                unsafe { libc::_exit(code) }
            }
            ForkResult::Parent { child } => child,
        };
        // The child sets its group too; whichever runs first wins.
        let group = pids.first().copied().unwrap_or(child);
        let _ = setpgid(child, group);
        if i == 0 && !pipeline.background {
            jobs.give_terminal(group);
        }
        for fd in [stdin, stdout].into_iter().flatten() {
            let _ = close(fd);
        }
        stdin = next_stdin;
        pids.push(child);
    }
    Ok(pids)
}

struct Stage<'a> {
    words: &'a [String],
    stdin: Option<RawFd>,
    stdout: Option<RawFd>,
    // Read end of this stage's own output pipe, owned by the next stage.
    unused: Option<RawFd>,
    input: Option<&'a String>,
    output: Option<&'a Redirect>,
    error: Option<&'a Redirect>,
    pgid: Option<Pid>,
    foreground: bool,
}

impl Stage<'_> {
    /// Runs in the forked child. Returns the exit code if exec did not
    /// replace the process.
    fn exec(&self, history: &mut History, tty: Option<RawFd>) -> i32 {
        let _ = setpgid(Pid::from_raw(0), self.pgid.unwrap_or(Pid::from_raw(0)));
        if let (Some(fd), true, None) = (tty, self.foreground, self.pgid) {
            let _ = tcsetpgrp(fd, getpgrp());
        }
        for sig in JOB_SIGNALS {
            // SAFETY: restores the default disposition before exec.
            let _ = unsafe { signal(sig, SigHandler::SigDfl) };
        }
        if let Err(err) = self.wire() {
            eprintln!("histsh: {:#}", err);
            return 1;
        }

        let name = &self.words[0];
        if is_builtin(name) {
            let mut stdout = std::io::stdout();
            let code = match run_builtin(self.words, history, &mut stdout) {
                Ok(Flow::Continue) => 0,
                Ok(Flow::Exit(code)) => code,
                Err(err) => {
                    eprintln!("histsh: {:#}", err);
                    1
                }
            };
            stdout.flush().ok();
            return code;
        }

        let argv = match self
            .words
            .iter()
            .map(|w| CString::new(w.as_bytes()))
            .collect::<Result<Vec<_>, _>>()
        {
            Ok(argv) => argv,
            Err(_) => {
                eprintln!("histsh: {}: argument contains a NUL byte", name);
                return 1;
            }
        };
        let _ = execvp(&argv[0], &argv);
        eprintln!("{}: command not found", name);
        127
    }

    fn wire(&self) -> Result<()> {
        if let Some(fd) = self.unused {
            let _ = close(fd);
        }
        if let Some(fd) = self.stdin {
            dup2(fd, libc::STDIN_FILENO)?;
            close(fd)?;
        }
        if let Some(fd) = self.stdout {
            dup2(fd, libc::STDOUT_FILENO)?;
            close(fd)?;
        }
        if let Some(path) = self.input {
            let file = File::open(path).with_context(|| format!("{}: cannot open", path))?;
            redirect_fd(file, libc::STDIN_FILENO)?;
        }
        if let Some(redirect) = self.output {
            redirect_fd(open_output(redirect)?, libc::STDOUT_FILENO)?;
        }
        if let Some(redirect) = self.error {
            redirect_fd(open_output(redirect)?, libc::STDERR_FILENO)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::thread::sleep;
    use std::time::Duration;

    fn run(line: &str) -> (Flow, String) {
        let mut history = History::new();
        let mut jobs = JobControl::detached();
        let mut out = Vec::new();
        let flow = run_line(line, &mut history, &mut jobs, &mut out);
        (flow, String::from_utf8(out).unwrap())
    }

    fn quoted(path: &Path) -> String {
        format!("'{}'", path.display())
    }

    #[test]
    fn runs_each_builtin_of_a_compound_line() {
        assert_eq!(run("echo sup; echo sup; "), (Flow::Continue, "sup\nsup\n".to_string()));
    }

    #[test]
    fn exit_stops_the_line() {
        let (flow, out) = run("exit 2; echo never");
        assert_eq!(flow, Flow::Exit(2));
        assert!(out.is_empty());
    }

    #[test]
    fn builtin_output_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let file = quoted(&dir.path().join("out"));
        run(&format!("echo hello > {}", file));
        run(&format!("echo more >> {}", file));
        let contents = std::fs::read_to_string(dir.path().join("out")).unwrap();
        assert_eq!(contents, "hello\nmore\n");
    }

    #[test]
    fn builtin_error_redirection() {
        let dir = tempfile::tempdir().unwrap();
        let err = dir.path().join("err");
        let (flow, _) = run(&format!("cd /no/such/dir 2> {}", quoted(&err)));
        assert_eq!(flow, Flow::Continue);
        let contents = std::fs::read_to_string(err).unwrap();
        assert!(contents.contains("No such file or directory"));
    }

    #[test]
    fn pipes_chain_builtins_and_programs() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        run(&format!("echo piped | tr a-z A-Z > {}", quoted(&out)));
        assert_eq!(std::fs::read_to_string(out).unwrap(), "PIPED\n");
    }

    #[test]
    fn input_redirection_feeds_the_first_stage() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        let out = dir.path().join("out");
        std::fs::write(&input, "b\na\n").unwrap();
        run(&format!("sort < {} > {}", quoted(&input), quoted(&out)));
        assert_eq!(std::fs::read_to_string(out).unwrap(), "a\nb\n");
    }

    #[test]
    fn background_jobs_are_reaped() {
        let mut history = History::new();
        let mut jobs = JobControl::detached();
        let mut out = Vec::new();
        run_line("true &", &mut history, &mut jobs, &mut out);
        assert!(String::from_utf8(out).unwrap().starts_with("[1] "));
        assert_eq!(jobs.background_count(), 1);

        let mut notices = Vec::new();
        for _ in 0..250 {
            notices.extend(jobs.reap());
            if jobs.background_count() == 0 {
                break;
            }
            sleep(Duration::from_millis(20));
        }
        assert_eq!(notices, vec!["[1]  Done    true".to_string()]);
    }

    #[test]
    fn each_job_runs_in_its_own_process_group() {
        let mut history = History::new();
        let jobs = JobControl::detached();
        let pipeline = parse_pipeline(split_commands("sleep 1 | sleep 1")[0]).unwrap();
        let pids = spawn(&pipeline, &mut history, &jobs).unwrap();
        let groups: Vec<Pid> = pids
            .iter()
            .map(|&pid| nix::unistd::getpgid(Some(pid)).unwrap())
            .collect();
        jobs.wait_foreground(&pids).unwrap();

        assert_eq!(groups, vec![pids[0], pids[0]]);
        assert_ne!(pids[0], getpgrp());
    }

    #[test]
    fn syntax_errors_skip_only_that_command() {
        assert_eq!(run("ls |; echo after"), (Flow::Continue, "after\n".to_string()));
    }
}
