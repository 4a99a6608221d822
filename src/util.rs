// util.rs

use std::fmt::Display;
use std::io::{ErrorKind, Result, Write};

/// Writes `line` and a newline, treating a closed reader as success.
pub fn writeln_ignore_broken_pipe<W: Write + ?Sized, S: Display>(w: &mut W, line: S) -> Result<()> {
    match writeln!(w, "{}", line).and_then(|_| w.flush()) {
        Err(ref e) if e.kind() == ErrorKind::BrokenPipe => Ok(()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_terminated_line() {
        let mut buf = Vec::new();
        writeln_ignore_broken_pipe(&mut buf, "1 ls").unwrap();
        assert_eq!(buf, b"1 ls\n");
    }
}
