// expansion.rs

use crate::designator::{parse_bang, parse_quick_substitution};
use crate::error::ExpansionError;
use crate::history::History;
use crate::resolver::resolve;
use tracing::debug;

/// A line ready to execute. `expanded` is set when any designator was
/// rewritten, so the caller can show the user what will run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpandedLine {
    pub text: String,
    pub expanded: bool,
}

/// Rewrites every event designator in `raw` against `history`.
///
/// The store is only read. Any failure rejects the whole line; callers must
/// neither run nor record a line that failed here.
pub fn submit_line(raw: &str, history: &History) -> Result<ExpandedLine, ExpansionError> {
    if raw.starts_with('^') {
        let parsed = parse_quick_substitution(raw)?;
        let text = resolve(&parsed, history, "")?;
        debug!(%raw, %text, "quick substitution");
        return Ok(ExpandedLine { text, expanded: true });
    }
    if !raw.contains(['!', '\\']) {
        return Ok(ExpandedLine { text: raw.to_string(), expanded: false });
    }

    let mut out = String::with_capacity(raw.len());
    let mut expanded = false;
    let mut in_single = false;
    let mut in_double = false;
    let mut i = 0;
    while let Some(ch) = raw[i..].chars().next() {
        match ch {
            '\'' if !in_double => in_single = !in_single,
            '"' if !in_single => in_double = !in_double,
            '\\' if !in_single => {
                // `\\` is a pair, so a following `!` still expands. Inside
                // double quotes the backslash stays but still blocks `!`. A
                // caret is only a trigger at the start of the line.
                let escaped = match raw[i + 1..].chars().next() {
                    Some('\\') => Some("\\\\"),
                    Some('!') if in_double => Some("\\!"),
                    Some('!') => Some("!"),
                    Some('^') if i == 0 => Some("^"),
                    _ => None,
                };
                if let Some(escaped) = escaped {
                    out.push_str(escaped);
                    i += 2;
                    continue;
                }
            }
            '!' if !in_single => {
                if let Some(parsed) = parse_bang(&raw[i..])? {
                    let text = resolve(&parsed, history, &out)?;
                    debug!(designator = %parsed.source, %text, "expanded");
                    out.push_str(&text);
                    i += parsed.span_len();
                    expanded = true;
                    continue;
                }
            }
            _ => {}
        }
        out.push(ch);
        i += ch.len_utf8();
    }
    Ok(ExpandedLine { text: out, expanded })
}
