// designator.rs
//
// Grammar for history event designators. Each `!` form is matched by the
// first rule in `parse_bang` that applies, which keeps `!!`, `!#`, `!-n`,
// `!n`, `!?s?` and `!s` from overlapping.

use crate::error::ExpansionError;

/// Characters that end a `!string` word besides whitespace.
const WORD_DELIMITERS: &[char] = &[';', '&', '|', '<', '>', '(', ')', '\'', '"'];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Designator {
    /// `!!`
    Last,
    /// `!n`
    AbsoluteIndex(usize),
    /// `!-n`
    RelativeOffset(usize),
    /// `!string`
    PrefixSearch(String),
    /// `!?string?`
    SubstringSearch(String),
    /// `!#`
    CurrentLine,
    /// `^old^new`
    QuickSubstitute { old: String, new: String },
}

/// A designator found in an input line, with the exact text it spans.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Parsed {
    pub designator: Designator,
    pub source: String,
}

impl Parsed {
    pub fn span_len(&self) -> usize {
        self.source.len()
    }
}

fn is_word_end(c: char) -> bool {
    c.is_whitespace() || WORD_DELIMITERS.contains(&c)
}

/// Numbers too large for `usize` cannot name an entry; they saturate so that
/// lookup reports them as not found instead of failing to parse.
fn parse_count(digits: &str) -> usize {
    digits.parse().unwrap_or(usize::MAX)
}

fn leading_digits(s: &str) -> &str {
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    &s[..end]
}

fn leading_word(s: &str) -> &str {
    let end = s.find(is_word_end).unwrap_or(s.len());
    &s[..end]
}

/// Parses the designator at the start of `text`, which must begin with `!`.
/// Returns `Ok(None)` when the `!` is literal (followed by whitespace, the
/// end of the line, `=`, `(` or a closing `"`).
pub fn parse_bang(text: &str) -> Result<Option<Parsed>, ExpansionError> {
    debug_assert!(text.starts_with('!'));
    let rest = &text[1..];
    let parsed = |designator: Designator, len: usize| -> Result<Option<Parsed>, ExpansionError> {
        Ok(Some(Parsed {
            designator,
            source: text[..len].to_string(),
        }))
    };

    let Some(next) = rest.chars().next() else {
        return Ok(None);
    };
    match next {
        c if c.is_whitespace() || matches!(c, '=' | '(' | '"') => Ok(None),
        '!' => parsed(Designator::Last, 2),
        '#' => parsed(Designator::CurrentLine, 2),
        '-' => {
            let digits = leading_digits(&rest[1..]);
            if digits.is_empty() {
                let word = leading_word(&rest[1..]);
                return Err(ExpansionError::malformed(format!("!-{}", word)));
            }
            parsed(Designator::RelativeOffset(parse_count(digits)), 2 + digits.len())
        }
        c if c.is_ascii_digit() => {
            let digits = leading_digits(rest);
            parsed(Designator::AbsoluteIndex(parse_count(digits)), 1 + digits.len())
        }
        '?' => {
            let body = &rest[1..];
            let (needle, len) = match body.find('?') {
                Some(end) => (&body[..end], 2 + end + 1),
                None => (body, 2 + body.len()),
            };
            if needle.is_empty() {
                return Err(ExpansionError::malformed(&text[..len]));
            }
            parsed(Designator::SubstringSearch(needle.to_string()), len)
        }
        _ => {
            let word = leading_word(rest);
            if word.is_empty() {
                let len = 1 + next.len_utf8();
                return Err(ExpansionError::malformed(&text[..len]));
            }
            parsed(Designator::PrefixSearch(word.to_string()), 1 + word.len())
        }
    }
}

/// Parses a whole line of the form `^old^new[^]`. A missing second caret
/// means `new` is empty.
pub fn parse_quick_substitution(line: &str) -> Result<Parsed, ExpansionError> {
    debug_assert!(line.starts_with('^'));
    let body = &line[1..];
    let (old, new) = match body.split_once('^') {
        Some((old, rest)) => (old, rest.split('^').next().unwrap_or_default()),
        None => (body, ""),
    };
    if old.is_empty() {
        return Err(ExpansionError::malformed(line));
    }
    Ok(Parsed {
        designator: Designator::QuickSubstitute {
            old: old.to_string(),
            new: new.to_string(),
        },
        source: line.to_string(),
    })
}
