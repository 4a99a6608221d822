// resolver.rs

use crate::designator::{Designator, Parsed};
use crate::error::ExpansionError;
use crate::history::History;
use tracing::trace;

/// Turns a parsed designator into the text it stands for. `current_line` is
/// the expanded text accumulated before the designator on the line being
/// submitted.
pub fn resolve(
    parsed: &Parsed,
    history: &History,
    current_line: &str,
) -> Result<String, ExpansionError> {
    let not_found = || ExpansionError::not_found(&parsed.source);
    let entry = match &parsed.designator {
        Designator::Last => history.latest(),
        Designator::AbsoluteIndex(n) => history.entry_at(*n),
        Designator::RelativeOffset(n) => history.entry_from_end(*n),
        Designator::PrefixSearch(prefix) => history.find_by_prefix(prefix),
        Designator::SubstringSearch(needle) => history.find_containing(needle),
        Designator::CurrentLine => {
            // At the start of a line there is nothing assembled yet, so `!#`
            // repeats the line stored last.
            if !current_line.is_empty() {
                return Ok(current_line.to_string());
            }
            history.latest()
        }
        Designator::QuickSubstitute { old, new } => {
            let latest = history.latest().ok_or_else(not_found)?;
            if !latest.text.contains(old.as_str()) {
                return Err(not_found());
            }
            return Ok(latest.text.replacen(old.as_str(), new, 1));
        }
    };
    let entry = entry.ok_or_else(not_found)?;
    trace!(designator = %parsed.source, index = entry.index, "resolved");
    Ok(entry.text.clone())
}
