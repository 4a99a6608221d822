use histsh::{submit_line, ExpansionErrorKind, History};

/// Expands and records a line the way the read loop does.
fn accept(history: &mut History, raw: &str) -> Result<String, ExpansionErrorKind> {
    let line = submit_line(raw, history).map_err(|e| e.kind())?;
    history.append(line.text.clone());
    Ok(line.text)
}

fn listing(history: &History) -> Vec<String> {
    history
        .list_entries()
        .map(|(index, text)| format!("{} {}", index, text))
        .collect()
}

#[test]
fn lines_are_numbered_in_submission_order() {
    let mut h = History::new();
    accept(&mut h, "ls").unwrap();
    accept(&mut h, "cd").unwrap();
    assert_eq!(h.list_entries().collect::<Vec<_>>(), vec![(1, "ls"), (2, "cd")]);
    accept(&mut h, "pwd").unwrap();
    accept(&mut h, "history").unwrap();
    assert_eq!(listing(&h), vec!["1 ls", "2 cd", "3 pwd", "4 history"]);
}

#[test]
fn the_interactive_session() {
    let mut h = History::new();
    for line in ["ls", "cd", "pwd", "history"] {
        accept(&mut h, line).unwrap();
    }

    accept(&mut h, "echo hi").unwrap();
    assert_eq!(accept(&mut h, "!!").unwrap(), "echo hi");
    assert_eq!(h.size(), 6);

    assert_eq!(accept(&mut h, "!3").unwrap(), "pwd");

    accept(&mut h, "echo hello").unwrap();
    assert_eq!(accept(&mut h, "!-1").unwrap(), "echo hello");
    assert_eq!(accept(&mut h, "!echo").unwrap(), "echo hello");
    assert_eq!(accept(&mut h, "^hello^go away").unwrap(), "echo go away");

    assert_eq!(accept(&mut h, "echo sup; !#").unwrap(), "echo sup; echo sup; ");
    assert_eq!(accept(&mut h, "!#").unwrap(), "echo sup; echo sup; ");

    let before = h.size();
    assert_eq!(accept(&mut h, "!40"), Err(ExpansionErrorKind::HistoryReferenceNotFound));
    assert_eq!(accept(&mut h, "!fg"), Err(ExpansionErrorKind::HistoryReferenceNotFound));
    assert_eq!(h.size(), before);
}

#[test]
fn relative_and_last_agree() {
    let mut h = History::new();
    accept(&mut h, "echo a").unwrap();
    accept(&mut h, "echo b").unwrap();
    let last = submit_line("!!", &h).unwrap();
    let back_one = submit_line("!-1", &h).unwrap();
    assert_eq!(last, back_one);
    assert_eq!(
        submit_line("!-3", &h).unwrap_err().kind(),
        ExpansionErrorKind::HistoryReferenceNotFound
    );
}

#[test]
fn newer_prefix_match_wins() {
    let mut h = History::new();
    accept(&mut h, "echo old").unwrap();
    accept(&mut h, "ls").unwrap();
    accept(&mut h, "echo new").unwrap();
    assert_eq!(submit_line("!ec", &h).unwrap().text, "echo new");
}

#[test]
fn empty_history_rejects_references() {
    let h = History::new();
    for raw in ["!!", "!1", "!-1", "!ls", "^a^b", "!#"] {
        assert_eq!(
            submit_line(raw, &h).unwrap_err().kind(),
            ExpansionErrorKind::HistoryReferenceNotFound,
            "{raw}"
        );
    }
}

#[test]
fn malformed_and_missing_are_distinct() {
    let mut h = History::new();
    accept(&mut h, "ls").unwrap();
    assert_eq!(
        submit_line("!-abc", &h).unwrap_err().kind(),
        ExpansionErrorKind::MalformedDesignator
    );
    assert_eq!(
        submit_line("!99", &h).unwrap_err().kind(),
        ExpansionErrorKind::HistoryReferenceNotFound
    );
}
