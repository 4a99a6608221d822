// parser.rs

use anyhow::{bail, Result};
use std::os::unix::io::RawFd;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Quote {
    None,
    Single,
    Double,
}

/// One `;` or `&` terminated command of a line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct CommandText<'a> {
    pub text: &'a str,
    pub background: bool,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Token {
    Word(String),
    Pipe,
    Input,
    Output { fd: RawFd, append: bool },
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Redirect {
    pub path: String,
    pub append: bool,
}

/// A parsed command: stages joined by `|`. Input redirection applies to the
/// first stage, output and error redirection to the last.
#[derive(Clone, Default, PartialEq, Eq, Debug)]
pub struct Pipeline {
    pub stages: Vec<Vec<String>>,
    pub input: Option<String>,
    pub output: Option<Redirect>,
    pub error: Option<Redirect>,
    pub background: bool,
}

/// Splits a line on `;` and `&` outside quotes. Empty commands are dropped.
pub fn split_commands<'a>(line: &'a str) -> Vec<CommandText<'a>> {
    let mut commands = Vec::new();
    let mut quote = Quote::None;
    let mut escaped = false;
    let mut start = 0;
    let mut push = |text: &'a str, background: bool| {
        let text = text.trim();
        if !text.is_empty() {
            commands.push(CommandText { text, background });
        }
    };
    for (i, ch) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match (quote, ch) {
            (Quote::Single, '\'') | (Quote::Double, '"') => quote = Quote::None,
            (Quote::None, '\'') => quote = Quote::Single,
            (Quote::None, '"') => quote = Quote::Double,
            (Quote::None | Quote::Double, '\\') => escaped = true,
            (Quote::None, ';' | '&') => {
                push(&line[start..i], ch == '&');
                start = i + 1;
            }
            _ => {}
        }
    }
    push(&line[start..], false);
    commands
}

/// Splits one command into words and operators, removing quotes and
/// backslash escapes. Quoted operator characters stay part of a word.
pub fn tokenize(command: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cur = String::new();
    let mut in_word = false;
    let mut quoted = false;
    let mut quote = Quote::None;
    let mut chars = command.chars().peekable();

    fn finish(tokens: &mut Vec<Token>, cur: &mut String, in_word: &mut bool, quoted: &mut bool) {
        if *in_word {
            tokens.push(Token::Word(std::mem::take(cur)));
        }
        *in_word = false;
        *quoted = false;
    }

    while let Some(ch) = chars.next() {
        match quote {
            Quote::None => match ch {
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                    quoted = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                    quoted = true;
                }
                '\\' => {
                    if let Some(next) = chars.next() {
                        cur.push(next);
                    }
                    in_word = true;
                    quoted = true;
                }
                '|' => {
                    finish(&mut tokens, &mut cur, &mut in_word, &mut quoted);
                    tokens.push(Token::Pipe);
                }
                '<' => {
                    finish(&mut tokens, &mut cur, &mut in_word, &mut quoted);
                    tokens.push(Token::Input);
                }
                '>' => {
                    let fd = if cur == "2" && !quoted {
                        cur.clear();
                        in_word = false;
                        2
                    } else {
                        finish(&mut tokens, &mut cur, &mut in_word, &mut quoted);
                        1
                    };
                    let append = chars.next_if_eq(&'>').is_some();
                    tokens.push(Token::Output { fd, append });
                }
                c if c.is_whitespace() => finish(&mut tokens, &mut cur, &mut in_word, &mut quoted),
                _ => {
                    cur.push(ch);
                    in_word = true;
                }
            },
            Quote::Single => match ch {
                '\'' => quote = Quote::None,
                _ => cur.push(ch),
            },
            Quote::Double => match ch {
                '"' => quote = Quote::None,
                '\\' => match chars.peek() {
                    Some(&next @ ('\\' | '"' | '$')) => {
                        cur.push(next);
                        chars.next();
                    }
                    _ => cur.push('\\'),
                },
                _ => cur.push(ch),
            },
        }
    }
    finish(&mut tokens, &mut cur, &mut in_word, &mut quoted);
    tokens
}

/// Groups tokens into pipeline stages and redirections.
pub fn parse_pipeline(command: CommandText<'_>) -> Result<Pipeline> {
    let mut pipeline = Pipeline {
        background: command.background,
        ..Pipeline::default()
    };
    let mut stage = Vec::new();
    let mut tokens = tokenize(command.text).into_iter();
    while let Some(token) = tokens.next() {
        match token {
            Token::Word(word) => stage.push(word),
            Token::Pipe => {
                if stage.is_empty() {
                    bail!("syntax error near `|'");
                }
                pipeline.stages.push(std::mem::take(&mut stage));
            }
            Token::Input | Token::Output { .. } => {
                let Some(Token::Word(path)) = tokens.next() else {
                    bail!("syntax error: missing redirection target");
                };
                match token {
                    Token::Output { fd: 2, append } => pipeline.error = Some(Redirect { path, append }),
                    Token::Output { append, .. } => pipeline.output = Some(Redirect { path, append }),
                    _ => pipeline.input = Some(path),
                }
            }
        }
    }
    if stage.is_empty() {
        bail!("syntax error: missing command");
    }
    pipeline.stages.push(stage);
    Ok(pipeline)
}
