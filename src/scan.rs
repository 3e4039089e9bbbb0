// src/scan.rs

//! Detect whether a directory holds wasm-targeted Go tests.
//!
//! A file is eligible when its name ends in `_test.go` and its header (the
//! lines before the `package` clause) has a build constraint that requires
//! both `js` and `wasm`, e.g.:
//!
//! ```text
//! //go:build js && wasm
//! // +build js,wasm
//! ```
//!
//! Only the directory itself is scanned, as `go test` runs one package.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::{debug, warn};

use crate::fs::FileSystem;

pub const TEST_FILE_SUFFIX: &str = "_test.go";

/// True if `dir` contains at least one eligible test file.
pub fn has_wasm_tests(fs: &dyn FileSystem, dir: &Path) -> Result<bool> {
    Ok(!wasm_test_files(fs, dir)?.is_empty())
}

/// All eligible test files in `dir`, sorted by path.
pub fn wasm_test_files(fs: &dyn FileSystem, dir: &Path) -> Result<Vec<PathBuf>> {
    if !fs.is_dir(dir) {
        anyhow::bail!("test directory {} does not exist or is not a directory", dir.display());
    }

    let mut found = Vec::new();
    for path in fs.read_dir(dir)? {
        let is_test_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(TEST_FILE_SUFFIX));
        if !is_test_name || !fs.is_file(&path) {
            continue;
        }

        let reader = match fs.open_read(&path) {
            Ok(r) => r,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable test file");
                continue;
            }
        };

        if header_targets_js_wasm(BufReader::new(reader)) {
            debug!(path = %path.display(), "found wasm test file");
            found.push(path);
        }
    }

    Ok(found)
}

/// Whether a Go source header carries a build constraint that requires both
/// `js` and `wasm`.
pub fn header_targets_js_wasm(reader: impl BufRead) -> bool {
    for line in reader.lines() {
        let Ok(line) = line else {
            return false;
        };
        let line = line.trim();

        if line.starts_with("package ") || line == "package" {
            return false;
        }
        let expr = if let Some(expr) = line.strip_prefix("//go:build") {
            BuildExpr::parse(expr)
        } else if let Some(expr) = line.strip_prefix("// +build") {
            BuildExpr::parse_legacy(expr)
        } else {
            continue;
        };

        match expr {
            Some(expr) if expr.requires_js_wasm() => return true,
            Some(_) => {}
            None => debug!(line, "unparseable build constraint; ignoring"),
        }
    }
    false
}

/// A parsed build constraint expression.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BuildExpr {
    Tag(String),
    Not(Box<BuildExpr>),
    And(Box<BuildExpr>, Box<BuildExpr>),
    Or(Box<BuildExpr>, Box<BuildExpr>),
}

impl BuildExpr {
    /// `//go:build` syntax: `!`, `&&`, `||` and parentheses.
    fn parse(src: &str) -> Option<Self> {
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.or()?;
        (parser.pos == parser.tokens.len()).then_some(expr)
    }

    /// `// +build` syntax: spaces mean OR, commas mean AND, `!` negates.
    fn parse_legacy(src: &str) -> Option<Self> {
        src.split_whitespace()
            .map(|clause| {
                clause
                    .split(',')
                    .map(|term| match term.strip_prefix('!') {
                        Some(tag) if is_tag(tag) => Some(Self::Not(Box::new(Self::Tag(tag.into())))),
                        None if is_tag(term) => Some(Self::Tag(term.into())),
                        _ => None,
                    })
                    .reduce(|a, b| Some(Self::And(Box::new(a?), Box::new(b?))))?
            })
            .reduce(|a, b| Some(Self::Or(Box::new(a?), Box::new(b?))))?
    }

    fn eval(&self, tags: &[&str]) -> bool {
        match self {
            Self::Tag(tag) => tags.contains(&tag.as_str()),
            Self::Not(inner) => !inner.eval(tags),
            Self::And(a, b) => a.eval(tags) && b.eval(tags),
            Self::Or(a, b) => a.eval(tags) || b.eval(tags),
        }
    }

    /// Satisfied by a js/wasm build, and by neither tag alone.
    fn requires_js_wasm(&self) -> bool {
        self.eval(&["js", "wasm"]) && !self.eval(&["js"]) && !self.eval(&["wasm"])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Tag(String),
    Not,
    And,
    Or,
    Open,
    Close,
}

fn is_tag(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn tokenize(src: &str) -> Option<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '!' => Token::Not,
            '(' => Token::Open,
            ')' => Token::Close,
            '&' if chars.next_if(|&(_, c)| c == '&').is_some() => Token::And,
            '|' if chars.next_if(|&(_, c)| c == '|').is_some() => Token::Or,
            c if is_tag(c.encode_utf8(&mut [0; 4])) => {
                let mut end = i + c.len_utf8();
                while let Some((j, c)) = chars.next_if(|&(_, c)| c.is_alphanumeric() || c == '_' || c == '.') {
                    end = j + c.len_utf8();
                }
                Token::Tag(src[i..end].to_string())
            }
            _ => return None,
        };
        tokens.push(token);
    }
    Some(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn or(&mut self) -> Option<BuildExpr> {
        let mut lhs = self.and()?;
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            lhs = BuildExpr::Or(Box::new(lhs), Box::new(self.and()?));
        }
        Some(lhs)
    }

    fn and(&mut self) -> Option<BuildExpr> {
        let mut lhs = self.unary()?;
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            lhs = BuildExpr::And(Box::new(lhs), Box::new(self.unary()?));
        }
        Some(lhs)
    }

    fn unary(&mut self) -> Option<BuildExpr> {
        match self.next()? {
            Token::Not => Some(BuildExpr::Not(Box::new(self.unary()?))),
            Token::Open => {
                let inner = self.or()?;
                (self.next()? == Token::Close).then_some(inner)
            }
            Token::Tag(tag) => Some(BuildExpr::Tag(tag)),
            _ => None,
        }
    }
}
