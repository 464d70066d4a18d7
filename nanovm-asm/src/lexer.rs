//! Tokenizes NanoVM assembly source.

use nanovm::directive::Directive;
use nanovm::instruction::is_instruction_mnemonic;
use nanovm::register::Register;

use crate::error::LexError;
use crate::position::PositionTracker;
use crate::token::{Token, TokenKind};

// "unsigned" is not in the reference's own reserved-keyword table, which
// means its `jmp ... unsigned` promotion is unreachable there (any
// `unsigned` token falls through to classification as a bare `Tag`
// instead of `OtherKeyword`, so the check for it never matches). Since the
// assembly grammar this assembler implements explicitly includes the
// `unsigned` suffix, it is added here.
const RESERVED_KEYWORDS: &[&str] = &["to", "in", "if", "unsigned"];

/// Turns `source` into an ordered token sequence, or the full set of
/// lexical errors encountered. ASCII only for keyword/identifier
/// classification; string literal contents pass through as raw UTF-8
/// bytes without locale dependence (spec.md §9 "Unicode-aware tokenization").
pub fn tokenize(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    let bytes = source.as_bytes();
    let tracker = PositionTracker::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    let mut i = 0usize;

    while i < bytes.len() {
        let c = bytes[i];

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        if c == b'#' {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        if c == b',' {
            i += 1;
            continue;
        }

        if c == b'"' {
            i += 1;
            let content_start = i;
            while i < bytes.len() && bytes[i] != b'"' {
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    i += 2;
                } else {
                    i += 1;
                }
            }
            let content_end = i;
            if i < bytes.len() {
                i += 1; // closing quote
            }
            let end_pos = tracker.resolve(i);
            let lexeme = source[content_start..content_end].to_string();
            tokens.push(Token::new(end_pos, TokenKind::StringLiteral, lexeme));
            continue;
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                i += 1;
            }
            tokens.push(Token::new(
                tracker.resolve(i),
                TokenKind::NumericLiteral,
                &source[start..i],
            ));
            continue;
        }

        if c == b'.' {
            let start = i;
            i += 1;
            let name_start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let literal = &source[start..i];
            if Directive::from_literal(literal).is_some() {
                tokens.push(Token::new(
                    tracker.resolve(i),
                    TokenKind::AssemblerDirective,
                    literal,
                ));
            } else {
                errors.push(LexError::UnknownDirective {
                    position: tracker.resolve(i),
                    name: source[name_start..i].to_string(),
                });
            }
            continue;
        }

        if c.is_ascii_alphabetic() {
            let start = i;
            while i < bytes.len() && bytes[i].is_ascii_alphanumeric() {
                i += 1;
            }
            let lexeme = &source[start..i];
            let end_pos = tracker.resolve(i);

            if i < bytes.len() && bytes[i] == b':' {
                i += 1;
                tokens.push(Token::new(end_pos, TokenKind::TagDefinition, lexeme));
            } else if is_instruction_mnemonic(lexeme) {
                tokens.push(Token::new(end_pos, TokenKind::InstructionKeyword, lexeme));
            } else if Register::from_literal(lexeme).is_some() {
                tokens.push(Token::new(end_pos, TokenKind::RegisterKeyword, lexeme));
            } else if RESERVED_KEYWORDS.contains(&lexeme) {
                tokens.push(Token::new(end_pos, TokenKind::OtherKeyword, lexeme));
            } else {
                tokens.push(Token::new(end_pos, TokenKind::Tag, lexeme));
            }
            continue;
        }

        if let Some((lexeme, len)) = match_symbolic_operator(&source[i..]) {
            i += len;
            tokens.push(Token::new(tracker.resolve(i), TokenKind::OtherKeyword, lexeme));
            continue;
        }

        let start = i;
        while i < bytes.len()
            && !bytes[i].is_ascii_whitespace()
            && !bytes[i].is_ascii_alphanumeric()
            && bytes[i] != b'#'
            && bytes[i] != b','
            && bytes[i] != b'"'
        {
            i += 1;
        }
        if i == start {
            i += 1;
        }
        errors.push(LexError::Unclassifiable {
            position: tracker.resolve(i),
            text: source[start..i].to_string(),
        });
    }

    tracing::debug!(token_count = tokens.len(), error_count = errors.len(), "tokenize complete");

    if errors.is_empty() {
        Ok(tokens)
    } else {
        Err(errors)
    }
}

fn match_symbolic_operator(rest: &str) -> Option<(&'static str, usize)> {
    if rest.starts_with("==") {
        Some(("==", 2))
    } else if rest.starts_with("!=") {
        Some(("!=", 2))
    } else if rest.starts_with('<') {
        Some(("<", 1))
    } else if rest.starts_with('>') {
        Some((">", 1))
    } else {
        None
    }
}
