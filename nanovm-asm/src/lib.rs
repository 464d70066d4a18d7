//! Lexer, parser, and two-pass encoder for NanoVM assembly: the graded
//! core of the toolchain.

pub mod encoder;
pub mod error;
pub mod lexer;
pub mod object;
pub mod parser;
pub mod position;
pub mod token;

pub use encoder::AssembledProgram;
pub use error::Error;
pub use token::Token;

use std::fs;
use std::path::Path;

/// Runs the full tokenize → parse → encode pipeline over `source`.
pub fn assemble(source: &str) -> Result<AssembledProgram, Error> {
    let tokens = lexer::tokenize(source).map_err(Error::Lex)?;
    let objects = parser::parse(&tokens).map_err(Error::Parse)?;
    encoder::encode(&objects).map_err(Error::Encode)
}

/// Reads `path` and assembles its contents.
pub fn assemble_file(path: impl AsRef<Path>) -> Result<AssembledProgram, AssembleFileError> {
    let source = fs::read_to_string(path).map_err(AssembleFileError::Io)?;
    assemble(&source).map_err(AssembleFileError::Assemble)
}

#[derive(Debug, thiserror::Error)]
pub enum AssembleFileError {
    #[error("could not read source file: {0}")]
    Io(#[source] std::io::Error),
    #[error(transparent)]
    Assemble(Error),
}
