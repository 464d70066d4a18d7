//! Assembler directives: `.addr`, the fixed-width data directives, and `.string`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Addr,
    I8,
    I16,
    I32,
    I64,
    String,
}

impl Directive {
    /// Byte width of one value under this directive, or `None` for `.addr`
    /// and `.string`, which do not have a fixed per-value width.
    pub fn value_width(self) -> Option<u8> {
        match self {
            Directive::I8 => Some(1),
            Directive::I16 => Some(2),
            Directive::I32 => Some(4),
            Directive::I64 => Some(8),
            Directive::Addr | Directive::String => None,
        }
    }

    pub fn from_literal(literal: &str) -> Option<Directive> {
        DIRECTIVE_LITERALS
            .iter()
            .find(|(name, _)| *name == literal)
            .map(|(_, directive)| *directive)
    }
}

/// Mirrors the source's `assembler_directives` table. Directive literals
/// include the leading `.`.
pub const DIRECTIVE_LITERALS: &[(&str, Directive)] = &[
    (".addr", Directive::Addr),
    (".i8", Directive::I8),
    (".i16", Directive::I16),
    (".i32", Directive::I32),
    (".i64", Directive::I64),
    (".string", Directive::String),
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn widths_match_name() {
        assert_eq!(Directive::I32.value_width(), Some(4));
        assert_eq!(Directive::Addr.value_width(), None);
    }

    #[test]
    fn literal_lookup() {
        assert_eq!(Directive::from_literal(".i64"), Some(Directive::I64));
        assert_eq!(Directive::from_literal(".nope"), None);
    }
}
