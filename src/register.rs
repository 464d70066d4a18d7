//! The register file: eleven registers, four-bit ids.

/// A NanoVM register. `r0` always reads as zero in the interpreter; `sp` and
/// `ip` are conventional roles only, the encoder treats all eleven the same.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Register {
    R0 = 0,
    R1 = 1,
    R2 = 2,
    R3 = 3,
    R4 = 4,
    R5 = 5,
    R6 = 6,
    R7 = 7,
    R8 = 8,
    Sp = 9,
    Ip = 10,
}

impl Register {
    /// The four-bit id used directly in the encoded instruction word.
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Register> {
        use Register::*;
        match id {
            0 => Some(R0),
            1 => Some(R1),
            2 => Some(R2),
            3 => Some(R3),
            4 => Some(R4),
            5 => Some(R5),
            6 => Some(R6),
            7 => Some(R7),
            8 => Some(R8),
            9 => Some(Sp),
            10 => Some(Ip),
            _ => None,
        }
    }

    pub fn from_literal(literal: &str) -> Option<Register> {
        REGISTER_LITERALS
            .iter()
            .find(|(name, _)| *name == literal)
            .map(|(_, reg)| *reg)
    }
}

/// Mirrors the source's `register_literals` table.
pub const REGISTER_LITERALS: &[(&str, Register)] = &[
    ("r0", Register::R0),
    ("r1", Register::R1),
    ("r2", Register::R2),
    ("r3", Register::R3),
    ("r4", Register::R4),
    ("r5", Register::R5),
    ("r6", Register::R6),
    ("r7", Register::R7),
    ("r8", Register::R8),
    ("sp", Register::Sp),
    ("ip", Register::Ip),
];

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_roundtrips_through_from_id() {
        for (_, reg) in REGISTER_LITERALS {
            assert_eq!(Register::from_id(reg.id()), Some(*reg));
        }
    }

    #[test]
    fn literal_lookup_is_exact() {
        assert_eq!(Register::from_literal("sp"), Some(Register::Sp));
        assert_eq!(Register::from_literal("r9"), None);
    }
}
