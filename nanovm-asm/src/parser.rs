//! Consumes the token sequence and produces the ordered object sequence.

use nanovm::directive::Directive;
use nanovm::instruction::{Instruction, JMP_MNEMONIC};
use nanovm::register::Register;

use crate::error::ParseError;
use crate::object::{DirectiveValue, Object, Op3};
use crate::position::Position;
use crate::token::{Token, TokenKind};

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Cursor<'t> {
        Cursor { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn last_position(&self) -> Position {
        if self.pos == 0 {
            Position { line: 1, column: 1 }
        } else {
            self.tokens[self.pos - 1].position
        }
    }

    fn expect_any(&mut self, context: &'static str) -> Result<&'t Token, ParseError> {
        self.bump().ok_or(ParseError::UnexpectedEndOfStream {
            position: self.last_position(),
            context,
        })
    }

    fn expect_register(&mut self, context: &'static str) -> Result<Register, ParseError> {
        let token = self.expect_any(context)?;
        if token.kind == TokenKind::RegisterKeyword {
            Ok(Register::from_literal(&token.lexeme).expect("lexer only emits known registers"))
        } else {
            Err(ParseError::UnexpectedOperandToken {
                position: token.position,
                lexeme: token.lexeme.clone(),
                expected: context,
            })
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str, context: &'static str) -> Result<(), ParseError> {
        let token = self.expect_any(context)?;
        if token.kind == TokenKind::OtherKeyword && token.lexeme == keyword {
            Ok(())
        } else {
            Err(ParseError::UnexpectedOperandToken {
                position: token.position,
                lexeme: token.lexeme.clone(),
                expected: context,
            })
        }
    }

    /// *reg-or-imm-or-tag*, used by `load`, `store`, and `jmp`.
    fn expect_reg_imm_tag(&mut self, context: &'static str) -> Result<Op3, ParseError> {
        let token = self.expect_any(context)?;
        match token.kind {
            TokenKind::RegisterKeyword => Ok(Op3::Reg(
                Register::from_literal(&token.lexeme).expect("lexer only emits known registers"),
            )),
            TokenKind::NumericLiteral => {
                let value = parse_number(&token.lexeme);
                check_immediate_44(value, token.position)?;
                Ok(Op3::Imm(value))
            }
            TokenKind::Tag => Ok(Op3::Tag(token.lexeme.clone())),
            _ => Err(ParseError::UnexpectedOperandToken {
                position: token.position,
                lexeme: token.lexeme.clone(),
                expected: context,
            }),
        }
    }
}

/// Parses `.i32 1 2 3`-style hex/decimal literals, following the source's
/// `contains('x'|'X') => base 16` rule.
fn parse_number(lexeme: &str) -> u64 {
    if lexeme.contains('x') || lexeme.contains('X') {
        let digits: String = lexeme.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        u64::from_str_radix(&digits, 16).unwrap_or(0)
    } else {
        lexeme.parse::<u64>().unwrap_or(0)
    }
}

fn check_immediate_44(value: u64, position: Position) -> Result<(), ParseError> {
    if value >> 44 != 0 {
        Err(ParseError::ImmediateOverflow { position, value })
    } else {
        Ok(())
    }
}

fn check_directive_width(value: u64, width: u8, position: Position) -> Result<(), ParseError> {
    // `.i64` is specified as the full 64-bit range (spec.md §9 design note:
    // the source bug that checked it against the 32-bit mask is not
    // reproduced), so width 64 never overflows a parsed u64.
    if width < 64 && value >> width != 0 {
        Err(ParseError::DirectiveValueOverflow {
            position,
            value,
            width,
        })
    } else {
        Ok(())
    }
}

fn parse_reg_reg_regimm(cursor: &mut Cursor, instruction: Instruction) -> Result<Object, ParseError> {
    let op1 = cursor.expect_register("first register operand")?;
    let op2 = cursor.expect_register("second register operand")?;
    let token = cursor.expect_any("third operand (register or immediate)")?;
    let op3 = match token.kind {
        TokenKind::RegisterKeyword => {
            Op3::Reg(Register::from_literal(&token.lexeme).expect("lexer only emits known registers"))
        }
        TokenKind::NumericLiteral => {
            let value = parse_number(&token.lexeme);
            check_immediate_44(value, token.position)?;
            Op3::Imm(value)
        }
        _ => {
            return Err(ParseError::UnexpectedOperandToken {
                position: token.position,
                lexeme: token.lexeme.clone(),
                expected: "third operand (register or immediate)",
            })
        }
    };
    Ok(Object::InstructionRecord {
        instruction,
        op1,
        op2,
        op3,
        misc: 0,
    })
}

fn parse_reg_reg(cursor: &mut Cursor, instruction: Instruction) -> Result<Object, ParseError> {
    let op1 = cursor.expect_register("destination register")?;
    let op2 = cursor.expect_register("source register")?;
    Ok(Object::InstructionRecord {
        instruction,
        op1,
        op2,
        op3: Op3::Imm(0),
        misc: 0,
    })
}

fn expect_width(cursor: &mut Cursor, context: &'static str) -> Result<u64, ParseError> {
    let token = cursor.expect_any(context)?;
    if token.kind != TokenKind::NumericLiteral {
        return Err(ParseError::UnexpectedOperandToken {
            position: token.position,
            lexeme: token.lexeme.clone(),
            expected: context,
        });
    }
    let width = parse_number(&token.lexeme);
    if matches!(width, 8 | 16 | 32 | 64) {
        Ok(width)
    } else {
        Err(ParseError::InvalidWidth {
            position: token.position,
            lexeme: token.lexeme.clone(),
        })
    }
}

fn parse_load(cursor: &mut Cursor) -> Result<Object, ParseError> {
    let width = expect_width(cursor, "load width (8, 16, 32, or 64)")?;
    let source = cursor.expect_reg_imm_tag("load source (register, immediate, or tag)")?;
    cursor.expect_keyword("to", "\"to\"")?;
    let dest = cursor.expect_register("destination register")?;
    Ok(Object::InstructionRecord {
        instruction: Instruction::Load,
        op1: dest,
        op2: Register::R0,
        op3: source,
        misc: width,
    })
}

fn parse_store(cursor: &mut Cursor) -> Result<Object, ParseError> {
    let width = expect_width(cursor, "store width (8, 16, 32, or 64)")?;
    let source = cursor.expect_register("source register")?;
    cursor.expect_keyword("in", "\"in\"")?;
    let dest = cursor.expect_reg_imm_tag("store destination (register, immediate, or tag)")?;
    Ok(Object::InstructionRecord {
        instruction: Instruction::Store,
        op1: source,
        op2: Register::R0,
        op3: dest,
        misc: width,
    })
}

fn parse_int(cursor: &mut Cursor) -> Result<Object, ParseError> {
    let token = cursor.expect_any("interrupt code (immediate)")?;
    if token.kind != TokenKind::NumericLiteral {
        return Err(ParseError::UnexpectedOperandToken {
            position: token.position,
            lexeme: token.lexeme.clone(),
            expected: "interrupt code (immediate)",
        });
    }
    let value = parse_number(&token.lexeme);
    check_immediate_44(value, token.position)?;
    Ok(Object::InstructionRecord {
        instruction: Instruction::Int,
        op1: Register::R0,
        op2: Register::R0,
        op3: Op3::Imm(value),
        misc: 0,
    })
}

/// `jmp target [if a (== | != | < | >) b [unsigned]]`. Without the `if`
/// clause this is an unconditional jump, lowered to `Je r0, r0, target`.
fn parse_jmp(cursor: &mut Cursor) -> Result<Object, ParseError> {
    let target = cursor.expect_reg_imm_tag("jump target (register, immediate, or tag)")?;

    let has_if = matches!(cursor.peek(), Some(t) if t.kind == TokenKind::OtherKeyword && t.lexeme == "if");
    if !has_if {
        return Ok(Object::InstructionRecord {
            instruction: Instruction::Je,
            op1: Register::R0,
            op2: Register::R0,
            op3: target,
            misc: 0,
        });
    }
    cursor.bump();

    let a = cursor.expect_register("first comparison register")?;
    let comparator = cursor.expect_any("comparator (==, !=, <, or >)")?;
    let mut instruction = match comparator.lexeme.as_str() {
        "==" if comparator.kind == TokenKind::OtherKeyword => Instruction::Je,
        "!=" if comparator.kind == TokenKind::OtherKeyword => Instruction::Jne,
        ">" if comparator.kind == TokenKind::OtherKeyword => Instruction::Jg,
        "<" if comparator.kind == TokenKind::OtherKeyword => Instruction::Jl,
        _ => {
            return Err(ParseError::UnexpectedOperandToken {
                position: comparator.position,
                lexeme: comparator.lexeme.clone(),
                expected: "comparator (==, !=, <, or >)",
            })
        }
    };
    let b = cursor.expect_register("second comparison register")?;

    if let Some(token) = cursor.peek() {
        if token.kind == TokenKind::OtherKeyword && token.lexeme == "unsigned" {
            let position = token.position;
            cursor.bump();
            instruction = match instruction {
                Instruction::Jg => Instruction::Jgu,
                Instruction::Jl => Instruction::Jlu,
                _ => return Err(ParseError::UnsignedOnEqualityComparator { position }),
            };
        }
    }

    Ok(Object::InstructionRecord {
        instruction,
        op1: a,
        op2: b,
        op3: target,
        misc: 0,
    })
}

fn dispatch_instruction(cursor: &mut Cursor, mnemonic: &str) -> Result<Object, ParseError> {
    if mnemonic == JMP_MNEMONIC {
        return parse_jmp(cursor);
    }
    let instruction = nanovm::instruction::INSTRUCTION_LITERALS
        .iter()
        .find(|(name, _)| *name == mnemonic)
        .map(|(_, instruction)| *instruction)
        .expect("lexer only classifies known mnemonics as InstructionKeyword");

    match instruction {
        Instruction::Load => parse_load(cursor),
        Instruction::Store => parse_store(cursor),
        Instruction::Int => parse_int(cursor),
        i if i.is_unary() => parse_reg_reg(cursor, i),
        i if i.is_logicarithmetic() => parse_reg_reg_regimm(cursor, i),
        _ => unreachable!("every non-jmp mnemonic is load, store, int, unary, or logicarithmetic"),
    }
}

/// Reads one `.addr`/`.iN`/`.string` value, then reports whether another
/// admissible literal immediately follows (the directive's "more" signal).
fn parse_directive_value(cursor: &mut Cursor, directive: Directive) -> Result<(Object, bool), ParseError> {
    let value = if directive == Directive::String {
        let token = cursor.expect_any("string literal")?;
        if token.kind != TokenKind::StringLiteral {
            return Err(ParseError::UnexpectedOperandToken {
                position: token.position,
                lexeme: token.lexeme.clone(),
                expected: "string literal",
            });
        }
        DirectiveValue::Str(token.lexeme.clone())
    } else {
        let token = cursor.expect_any("numeric literal")?;
        if token.kind != TokenKind::NumericLiteral {
            return Err(ParseError::UnexpectedOperandToken {
                position: token.position,
                lexeme: token.lexeme.clone(),
                expected: "numeric literal",
            });
        }
        let number = parse_number(&token.lexeme);
        let width = match directive {
            Directive::Addr => 32,
            Directive::I8 => 8,
            Directive::I16 => 16,
            Directive::I32 => 32,
            Directive::I64 => 64,
            Directive::String => unreachable!(),
        };
        check_directive_width(number, width, token.position)?;
        DirectiveValue::Number(number)
    };

    let more = match cursor.peek() {
        Some(t) if directive == Directive::String => t.kind == TokenKind::StringLiteral,
        Some(t) => t.kind == TokenKind::NumericLiteral,
        None => false,
    };

    Ok((Object::DirectivePayload(directive, value), more))
}

/// Parses the full token stream into an object sequence, or the complete
/// set of parse errors encountered.
pub fn parse(tokens: &[Token]) -> Result<Vec<Object>, Vec<ParseError>> {
    let mut cursor = Cursor::new(tokens);
    let mut objects = Vec::new();
    let mut errors = Vec::new();

    while let Some(token) = cursor.peek() {
        match token.kind {
            TokenKind::TagDefinition => {
                objects.push(Object::TagDefinition(token.lexeme.clone()));
                cursor.bump();
            }
            TokenKind::InstructionKeyword => {
                let mnemonic = token.lexeme.clone();
                cursor.bump();
                match dispatch_instruction(&mut cursor, &mnemonic) {
                    Ok(object) => objects.push(object),
                    Err(err) => errors.push(err),
                }
            }
            TokenKind::AssemblerDirective => {
                let directive = Directive::from_literal(&token.lexeme)
                    .expect("lexer only emits known directive literals");
                cursor.bump();
                loop {
                    match parse_directive_value(&mut cursor, directive) {
                        Ok((object, more)) => {
                            objects.push(object);
                            if !more {
                                break;
                            }
                        }
                        Err(err) => {
                            errors.push(err);
                            break;
                        }
                    }
                }
            }
            TokenKind::Tag
            | TokenKind::NumericLiteral
            | TokenKind::StringLiteral
            | TokenKind::RegisterKeyword
            | TokenKind::OtherKeyword => {
                errors.push(ParseError::UnexpectedTopLevelToken {
                    position: token.position,
                    lexeme: token.lexeme.clone(),
                });
                cursor.bump();
            }
        }
    }

    tracing::debug!(object_count = objects.len(), error_count = errors.len(), "parse complete");

    if errors.is_empty() {
        Ok(objects)
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::tokenize;

    fn parse_ok(source: &str) -> Vec<Object> {
        parse(&tokenize(source).unwrap()).unwrap()
    }

    #[test]
    fn register_add() {
        let objects = parse_ok("start: add r1, r2, r3");
        assert_eq!(objects[0], Object::TagDefinition("start".to_string()));
        assert_eq!(
            objects[1],
            Object::InstructionRecord {
                instruction: Instruction::Add,
                op1: Register::R1,
                op2: Register::R2,
                op3: Op3::Reg(Register::R3),
                misc: 0,
            }
        );
    }

    #[test]
    fn immediate_overflow_is_rejected() {
        let tokens = tokenize("add r1, r2, 0xFFFFFFFFFFFFF").unwrap();
        let errors = parse(&tokens).unwrap_err();
        assert!(matches!(errors[0], ParseError::ImmediateOverflow { .. }));
    }

    #[test]
    fn unconditional_jmp_lowers_to_je_r0_r0() {
        let objects = parse_ok("jmp end");
        assert_eq!(
            objects[0],
            Object::InstructionRecord {
                instruction: Instruction::Je,
                op1: Register::R0,
                op2: Register::R0,
                op3: Op3::Tag("end".to_string()),
                misc: 0,
            }
        );
    }

    #[test]
    fn conditional_jmp_with_unsigned_promotes_comparator() {
        let objects = parse_ok("jmp end if r1 > r2 unsigned");
        assert_eq!(
            objects[0],
            Object::InstructionRecord {
                instruction: Instruction::Jgu,
                op1: Register::R1,
                op2: Register::R2,
                op3: Op3::Tag("end".to_string()),
                misc: 0,
            }
        );
    }

    #[test]
    fn unsigned_on_equality_comparator_is_rejected() {
        let tokens = tokenize("jmp end if r1 == r2 unsigned").unwrap();
        let errors = parse(&tokens).unwrap_err();
        assert!(matches!(errors[0], ParseError::UnsignedOnEqualityComparator { .. }));
    }

    #[test]
    fn multi_value_directive_emits_one_payload_per_value() {
        let objects = parse_ok(".i32 1 2 3");
        assert_eq!(objects.len(), 3);
    }

    #[test]
    fn load_and_store_round_trip_operand_shapes() {
        let objects = parse_ok("load 64 r1 to r2\nstore 64 r2 in r1");
        assert_eq!(
            objects[0],
            Object::InstructionRecord {
                instruction: Instruction::Load,
                op1: Register::R2,
                op2: Register::R0,
                op3: Op3::Reg(Register::R1),
                misc: 64,
            }
        );
        assert_eq!(
            objects[1],
            Object::InstructionRecord {
                instruction: Instruction::Store,
                op1: Register::R2,
                op2: Register::R0,
                op3: Op3::Reg(Register::R1),
                misc: 64,
            }
        );
    }
}
