//! Two-pass translation from objects to bytes: layout, then tag patching.

use std::collections::HashMap;

use nanovm::directive::Directive;
use nanovm::instruction::make_instruction;

use crate::error::EncodeError;
use crate::object::{DirectiveValue, Object, Op3};

/// The raw bytecode for an assembled program, prior to being wrapped in the
/// container (spec.md §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledProgram {
    pub payload: Vec<u8>,
    pub base_addr: u64,
    pub entry_point: u64,
}

enum Unit {
    RawByte(u8),
    /// `encoded` already has the wide/short shift from `make_instruction`
    /// applied. `tag`, while still `Some`, marks the low 12 bits as
    /// unresolved; pass 2 clears it once patched.
    Word {
        encoded: u64,
        wide: bool,
        tag: Option<String>,
    },
}

/// Lays out `objects`, resolves tag references, and emits the final byte
/// sequence, or the full set of encode-phase errors.
pub fn encode(objects: &[Object]) -> Result<AssembledProgram, Vec<EncodeError>> {
    let mut errors = Vec::new();
    let mut tag_map: HashMap<String, u64> = HashMap::new();
    let mut units: Vec<Unit> = Vec::new();

    let mut base_addr: u64 = 0;
    let mut current_addr: u64 = 0;

    // Pass 1 — layout.
    for object in objects {
        match object {
            Object::TagDefinition(name) => {
                if tag_map.insert(name.clone(), current_addr).is_some() {
                    errors.push(EncodeError::DuplicateTag { tag: name.clone() });
                }
            }
            Object::DirectivePayload(Directive::Addr, DirectiveValue::Number(value)) => {
                base_addr = *value;
                current_addr = *value;
            }
            Object::DirectivePayload(directive, DirectiveValue::Number(value)) => {
                let width = directive.value_width().expect("numeric directive has a fixed width") as usize;
                units.extend(value.to_le_bytes()[..width].iter().copied().map(Unit::RawByte));
                current_addr += width as u64;
            }
            Object::DirectivePayload(Directive::String, DirectiveValue::Str(s)) => {
                units.extend(s.as_bytes().iter().copied().map(Unit::RawByte));
                current_addr += s.len() as u64;
            }
            Object::DirectivePayload(..) => unreachable!("parser pairs each directive with its own value kind"),
            Object::InstructionRecord {
                instruction,
                op1,
                op2,
                op3,
                misc: _,
            } => {
                let (wide, use_imm, imm, op3_id, tag) = match op3 {
                    Op3::Reg(r) => (false, false, 0u64, r.id(), None),
                    Op3::Imm(v) => (*v >= 4096, true, *v, 0u8, None),
                    Op3::Tag(name) => (false, true, 0u64, 0u8, Some(name.clone())),
                };
                let encoded = make_instruction(wide, use_imm, *instruction, op1.id(), op2.id(), op3_id, imm);
                units.push(Unit::Word { encoded, wide, tag });
                current_addr += if wide { 8 } else { 4 };
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    tracing::debug!(unit_count = units.len(), base_addr, "pass 1 layout complete");

    // Pass 2 — tag patching.
    current_addr = base_addr;
    for unit in units.iter_mut() {
        match unit {
            Unit::RawByte(_) => current_addr += 1,
            Unit::Word { encoded, wide, tag } => {
                if let Some(name) = tag.take() {
                    match tag_map.get(&name) {
                        Some(&target) => {
                            let offset_words = (target as i64 - current_addr as i64) / 4;
                            if (-2048..=2047).contains(&offset_words) {
                                // Masking a two's-complement i64 to its low
                                // 12 bits already yields the correctly
                                // sign-extended 12-bit field for any value
                                // in range; no separate sign-bit copy step
                                // is needed.
                                *encoded |= (offset_words as u64) & 0xFFF;
                            } else {
                                errors.push(EncodeError::TagOutOfRange {
                                    tag: name,
                                    offset_words,
                                });
                            }
                        }
                        None => errors.push(EncodeError::UndefinedTag { tag: name }),
                    }
                }
                current_addr += if *wide { 8 } else { 4 };
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    tracing::debug!("pass 2 patch complete");

    // Emission.
    let mut payload = Vec::with_capacity(units.len() * 4);
    for unit in &units {
        match unit {
            Unit::RawByte(b) => payload.push(*b),
            Unit::Word { encoded, wide, .. } => {
                if *wide {
                    payload.extend_from_slice(&encoded.to_le_bytes());
                } else {
                    payload.extend_from_slice(&(*encoded as u32).to_le_bytes());
                }
            }
        }
    }

    match tag_map.get("start") {
        Some(&entry_point) => Ok(AssembledProgram {
            payload,
            base_addr,
            entry_point,
        }),
        None => Err(vec![EncodeError::MissingStart]),
    }
}
