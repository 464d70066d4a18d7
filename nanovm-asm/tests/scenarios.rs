//! End-to-end scenarios from spec.md §8.

#[test]
fn minimal_program() {
    let program = nanovm_asm::assemble("start: int 0xFF").unwrap();
    assert_eq!(program.base_addr, 0);
    assert_eq!(program.entry_point, 0);
    assert_eq!(program.payload.len(), 4);
    let word = u32::from_le_bytes(program.payload[..4].try_into().unwrap());
    assert_eq!(word >> 31, 0, "wide bit clear");
    assert_eq!((word >> 30) & 1, 0, "use_imm set means !use_imm bit clear");
    assert_eq!((word >> 24) & 0x3F, 14, "Int opcode");
    assert_eq!(word & 0xFF, 0xFF);
}

#[test]
fn register_add() {
    let program = nanovm_asm::assemble("start: add r1, r2, r3").unwrap();
    assert_eq!(program.payload.len(), 4);
    let word = u32::from_le_bytes(program.payload[..4].try_into().unwrap());
    assert_eq!(word >> 31, 0);
    assert_eq!((word >> 30) & 1, 1, "register operand means !use_imm bit set");
    assert_eq!((word >> 24) & 0x3F, 0, "Add opcode");
    assert_eq!((word >> 20) & 0xF, 1);
    assert_eq!((word >> 16) & 0xF, 2);
    assert_eq!((word >> 12) & 0xF, 3);
    assert_eq!(word & 0xFFF, 0);
}

#[test]
fn wide_immediate() {
    let program = nanovm_asm::assemble("start: add r1, r2, 5000").unwrap();
    assert_eq!(program.payload.len(), 8);
    let word = u64::from_le_bytes(program.payload[..8].try_into().unwrap());
    assert_eq!(word >> 63, 1);
    assert_eq!(word & 0xFFF_FFFF_FFFF, 5000);
}

#[test]
fn short_immediate() {
    let program = nanovm_asm::assemble("start: add r1, r2, 10").unwrap();
    assert_eq!(program.payload.len(), 4);
    let word = u32::from_le_bytes(program.payload[..4].try_into().unwrap());
    assert_eq!(word >> 31, 0);
    assert_eq!(word & 0xFFF, 10);
}

#[test]
fn forward_jump() {
    let source = "start: jmp end\n       add r0, r0, r0\nend:   int 0xFF";
    let program = nanovm_asm::assemble(source).unwrap();
    assert_eq!(program.entry_point, 0);
    let word = u32::from_le_bytes(program.payload[0..4].try_into().unwrap());
    assert_eq!(word & 0xFFF, 2, "offset in words from start to end");
}

#[test]
fn out_of_range_jump_is_an_encode_error() {
    let mut source = String::from("start: jmp end\n");
    for _ in 0..3000 {
        source.push_str("add r0, r0, r0\n");
    }
    source.push_str("end: int 0\n");
    let err = nanovm_asm::assemble(&source).unwrap_err();
    match err {
        nanovm_asm::Error::Encode(errors) => {
            assert!(errors
                .iter()
                .any(|e| matches!(e, nanovm_asm::error::EncodeError::TagOutOfRange { .. })));
        }
        other => panic!("expected an encode error, got {other:?}"),
    }
}

#[test]
fn only_register_operations_stay_four_bytes() {
    let program = nanovm_asm::assemble(
        "start: add r1, r2, r3\n       sub r1, r2, r3\n       xor r1, r2, r3\n       int 0",
    )
    .unwrap();
    // Three register-only arithmetic instructions plus a short `int 0`.
    assert_eq!(program.payload.len(), 16);
}

#[test]
fn addr_idempotence_second_directive_wins() {
    let program = nanovm_asm::assemble(".addr 0x100\n.addr 0x200\nstart: int 0").unwrap();
    assert_eq!(program.base_addr, 0x200);
    assert_eq!(program.entry_point, 0x200);
}

#[test]
fn missing_start_tag_is_an_error() {
    let err = nanovm_asm::assemble("loop: int 0").unwrap_err();
    assert!(matches!(err, nanovm_asm::Error::Encode(_)));
}

#[test]
fn unknown_mnemonic_reported_as_unexpected_top_level_token() {
    // `frobnicate` is not an instruction mnemonic, register, or reserved
    // keyword, so it lexes as a bare `Tag` and is rejected at parse time.
    let err = nanovm_asm::assemble("start: frobnicate r1").unwrap_err();
    assert!(matches!(err, nanovm_asm::Error::Parse(_)));
}

#[test]
fn data_directives_and_string_literal() {
    let program = nanovm_asm::assemble("start: int 0\n.i8 1 2\n.string \"hi\"").unwrap();
    // One short instruction word (4 bytes) + two i8 bytes + "hi" (2 bytes).
    assert_eq!(program.payload.len(), 4 + 2 + 2);
    assert_eq!(&program.payload[4..6], &[1, 2]);
    assert_eq!(&program.payload[6..8], b"hi");
}
