//! Cross-module integration: `cryo_asm::assemble` writes a real `.cryi`
//! file to disk; this test reads it back through `cryo_core::objfile`
//! (the same codec the linker uses) and checks the round trip end to end,
//! rather than only exercising `assembler::assemble_tokens` in memory as
//! the unit tests do.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

fn tempdir() -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut dir = std::env::temp_dir();
    dir.push(format!("cryo-asm-e2e-{}-{n}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn assembling_a_source_file_produces_a_readable_object() {
    let dir = tempdir();
    let source_path = dir.join("main.crya");
    fs::write(
        &source_path,
        r#"
        fn $add @uint32 -> @uint32 {
          STLS;
          SETU32 $param_0 1u32;
          STLE;
          RETURN;
        }

        fn $main @void -> @void {
          STLS;
          PUSH @void* $msg;
          SETSTR $msg "Hello, world!";
          IMPL $void::println_str::void*;
          STLE;
          RETURN;
        }
        "#,
    )
    .unwrap();

    let (object_path, errors) = cryo_asm::assemble(&source_path);
    assert!(!errors.has_errors(), "assembly failed: {errors}");
    assert!(object_path.exists());

    let bytes = fs::read(&object_path).unwrap();
    let object = cryo_core::objfile::read(&bytes, cryo_core::wire::OBJECT_HEADER).unwrap();

    assert_eq!(object.functions.len(), 2);
    assert!(object.strings.contains(&"Hello, world!".to_string()));

    let add = object.functions.iter().find(|f| f.signature.starts_with("$uint32::add")).unwrap();
    assert_eq!(add.parameter_sizes, vec![4]);
    assert_eq!(add.return_size, 4);

    let main = object.functions.iter().find(|f| f.signature == "$void::main::void").unwrap();
    assert_eq!(main.return_size, 0);
    assert!(main.parameter_sizes.is_empty());

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn assembling_source_with_a_lexical_error_emits_diagnostics_and_writes_no_object() {
    let dir = tempdir();
    let source_path = dir.join("bad.crya");
    fs::write(&source_path, "fn $main @void -> @void { SETSTR $s \"unterminated }").unwrap();

    let (object_path, errors) = cryo_asm::assemble(&source_path);
    assert!(errors.has_errors());
    assert!(!object_path.exists());

    fs::remove_dir_all(&dir).ok();
}
