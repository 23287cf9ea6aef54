//! Cross-crate assemble -> link -> run round trips (spec §8, scenarios S1
//! and S3). Exercises the full pipeline through the same boundary
//! functions an external driver would call (`cryo_asm::assemble`,
//! `cryo_link::link`, `cryo_vm::run`), not just each crate's own unit
//! tests.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

fn tempdir() -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut dir = std::env::temp_dir();
    dir.push(format!("cryo-vm-e2e-{}-{n}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Spec §8 S1 — "hello world": assemble one `.crya` defining `$main`,
/// link it alone, and run the resulting executable to completion.
#[test]
fn hello_world_assembles_links_and_runs() {
    let dir = tempdir();
    let source_path = dir.join("main.crya");
    fs::write(
        &source_path,
        r#"
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

    let exe_path = dir.join("main.crye");
    let link_errors = cryo_link::link(&[&object_path], &exe_path);
    assert!(!link_errors.has_errors(), "link failed: {link_errors}");

    let exit_code = cryo_vm::run(&exe_path, &[]);
    assert_eq!(exit_code, 0);

    fs::remove_dir_all(&dir).ok();
}

/// Spec §8 S3 — "linker string-table union": two objects, each defining
/// one function whose body references the literal `"X"`. After linking,
/// the executable's string table contains `"X"` exactly once, and both
/// functions' `SETSTR` operands point at the same index. Also verifies
/// each linked function still runs to completion (no corrupted operand
/// survives relocation).
#[test]
fn two_objects_sharing_a_string_literal_unify_and_run() {
    let dir = tempdir();

    let a_path = dir.join("a.crya");
    fs::write(
        &a_path,
        r#"
        fn $a @void -> @void {
          STLS;
          PUSH @void* $msg;
          SETSTR $msg "X";
          IMPL $void::println_str::void*;
          STLE;
          RETURN;
        }
        "#,
    )
    .unwrap();

    let b_path = dir.join("b.crya");
    fs::write(
        &b_path,
        r#"
        fn $main @void -> @void {
          STLS;
          PUSH @void* $msg;
          SETSTR $msg "X";
          IMPL $void::println_str::void*;
          STLE;
          CALL $void::a::void;
          RETURN;
        }
        "#,
    )
    .unwrap();

    let (a_obj, a_errors) = cryo_asm::assemble(&a_path);
    assert!(!a_errors.has_errors(), "a.crya failed: {a_errors}");
    let (b_obj, b_errors) = cryo_asm::assemble(&b_path);
    assert!(!b_errors.has_errors(), "b.crya failed: {b_errors}");

    let exe_path = dir.join("out.crye");
    let link_errors = cryo_link::link(&[&a_obj, &b_obj], &exe_path);
    assert!(!link_errors.has_errors(), "link failed: {link_errors}");

    let bytes = fs::read(&exe_path).unwrap();
    let executable = cryo_core::objfile::read(&bytes, cryo_core::wire::EXECUTABLE_HEADER).unwrap();
    let x_count = executable.strings.iter().filter(|s| s.as_str() == "X").count();
    assert_eq!(x_count, 1, "'X' must appear exactly once in the unified string table");

    let exit_code = cryo_vm::run(&exe_path, &[]);
    assert_eq!(exit_code, 0);

    fs::remove_dir_all(&dir).ok();
}
