//! Cross-crate coverage for the linker: assembles real `.crya` sources via
//! `cryo_asm::assemble` rather than hand-building `ObjectFile`s in memory,
//! then exercises `cryo_link::link`'s duplicate-signature detection and
//! string-table unification against the genuine `.cryi` objects that
//! produces (spec §4.3, §8 S3/S4).

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};

fn tempdir() -> PathBuf {
    static COUNTER: AtomicU32 = AtomicU32::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut dir = std::env::temp_dir();
    dir.push(format!("cryo-link-e2e-{}-{n}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn linking_two_assembled_objects_unifies_their_string_tables() {
    let dir = tempdir();

    let a_path = dir.join("a.crya");
    fs::write(
        &a_path,
        r#"
        fn $a @void -> @void {
          STLS;
          PUSH @void* $msg;
          SETSTR $msg "shared";
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
        fn $b @void -> @void {
          STLS;
          PUSH @void* $msg;
          SETSTR $msg "shared";
          IMPL $void::println_str::void*;
          STLE;
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
    assert_eq!(executable.functions.len(), 2);
    let shared_count = executable.strings.iter().filter(|s| s.as_str() == "shared").count();
    assert_eq!(shared_count, 1, "'shared' must be unified into a single string-table entry");

    fs::remove_dir_all(&dir).ok();
}

#[test]
fn linking_objects_with_a_duplicate_signature_is_rejected() {
    let dir = tempdir();

    let a_path = dir.join("a.crya");
    fs::write(
        &a_path,
        r#"
        fn $dup @void -> @void {
          STLS;
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
        fn $dup @void -> @void {
          STLS;
          STLE;
          RETURN;
        }
        "#,
    )
    .unwrap();

    let (a_obj, a_errors) = cryo_asm::assemble(&a_path);
    assert!(!a_errors.has_errors(), "a.crya failed: {a_errors}");
    let (b_obj, b_errors) = cryo_asm::assemble(&b_path);
    assert!(!b_errors.has_errors(), "b.crya failed: {b_errors}");

    let exe_path = dir.join("dup.crye");
    let link_errors = cryo_link::link(&[&a_obj, &b_obj], &exe_path);
    assert!(link_errors.has_errors(), "linking two definitions of $dup must fail");
    assert!(!exe_path.exists(), "no executable should be written on link failure");

    fs::remove_dir_all(&dir).ok();
}
