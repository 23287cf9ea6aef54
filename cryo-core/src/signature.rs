//! Canonical function signature string (spec §3):
//! `"$<return-type>::<name>::<param-type-1>::…::<param-type-N>"`, types
//! without their sigil. Built incrementally as each piece is validated,
//! so a malformed declaration fails before any string work happens.

/// Strips a leading `@` (Type) or `$` (Id) sigil, if present.
pub fn strip_sigil(text: &str) -> &str {
    text.strip_prefix('@').or_else(|| text.strip_prefix('$')).unwrap_or(text)
}

/// `name` carries its `$` sigil, `return_type`/`param_types` their `@`
/// sigil, matching the raw token text. Parameters of size 0 (`@void`) are
/// still written into the signature text (spec §4.2: "Parameter sizes of
/// zero … are allowed in the signature but not appended to
/// `parameter_sizes`") — callers filter `parameter_sizes` separately.
pub fn canonical_signature(name: &str, return_type: &str, param_types: &[&str]) -> String {
    let mut sig = format!("${}::{}", strip_sigil(return_type), strip_sigil(name));
    for param in param_types {
        sig.push_str("::");
        sig.push_str(strip_sigil(param));
    }
    sig
}

/// Splits a canonical signature back into its return-type name (sigil
/// stripped) and its ordered parameter-type names. Used by the VM to
/// recover an intrinsic's call shape from its signature string alone, since
/// intrinsics have no `FunctionRecord` to carry `parameter_sizes`/
/// `return_size` the way a bytecode-defined function does.
pub fn parse(signature: &str) -> Option<(&str, &str, Vec<&str>)> {
    let mut parts = signature.split("::");
    let return_type = parts.next()?.strip_prefix('$')?;
    let name = parts.next()?;
    Some((return_type, name, parts.collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_return_no_params() {
        assert_eq!(canonical_signature("$main", "@void", &[]), "$void::main");
    }

    #[test]
    fn with_parameters() {
        let sig = canonical_signature("$add", "@uint32", &["@uint32", "@uint32"]);
        assert_eq!(sig, "$uint32::add::uint32::uint32");
    }

    #[test]
    fn intrinsic_signature_shape() {
        assert_eq!(strip_sigil("@void*"), "void*");
    }

    #[test]
    fn parse_splits_return_name_and_parameters() {
        let (ret, name, params) = parse("$void::println_str::void*").unwrap();
        assert_eq!(ret, "void");
        assert_eq!(name, "println_str");
        assert_eq!(params, vec!["void*"]);
    }

    #[test]
    fn parse_handles_zero_parameters() {
        let (ret, name, params) = parse("$void::main").unwrap();
        assert_eq!(ret, "void");
        assert_eq!(name, "main");
        assert!(params.is_empty());
    }
}
