//! Three-pass assembler (spec §4.2): string harvest, function validation,
//! body assembly, split into three named functions that hand off an
//! explicit intermediate value each rather than one pass-by-index loop.

use fxhash::FxHashMap;

use cryo_core::error::codes;
use cryo_core::ir::{FunctionRecord, Instruction, ObjectFile, Operand};
use cryo_core::opcode::{self, Opcode};
use cryo_core::{Diagnostic, ErrorQueue, Severity, SourceFile, Token, TokenKind, TypeTable};

use crate::varstack::{CloseLayerError, PopError, PushError, VariableStack};

/// Insertion-ordered string set — described as "a set" but also required to
/// keep "string-table order … consistent with the indices embedded in the
/// code section" (spec §3), so first-seen order is what every later index
/// refers back to.
#[derive(Default)]
struct Interner {
    order: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl Interner {
    fn intern(&mut self, text: &str) -> u32 {
        if let Some(i) = self.index.get(text) {
            return *i;
        }
        let i = self.order.len() as u32;
        self.order.push(text.to_string());
        self.index.insert(text.to_string(), i);
        i
    }

    fn get(&self, text: &str) -> Option<u32> {
        self.index.get(text).copied()
    }

    fn into_vec(self) -> Vec<String> {
        self.order
    }
}

struct PendingFunction<'src> {
    name: Token<'src>,
    param_types: Vec<Token<'src>>,
    return_type: Token<'src>,
    body: Vec<Token<'src>>,
}

/// Assembles a token stream into an [`ObjectFile`]. Errors of severity
/// `error` or higher mean the returned object must not be written to disk
/// (spec §7: "a non-empty error-or-higher queue fails the build").
pub fn assemble_tokens(
    tokens: &[Token<'_>],
    source: &SourceFile,
    type_table: &TypeTable,
) -> (ObjectFile, ErrorQueue) {
    let mut errors = ErrorQueue::new();
    let mut interner = Interner::default();

    // Pass A — string-literal harvest: every `Id` not preceded by a
    // `FunctionDecl`, plus every `StringLiteral`.
    for (i, tok) in tokens.iter().enumerate() {
        let preceded_by_fn_decl = i > 0 && tokens[i - 1].kind == TokenKind::FunctionDecl;
        match tok.kind {
            TokenKind::Id if !preceded_by_fn_decl => {
                interner.intern(tok.text);
            }
            TokenKind::StringLiteral => {
                interner.intern(tok.text);
            }
            _ => {}
        }
    }

    // Pass B — function validation.
    let pending = parse_functions(tokens, source, &mut errors);

    let mut functions = Vec::with_capacity(pending.len());
    for function in &pending {
        let Some(record) = validate_function(function, source, type_table, &mut interner, &mut errors) else {
            continue;
        };
        functions.push(record);
    }

    // Pass C — body assembly, now that every function's signature (and thus
    // every `CALL`/`IMPL` target string) is interned.
    for (function, record) in pending.iter().zip(functions.iter_mut()) {
        assemble_body(function, source, type_table, &mut interner, record, &mut errors);
    }

    (ObjectFile { strings: interner.into_vec(), functions }, errors)
}

fn push(errors: &mut ErrorQueue, source: &SourceFile, code: &'static str, severity: Severity, message: impl Into<String>, token: Token<'_>) {
    let (line, line_text) = source.locate(token.text);
    errors.push(Diagnostic::new(code, severity, message, source, line, line_text, token.text));
}

fn parse_functions<'src>(tokens: &[Token<'src>], source: &SourceFile, errors: &mut ErrorQueue) -> Vec<PendingFunction<'src>> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i].kind != TokenKind::FunctionDecl {
            push(errors, source, codes::INVALID_FUNCTION_DEFINITION, Severity::Error, "expected a function declaration ('fn')", tokens[i]);
            i += 1;
            continue;
        }
        match parse_one_function(tokens, &mut i, source, errors) {
            Some(function) => out.push(function),
            None => {
                // Recovery already advanced `i` past the point of failure.
            }
        }
    }
    out
}

fn parse_one_function<'src>(tokens: &[Token<'src>], i: &mut usize, source: &SourceFile, errors: &mut ErrorQueue) -> Option<PendingFunction<'src>> {
    let fn_token = tokens[*i];
    *i += 1;

    let Some(&name) = tokens.get(*i) else {
        push(errors, source, codes::UNEXPECTED_END, Severity::Error, "source ends before the function's name", fn_token);
        return None;
    };
    if name.kind != TokenKind::Id {
        push(errors, source, codes::FUNCTION_DEFINITION_MISSING_IDENTIFIER, Severity::Error, "expected an identifier after 'fn'", name);
        return None;
    }
    *i += 1;

    let mut param_types = Vec::new();
    while let Some(&t) = tokens.get(*i) {
        if t.kind != TokenKind::Type {
            break;
        }
        param_types.push(t);
        *i += 1;
    }

    let Some(&arrow) = tokens.get(*i) else {
        push(errors, source, codes::UNEXPECTED_END, Severity::Error, "source ends before '->'", name);
        return None;
    };
    if arrow.kind != TokenKind::ReturnTypeDecl {
        push(errors, source, codes::FUNCTION_DEFINITION_MISSING_RETURN_DECLARATION, Severity::Error, "expected '->' before the return type", arrow);
        return None;
    }
    *i += 1;

    let Some(&return_type) = tokens.get(*i) else {
        push(errors, source, codes::UNEXPECTED_END, Severity::Error, "source ends before the return type", arrow);
        return None;
    };
    if return_type.kind != TokenKind::Type {
        push(errors, source, codes::FUNCTION_DEFINITION_MISSING_RETURN_TYPE, Severity::Error, "expected a return type after '->'", return_type);
        return None;
    }
    *i += 1;

    let Some(&start_body) = tokens.get(*i) else {
        push(errors, source, codes::UNEXPECTED_END, Severity::Error, "source ends before the function body", return_type);
        return None;
    };
    if start_body.kind != TokenKind::StartBody {
        push(errors, source, codes::FUNCTION_DEFINITION_MISSING_BODY, Severity::Error, "expected '{' to start the function body", start_body);
        return None;
    }
    *i += 1;

    let body_start = *i;
    let mut depth = 1usize;
    while depth > 0 {
        let Some(&t) = tokens.get(*i) else {
            push(errors, source, codes::FUNCTION_DEFINITION_MISSING_BODY, Severity::Error, "function body is missing a closing '}'", start_body);
            return None;
        };
        match t.kind {
            TokenKind::StartBody => depth += 1,
            TokenKind::EndBody => depth -= 1,
            TokenKind::FunctionDecl if depth == 1 => {
                push(errors, source, codes::INVALID_FUNCTION_DEFINITION, Severity::Error, "nested function definitions are not allowed", t);
            }
            _ => {}
        }
        *i += 1;
    }
    let body = tokens[body_start..*i - 1].to_vec();

    Some(PendingFunction { name, param_types, return_type, body })
}

fn validate_function(
    function: &PendingFunction<'_>,
    source: &SourceFile,
    type_table: &TypeTable,
    interner: &mut Interner,
    errors: &mut ErrorQueue,
) -> Option<FunctionRecord> {
    let return_size = match type_table.size_of(function.return_type.text) {
        Some(size) => size,
        None => {
            push(errors, source, codes::UNKNOWN_TYPE, Severity::Error, format!("unknown type '{}'", function.return_type.text), function.return_type);
            0
        }
    };

    let mut param_type_texts = Vec::with_capacity(function.param_types.len());
    let mut parameter_sizes = Vec::new();
    for param in &function.param_types {
        param_type_texts.push(param.text);
        match type_table.size_of(param.text) {
            Some(0) => {} // @void: kept in the signature, omitted from parameter_sizes
            Some(size) => parameter_sizes.push(size),
            None => push(errors, source, codes::UNKNOWN_TYPE, Severity::Error, format!("unknown type '{}'", param.text), *param),
        }
    }

    let signature = cryo_core::signature::canonical_signature(function.name.text, function.return_type.text, &param_type_texts);
    interner.intern(&signature);

    Some(FunctionRecord { signature, parameter_sizes, return_size, instructions: Vec::new() })
}

fn assemble_body(
    function: &PendingFunction<'_>,
    source: &SourceFile,
    type_table: &TypeTable,
    interner: &mut Interner,
    record: &mut FunctionRecord,
    errors: &mut ErrorQueue,
) {
    let mut vars = VariableStack::new();
    if record.return_size != 0 {
        let _ = vars.push_variable("$return", record.return_size);
    }
    for (i, size) in record.parameter_sizes.iter().enumerate() {
        let _ = vars.push_variable(&format!("$param_{i}"), *size);
    }

    let body = &function.body;
    let mut j = 0;
    while j < body.len() {
        let instr_token = body[j];
        if instr_token.kind != TokenKind::Instruction {
            push(errors, source, codes::INVALID_TOKEN_IN_FUNCTION_BODY, Severity::Error, "expected an instruction", instr_token);
            j += 1;
            continue;
        }
        j += 1;

        let operand_start = j;
        while j < body.len() && !matches!(body[j].kind, TokenKind::EndCommand | TokenKind::Instruction) {
            j += 1;
        }
        let operands = &body[operand_start..j];
        let terminated = j < body.len() && body[j].kind == TokenKind::EndCommand;
        if terminated {
            j += 1;
        } else {
            let anchor = operands.last().copied().unwrap_or(instr_token);
            push(errors, source, codes::MISSING_SEMICOLON, Severity::Error, "expected ';' to terminate the instruction", anchor);
        }

        let shape: Vec<TokenKind> = operands.iter().map(|t| t.kind).collect();
        let Some(def) = opcode::lookup_by_shape(instr_token.text, &shape) else {
            push(errors, source, codes::UNEXPECTED_TOKEN_IN_INSTRUCTION_PARAMETERS, Severity::Error, format!("'{}' does not accept these operands", instr_token.text), instr_token);
            continue;
        };

        if let Some(instruction) = build_instruction(def.opcode, instr_token, operands, source, type_table, interner, &mut vars, errors) {
            record.instructions.push(instruction);
        }
    }
}

fn build_instruction(
    opcode: Opcode,
    instr_token: Token<'_>,
    operands: &[Token<'_>],
    source: &SourceFile,
    type_table: &TypeTable,
    interner: &mut Interner,
    vars: &mut VariableStack,
    errors: &mut ErrorQueue,
) -> Option<Instruction> {
    match opcode {
        Opcode::Stls => {
            vars.start_stack_layer();
            Some(Instruction { opcode, operands: vec![] })
        }
        Opcode::Stle => match vars.end_stack_layer() {
            Ok(()) => Some(Instruction { opcode, operands: vec![] }),
            Err(CloseLayerError::NoOpenLayer) => {
                push(errors, source, codes::NO_STACK_LAYERS_TO_BE_CLOSED, Severity::Error, "STLE with no open STLS layer", instr_token);
                None
            }
        },
        Opcode::Push => {
            let (ty, id) = (operands[0], operands[1]);
            let size = match type_table.size_of(ty.text) {
                Some(size) => size,
                None => {
                    push(errors, source, codes::UNKNOWN_TYPE, Severity::Error, format!("unknown type '{}'", ty.text), ty);
                    return None;
                }
            };
            match vars.push_variable(id.text, size) {
                Ok(_offset) => Some(Instruction { opcode, operands: vec![Operand::Word(size)] }),
                Err(PushError::NameAlreadyInUse) => {
                    push(errors, source, codes::VARIABLE_NAME_ALREADY_IN_USE, Severity::Error, format!("'{}' is already in use", id.text), id);
                    None
                }
            }
        }
        Opcode::Pop => {
            let count = parse_u32_operand(operands[0], source, errors)?;
            match vars.pop_variable(count) {
                Ok(()) => Some(Instruction { opcode, operands: vec![Operand::Word(count)] }),
                Err(PopError::NotEnoughVariables) => {
                    push(errors, source, codes::STACK_DOES_NOT_CONTAIN_VARIABLES_TO_POP, Severity::Error, format!("cannot pop {count} variables: fewer are live"), operands[0]);
                    None
                }
            }
        }
        Opcode::SetU32 => {
            let (id, value) = (operands[0], operands[1]);
            let value = parse_u32_operand(value, source, errors)?;
            match vars.get_variable(id.text) {
                Some(entry) => {
                    let offset = entry.offset;
                    Some(Instruction { opcode, operands: vec![Operand::VariableSlot(offset), Operand::Word(value)] })
                }
                None => {
                    push(errors, source, codes::VARIABLE_DOES_NOT_EXIST, Severity::Error, format!("'{}' is not a live variable", id.text), id);
                    None
                }
            }
        }
        Opcode::SetStr => {
            let (id, literal) = (operands[0], operands[1]);
            let offset = match vars.get_variable(id.text) {
                Some(entry) => entry.offset,
                None => {
                    push(errors, source, codes::VARIABLE_DOES_NOT_EXIST, Severity::Error, format!("'{}' is not a live variable", id.text), id);
                    return None;
                }
            };
            let string_index = interner.intern(literal.text);
            Some(Instruction { opcode, operands: vec![Operand::VariableSlot(offset), Operand::StringIndex(string_index)] })
        }
        Opcode::Return => Some(Instruction { opcode, operands: vec![] }),
        Opcode::CallSig | Opcode::Impl => {
            let target = operands[0];
            let string_index = interner.get(target.text).unwrap_or_else(|| interner.intern(target.text));
            Some(Instruction { opcode, operands: vec![Operand::StringIndex(string_index)] })
        }
    }
}

fn parse_u32_literal(text: &str) -> Option<u32> {
    text.strip_suffix("u32").and_then(|digits| digits.parse().ok())
}

/// Parses a `U32` token's digits and reports an out-of-range literal
/// (e.g. `99999999999u32`, which tokenizes fine but overflows `u32::MAX`)
/// as a diagnostic instead of silently coercing it to `0`.
fn parse_u32_operand(token: Token<'_>, source: &SourceFile, errors: &mut ErrorQueue) -> Option<u32> {
    match parse_u32_literal(token.text) {
        Some(value) => Some(value),
        None => {
            push(errors, source, codes::NUMERIC_LITERAL_OUT_OF_RANGE, Severity::Error, format!("'{}' does not fit in a u32", token.text), token);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn assemble(src: &str) -> (ObjectFile, ErrorQueue) {
        let source = SourceFile::in_memory("t.crya", src);
        let mut errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut errors);
        assert!(errors.is_empty(), "tokenizer errors: {errors}");
        let types = TypeTable::new();
        assemble_tokens(&tokens, &source, &types)
    }

    #[test]
    fn hello_world_assembles_without_errors() {
        let (object, errors) = assemble(
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
        );
        assert!(!errors.has_errors(), "unexpected errors: {errors}");
        assert_eq!(object.functions.len(), 1);
        let main = &object.functions[0];
        assert_eq!(main.signature, "$void::main::void");
        assert!(object.strings.contains(&"Hello, world!".to_string()));
        assert!(object.strings.contains(&"$void::println_str::void*".to_string()));
    }

    #[test]
    fn nested_function_is_rejected() {
        let source = SourceFile::in_memory("t.crya", "fn $a @void -> @void { fn $b @void -> @void { RETURN; } RETURN; }");
        let mut tok_errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut tok_errors);
        let (_, errors) = assemble_tokens(&tokens, &source, &TypeTable::new());
        assert!(errors.iter().any(|d| d.code == codes::INVALID_FUNCTION_DEFINITION));
    }

    #[test]
    fn pop_without_enough_live_variables_is_an_error() {
        let (_, errors) = assemble("fn $f @void -> @void { POP 1u32; RETURN; }");
        assert!(errors.iter().any(|d| d.code == codes::STACK_DOES_NOT_CONTAIN_VARIABLES_TO_POP));
    }

    #[test]
    fn setu32_on_unknown_variable_is_an_error() {
        let (_, errors) = assemble("fn $f @void -> @void { SETU32 $missing 1u32; RETURN; }");
        assert!(errors.iter().any(|d| d.code == codes::VARIABLE_DOES_NOT_EXIST));
    }

    #[test]
    fn out_of_range_pop_count_is_reported_not_coerced_to_zero() {
        let (_, errors) = assemble("fn $f @void -> @void { POP 99999999999u32; RETURN; }");
        assert!(errors.iter().any(|d| d.code == codes::NUMERIC_LITERAL_OUT_OF_RANGE));
        assert!(!errors.iter().any(|d| d.code == codes::STACK_DOES_NOT_CONTAIN_VARIABLES_TO_POP), "an unparseable count must not silently become POP 0");
    }

    #[test]
    fn out_of_range_setu32_value_is_reported() {
        let (_, errors) = assemble("fn $f @void -> @void { STLS; PUSH @uint32 $x; SETU32 $x 99999999999u32; STLE; RETURN; }");
        assert!(errors.iter().any(|d| d.code == codes::NUMERIC_LITERAL_OUT_OF_RANGE));
    }

    #[test]
    fn duplicate_push_name_is_an_error() {
        let (_, errors) = assemble("fn $f @void -> @void { STLS; PUSH @uint32 $x; PUSH @uint32 $x; STLE; RETURN; }");
        assert!(errors.iter().any(|d| d.code == codes::VARIABLE_NAME_ALREADY_IN_USE));
    }

    #[test]
    fn missing_semicolon_is_reported() {
        let source = SourceFile::in_memory("t.crya", "fn $f @void -> @void { RETURN }");
        let mut tok_errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut tok_errors);
        let (_, errors) = assemble_tokens(&tokens, &source, &TypeTable::new());
        assert!(errors.iter().any(|d| d.code == codes::MISSING_SEMICOLON));
    }
}
