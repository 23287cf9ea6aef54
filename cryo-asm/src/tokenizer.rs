//! Source text → token stream (spec §4.1): a plain left-to-right cursor
//! scanner over `&str` byte offsets, covering every character class and
//! error condition spec §4.1 names (comment/string/punctuation/sigil-word/
//! numeric-literal).

use cryo_core::error::codes;
use cryo_core::{Diagnostic, ErrorQueue, SourceFile, Severity, Token, TokenKind};

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '*' || c == '.'
}

fn is_sigil_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':' || c == '*'
}

const NUMERIC_SUFFIXES: &[&str] =
    &["u8", "u16", "u32", "u64", "i8", "i16", "i32", "i64", "f32", "f64"];

pub struct Tokenizer<'src> {
    source: &'src SourceFile,
    bytes: &'src [u8],
    pos: usize,
}

impl<'src> Tokenizer<'src> {
    pub fn new(source: &'src SourceFile) -> Self {
        Self { source, bytes: source.text.as_bytes(), pos: 0 }
    }

    fn rest(&self) -> &'src str {
        &self.source.text[self.pos..]
    }

    fn push_error(&self, errors: &mut ErrorQueue, code: &'static str, severity: Severity, message: impl Into<String>, token_text: &'src str) {
        let (line, line_text) = self.source.locate(token_text);
        errors.push(Diagnostic::new(code, severity, message, &self.source.path, line, line_text, token_text));
    }

    /// Scans the maximal run of `pred`-matching characters starting at
    /// `self.pos`, advances past it, and returns the `&str` slice.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'src str {
        let start = self.pos;
        while let Some(c) = self.rest().chars().next() {
            if !pred(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.source.text[start..self.pos]
    }

    pub fn tokenize(mut self, errors: &mut ErrorQueue) -> Vec<Token<'src>> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace_and_comments();
            let Some(c) = self.rest().chars().next() else { break };

            match c {
                '"' => {
                    if let Some(tok) = self.scan_string_literal(errors) {
                        tokens.push(tok);
                    } else {
                        break; // missing terminator: critical, abort the scan
                    }
                }
                ',' => tokens.push(self.single_char_token(TokenKind::Separator)),
                ';' => tokens.push(self.single_char_token(TokenKind::EndCommand)),
                '{' => tokens.push(self.single_char_token(TokenKind::StartBody)),
                '}' => tokens.push(self.single_char_token(TokenKind::EndBody)),
                '-' if self.rest().starts_with("->") => {
                    let start = self.pos;
                    self.pos += 2;
                    tokens.push(Token::new(TokenKind::ReturnTypeDecl, &self.source.text[start..self.pos]));
                }
                '@' => {
                    if let Some(tok) = self.scan_sigil_word(errors, TokenKind::Type) {
                        tokens.push(tok);
                    }
                }
                '$' => {
                    if let Some(tok) = self.scan_sigil_word(errors, TokenKind::Id) {
                        tokens.push(tok);
                    }
                }
                c if c.is_ascii_digit() => {
                    if let Some(tok) = self.scan_numeric_literal(errors) {
                        tokens.push(tok);
                    }
                }
                c if is_word_char(c) => {
                    let word = self.take_while(is_word_char);
                    if word == "fn" {
                        tokens.push(Token::new(TokenKind::FunctionDecl, word));
                    } else if cryo_core::opcode::is_instruction_mnemonic(word) {
                        tokens.push(Token::new(TokenKind::Instruction, word));
                    } else {
                        self.push_error(
                            errors,
                            codes::COULD_NOT_DETERMINE_TOKEN_TYPE,
                            Severity::Error,
                            format!("'{word}' is neither a keyword, an instruction, nor a value"),
                            word,
                        );
                    }
                }
                _ => {
                    let start = self.pos;
                    self.pos += c.len_utf8();
                    let text = &self.source.text[start..self.pos];
                    self.push_error(
                        errors,
                        codes::COULD_NOT_DETERMINE_TOKEN_TYPE,
                        Severity::Error,
                        format!("unexpected character '{c}'"),
                        text,
                    );
                }
            }
        }
        tokens
    }

    fn single_char_token(&mut self, kind: TokenKind) -> Token<'src> {
        let start = self.pos;
        self.pos += 1;
        Token::new(kind, &self.source.text[start..self.pos])
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            let before = self.pos;
            self.take_while(|c| c.is_whitespace());
            if self.rest().starts_with('#') {
                let newline = self.rest().find('\n').map(|i| i + 1).unwrap_or(self.rest().len());
                self.pos += newline;
            }
            if self.pos == before {
                break;
            }
        }
    }

    fn scan_string_literal(&mut self, errors: &mut ErrorQueue) -> Option<Token<'src>> {
        let quote_start = self.pos;
        self.pos += 1; // opening '"'
        let content_start = self.pos;
        match self.rest().find('"') {
            Some(rel) => {
                let content_end = content_start + rel;
                self.pos = content_end + 1; // closing '"'
                Some(Token::new(TokenKind::StringLiteral, &self.source.text[content_start..content_end]))
            }
            None => {
                let text = &self.source.text[quote_start..quote_start + 1];
                self.push_error(
                    errors,
                    codes::STRING_LITERAL_MISSING_END,
                    Severity::Critical,
                    "string literal has no closing quote",
                    text,
                );
                None
            }
        }
    }

    fn scan_sigil_word(&mut self, errors: &mut ErrorQueue, kind: TokenKind) -> Option<Token<'src>> {
        let start = self.pos;
        self.pos += 1; // sigil
        let body_start = self.pos;
        self.take_while(is_sigil_word_char);
        let word = &self.source.text[start..self.pos];
        let body = &self.source.text[body_start..self.pos];
        if body.is_empty() {
            self.push_error(
                errors,
                codes::INVALID_CHARACTER_IN_ID_OR_TYPE,
                Severity::Error,
                "expected a name after the sigil",
                word,
            );
            return None;
        }
        // Any immediately-following char that isn't whitespace/punctuation
        // and isn't in the sigil-word charset (e.g. a stray '.') is invalid.
        if let Some(c) = self.rest().chars().next() {
            if !c.is_whitespace() && !matches!(c, ',' | ';' | '{' | '}' | '"' | '#') && !is_sigil_word_char(c) {
                self.push_error(
                    errors,
                    codes::INVALID_CHARACTER_IN_ID_OR_TYPE,
                    Severity::Error,
                    format!("invalid character '{c}' in identifier/type"),
                    word,
                );
            }
        }
        Some(Token::new(kind, word))
    }

    fn scan_numeric_literal(&mut self, errors: &mut ErrorQueue) -> Option<Token<'src>> {
        let start = self.pos;
        self.take_while(is_word_char);
        let word = &self.source.text[start..self.pos];

        let dots = word.matches('.').count();
        if dots >= 2 {
            self.push_error(
                errors,
                codes::MULTIPLE_DOTS_IN_VALUE,
                Severity::Error,
                "numeric literal has more than one '.'",
                word,
            );
            return None;
        }

        let suffix = NUMERIC_SUFFIXES.iter().find(|s| word.ends_with(*s) && word.len() > s.len());
        let Some(suffix) = suffix else {
            self.push_error(
                errors,
                codes::COULD_NOT_DETERMINE_TOKEN_TYPE,
                Severity::Error,
                "numeric literal is missing a valid type suffix",
                word,
            );
            return None;
        };
        let digits = &word[..word.len() - suffix.len()];
        let has_dot = digits.contains('.');
        let kind = TokenKind::from_numeric_suffix(suffix).unwrap();

        if has_dot && !kind.is_float() {
            self.push_error(
                errors,
                codes::COULD_NOT_DETERMINE_TOKEN_TYPE,
                Severity::Error,
                "a fractional value requires an f32 or f64 suffix",
                word,
            );
            return None;
        }
        if !digits.chars().all(|c| c.is_ascii_digit() || c == '.') || digits.is_empty() {
            self.push_error(
                errors,
                codes::COULD_NOT_DETERMINE_TOKEN_TYPE,
                Severity::Error,
                "malformed numeric literal",
                word,
            );
            return None;
        }

        Some(Token::new(kind, word))
    }
}

pub fn tokenize<'src>(source: &'src SourceFile, errors: &mut ErrorQueue) -> Vec<Token<'src>> {
    Tokenizer::new(source).tokenize(errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<TokenKind> {
        let source = SourceFile::in_memory("test.crya", text);
        let mut errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut errors);
        assert!(errors.is_empty(), "unexpected errors: {errors}");
        tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn function_declaration_shape() {
        use TokenKind::*;
        let got = kinds("fn $main -> @void { RETURN; }");
        assert_eq!(got, vec![FunctionDecl, Id, ReturnTypeDecl, Type, StartBody, Instruction, EndCommand, EndBody]);
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let got = kinds("# a comment\n  RETURN; # trailing\n");
        assert_eq!(got, vec![TokenKind::Instruction, TokenKind::EndCommand]);
    }

    #[test]
    fn string_literal_may_contain_braces_and_hashes() {
        let source = SourceFile::in_memory("t.crya", "SETSTR $s \"hi {there} #1\";");
        let mut errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
        assert_eq!(tokens[2].text, "hi {there} #1");
    }

    #[test]
    fn typed_numeric_literals_classify_by_suffix() {
        let source = SourceFile::in_memory("t.crya", "3u32 3.14f32 7i8");
        let mut errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut errors);
        assert!(errors.is_empty());
        assert_eq!(tokens[0].kind, TokenKind::U32);
        assert_eq!(tokens[1].kind, TokenKind::F32);
        assert_eq!(tokens[2].kind, TokenKind::I8);
    }

    #[test]
    fn missing_suffix_is_an_error() {
        let source = SourceFile::in_memory("t.crya", "3.14");
        let mut errors = ErrorQueue::new();
        tokenize(&source, &mut errors);
        assert!(!errors.is_empty());
        assert_eq!(errors.iter().next().unwrap().code, codes::COULD_NOT_DETERMINE_TOKEN_TYPE);
    }

    #[test]
    fn multiple_dots_is_a_distinct_error() {
        let source = SourceFile::in_memory("t.crya", "3..14f32");
        let mut errors = ErrorQueue::new();
        tokenize(&source, &mut errors);
        assert_eq!(errors.iter().next().unwrap().code, codes::MULTIPLE_DOTS_IN_VALUE);
    }

    #[test]
    fn unterminated_string_is_critical_and_aborts() {
        let source = SourceFile::in_memory("t.crya", "SETSTR $s \"oops");
        let mut errors = ErrorQueue::new();
        let tokens = tokenize(&source, &mut errors);
        assert!(errors.is_critical());
        assert_eq!(tokens.len(), 2); // SETSTR, $s — the string token never materializes
    }
}
