use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Token kinds produced by the lexer.
///
/// `<` and `>` get their own kinds (instead of the generic `Operator`)
/// because they open and close template argument lists as well as
/// compare; the same goes for `<<`/`>>`, which are both shifts and the
/// stream operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenKind {
    // Basic
    Number,
    Identifier,
    Operator,
    Keyword,
    Str,
    Character,
    Comment,

    // Brackets
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,

    // Separators
    Comma,
    Semicolon,
    Colon,
    Dot,

    // Comparison / template
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    LeftShift,
    RightShift,

    // Arrows
    Arrow,
    ArrowStar,
    DotStar,

    // Special
    ScopeResolution,
    Ellipsis,
    Preprocessor,
    Eof,
    Unknown,

    // Keyword categories
    AccessSpecifier,
    TypeSpecifier,
    StorageClass,
    TypeQualifier,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// A single token with its source position (1-based line and column).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub value: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(kind: TokenKind, value: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            line,
            column,
        }
    }
}

/// Re-classify an identifier against the keyword tables.
///
/// Access specifiers win over type keywords, which win over the general
/// keyword set; anything unmatched stays an identifier.
fn classify_keyword(word: &str) -> TokenKind {
    match word {
        "public" | "private" | "protected" => TokenKind::AccessSpecifier,

        "void" | "char" | "short" | "int" | "long" | "float" | "double" | "signed"
        | "unsigned" | "class" | "struct" | "union" | "enum" | "typedef" => {
            TokenKind::TypeSpecifier
        }

        "static" | "extern" | "auto" | "register" => TokenKind::StorageClass,

        "const" | "volatile" => TokenKind::TypeQualifier,

        "if" | "else" | "while" | "for" | "do" | "switch" | "case" | "default" | "break"
        | "continue" | "return" | "goto" | "try" | "catch" | "throw" | "this" | "virtual"
        | "explicit" | "friend" | "inline" | "operator" | "template" | "typename"
        | "mutable" | "namespace" | "using" | "dynamic_cast" | "static_cast" | "const_cast"
        | "reinterpret_cast" | "typeid" | "new" | "delete" | "sizeof" | "asm" | "export"
        | "wchar_t" | "bool" | "true" | "false" => TokenKind::Keyword,

        _ => TokenKind::Identifier,
    }
}

const SINGLE_OPERATORS: &str = "+-*/=!&|^%~?";

/// Two-character operators that keep the generic `Operator` kind.
fn two_char_operator(pair: &str) -> bool {
    matches!(
        pair,
        "++" | "--" | "+=" | "-=" | "*=" | "/=" | "%=" | "==" | "!=" | "&&" | "||" | "&=" | "|="
            | "^="
    )
}

/// Source-to-token scanner.
///
/// The lexer never fails outright: malformed input sets the error flag,
/// is reported on stderr, and scanning continues with the next
/// character.
pub struct Lexer {
    source: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
    error_flag: bool,
    filename: String,
}

impl Lexer {
    pub fn new(input: &str, filename: &str) -> Self {
        Self {
            source: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
            error_flag: false,
            filename: filename.to_string(),
        }
    }

    /// Tokenize the whole source, terminating with an EOF token.
    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        self.position = 0;
        self.line = 1;
        self.column = 1;
        self.error_flag = false;

        while self.position < self.source.len() {
            self.skip_whitespace();
            if self.position >= self.source.len() {
                break;
            }
            let token = self.next_token();
            if token.kind != TokenKind::Unknown {
                tokens.push(token);
            }
        }

        tokens.push(Token::new(TokenKind::Eof, "", self.line, self.column));
        tokens
    }

    pub fn has_errors(&self) -> bool {
        self.error_flag
    }

    /// Token counts per kind, for `--stats` output.
    pub fn statistics(tokens: &[Token]) -> HashMap<TokenKind, usize> {
        let mut stats = HashMap::new();
        for token in tokens {
            if token.kind != TokenKind::Eof {
                *stats.entry(token.kind).or_insert(0) += 1;
            }
        }
        stats
    }

    fn next_token(&mut self) -> Token {
        let current = self.source[self.position];

        if current == '#' {
            return self.read_preprocessor();
        }
        if current.is_ascii_digit() {
            return self.read_number();
        }
        if current.is_ascii_alphabetic() || current == '_' {
            let ident = self.read_identifier();
            return Token::new(
                classify_keyword(&ident.value),
                ident.value,
                ident.line,
                ident.column,
            );
        }
        if current == '"' {
            return self.read_string();
        }
        if current == '\'' {
            return self.read_character();
        }
        if current == '/' {
            match self.peek_next() {
                Some('/') => return self.read_line_comment(),
                Some('*') => return self.read_block_comment(),
                _ => {}
            }
        }
        // '<', '>', '-', ':' and '.' all start multi-character tokens
        // that need their own disambiguation.
        if matches!(current, '<' | '>' | ':' | '.') || SINGLE_OPERATORS.contains(current) {
            return self.read_operator();
        }

        self.read_punctuation()
    }

    fn read_number(&mut self) -> Token {
        let start = self.position;
        let (line, column) = (self.line, self.column);
        let mut has_dot = false;
        let mut has_exponent = false;

        while self.position < self.source.len() {
            let c = self.source[self.position];
            if c.is_ascii_digit() {
                self.advance();
            } else if c == '.' && !has_dot && !has_exponent {
                has_dot = true;
                self.advance();
            } else if (c == 'e' || c == 'E') && !has_exponent {
                has_exponent = true;
                self.advance();
                if matches!(self.peek(), Some('+') | Some('-')) {
                    self.advance();
                }
            } else {
                break;
            }
        }

        // Suffixes: one of f/l/u, then up to two trailing l's (UL, LL, ULL).
        if let Some(c) = self.peek() {
            if matches!(c.to_ascii_lowercase(), 'f' | 'l' | 'u') {
                self.advance();
                if self.peek().map(|c| c.to_ascii_lowercase()) == Some('l') {
                    self.advance();
                    if self.peek().map(|c| c.to_ascii_lowercase()) == Some('l') {
                        self.advance();
                    }
                }
            }
        }

        let value: String = self.source[start..self.position].iter().collect();
        Token::new(TokenKind::Number, value, line, column)
    }

    fn read_identifier(&mut self) -> Token {
        let start = self.position;
        let (line, column) = (self.line, self.column);
        while self.position < self.source.len() {
            let c = self.source[self.position];
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }
        let value: String = self.source[start..self.position].iter().collect();
        Token::new(TokenKind::Identifier, value, line, column)
    }

    /// Reads a double-quoted string. Escape sequences are kept raw: a
    /// backslash consumes the following character into the value
    /// without translation.
    fn read_string(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let start = self.position;
        let mut escape = false;

        while self.position < self.source.len() {
            let c = self.source[self.position];
            if escape {
                escape = false;
                self.advance();
                continue;
            }
            if c == '\\' {
                escape = true;
            } else if c == '"' {
                break;
            }
            self.advance();
        }

        let value: String = self.source[start..self.position].iter().collect();
        if self.position < self.source.len() {
            self.advance(); // closing quote
        } else {
            self.report_error("Unterminated string literal", line, column);
        }
        Token::new(TokenKind::Str, value, line, column)
    }

    fn read_character(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // opening quote
        let start = self.position;
        let mut escape = false;

        while self.position < self.source.len() {
            let c = self.source[self.position];
            if escape {
                escape = false;
                self.advance();
                continue;
            }
            if c == '\\' {
                escape = true;
            } else if c == '\'' {
                break;
            }
            self.advance();
        }

        let value: String = self.source[start..self.position].iter().collect();
        if self.position < self.source.len() {
            self.advance(); // closing quote
        } else {
            self.report_error("Unterminated character literal", line, column);
        }
        Token::new(TokenKind::Character, value, line, column)
    }

    fn read_line_comment(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // '/'
        self.advance(); // '/'
        let start = self.position;
        while self.position < self.source.len() && self.source[self.position] != '\n' {
            self.advance();
        }
        let value: String = self.source[start..self.position].iter().collect();
        Token::new(TokenKind::Comment, value, line, column)
    }

    fn read_block_comment(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        self.advance(); // '/'
        self.advance(); // '*'
        let start = self.position;
        let mut end = start;
        let mut terminated = false;

        while self.position < self.source.len() {
            if self.source[self.position] == '*' && self.peek_next() == Some('/') {
                end = self.position;
                self.advance();
                self.advance();
                terminated = true;
                break;
            }
            self.advance();
        }

        if !terminated {
            end = self.position;
            self.report_error("Unterminated multi-line comment", line, column);
        }
        let value: String = self.source[start..end].iter().collect();
        Token::new(TokenKind::Comment, value, line, column)
    }

    fn read_operator(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let current = self.source[self.position];

        match current {
            '<' => {
                if self.peek_next() == Some('<') && self.peek_at(2) == Some('=') {
                    self.advance_n(3);
                    return Token::new(TokenKind::Operator, "<<=", line, column);
                }
                if self.peek_next() == Some('<') {
                    self.advance_n(2);
                    return Token::new(TokenKind::LeftShift, "<<", line, column);
                }
                if self.peek_next() == Some('=') {
                    self.advance_n(2);
                    return Token::new(TokenKind::LessEqual, "<=", line, column);
                }
                self.advance();
                Token::new(TokenKind::Less, "<", line, column)
            }
            '>' => {
                if self.peek_next() == Some('>') && self.peek_at(2) == Some('=') {
                    self.advance_n(3);
                    return Token::new(TokenKind::Operator, ">>=", line, column);
                }
                if self.peek_next() == Some('>') {
                    self.advance_n(2);
                    return Token::new(TokenKind::RightShift, ">>", line, column);
                }
                if self.peek_next() == Some('=') {
                    self.advance_n(2);
                    return Token::new(TokenKind::GreaterEqual, ">=", line, column);
                }
                self.advance();
                Token::new(TokenKind::Greater, ">", line, column)
            }
            '-' => {
                if self.peek_next() == Some('>') && self.peek_at(2) == Some('*') {
                    self.advance_n(3);
                    return Token::new(TokenKind::ArrowStar, "->*", line, column);
                }
                if self.peek_next() == Some('>') {
                    self.advance_n(2);
                    return Token::new(TokenKind::Arrow, "->", line, column);
                }
                self.generic_operator(line, column)
            }
            ':' => {
                if self.peek_next() == Some(':') {
                    self.advance_n(2);
                    return Token::new(TokenKind::ScopeResolution, "::", line, column);
                }
                self.advance();
                Token::new(TokenKind::Colon, ":", line, column)
            }
            '.' => {
                if self.peek_next() == Some('.') && self.peek_at(2) == Some('.') {
                    self.advance_n(3);
                    return Token::new(TokenKind::Ellipsis, "...", line, column);
                }
                if self.peek_next() == Some('*') {
                    self.advance_n(2);
                    return Token::new(TokenKind::DotStar, ".*", line, column);
                }
                self.advance();
                Token::new(TokenKind::Dot, ".", line, column)
            }
            _ => self.generic_operator(line, column),
        }
    }

    /// Two-character lookahead against the generic operator table, then
    /// a one-character fallback.
    fn generic_operator(&mut self, line: usize, column: usize) -> Token {
        if let Some(next) = self.peek_next() {
            let pair: String = [self.source[self.position], next].iter().collect();
            if two_char_operator(&pair) {
                self.advance_n(2);
                return Token::new(TokenKind::Operator, pair, line, column);
            }
        }
        let value = self.source[self.position].to_string();
        self.advance();
        Token::new(TokenKind::Operator, value, line, column)
    }

    fn read_punctuation(&mut self) -> Token {
        let (line, column) = (self.line, self.column);
        let current = self.source[self.position];

        let kind = match current {
            '(' => TokenKind::LeftParen,
            ')' => TokenKind::RightParen,
            '{' => TokenKind::LeftBrace,
            '}' => TokenKind::RightBrace,
            '[' => TokenKind::LeftBracket,
            ']' => TokenKind::RightBracket,
            ',' => TokenKind::Comma,
            ';' => TokenKind::Semicolon,
            _ => {
                self.report_error(&format!("Unknown symbol: {}", current), line, column);
                self.advance();
                return Token::new(TokenKind::Unknown, current.to_string(), line, column);
            }
        };

        self.advance();
        Token::new(kind, current.to_string(), line, column)
    }

    fn read_preprocessor(&mut self) -> Token {
        let start = self.position;
        let (line, column) = (self.line, self.column);
        self.advance(); // '#'
        while self.position < self.source.len() && self.source[self.position] != '\n' {
            self.advance();
        }
        let value: String = self.source[start..self.position].iter().collect();
        Token::new(TokenKind::Preprocessor, value, line, column)
    }

    fn skip_whitespace(&mut self) {
        while self.position < self.source.len() {
            match self.source[self.position] {
                ' ' | '\t' | '\r' | '\n' => self.advance(),
                _ => break,
            }
        }
    }

    fn advance(&mut self) {
        if self.position < self.source.len() {
            if self.source[self.position] == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
            self.position += 1;
        }
    }

    fn advance_n(&mut self, n: usize) {
        for _ in 0..n {
            self.advance();
        }
    }

    fn peek(&self) -> Option<char> {
        self.source.get(self.position).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.source.get(self.position + 1).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.source.get(self.position + offset).copied()
    }

    fn report_error(&mut self, message: &str, line: usize, column: usize) {
        let file_info = if self.filename.is_empty() {
            String::new()
        } else {
            format!(" file {}", self.filename)
        };
        eprintln!(
            "Lexer error{} (line {}, column {}): {}",
            file_info, line, column, message
        );
        self.error_flag = true;
    }
}
