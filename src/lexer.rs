use crate::error::{self, Position, SourceMetadata};
use std::fmt;

pub type LexError = error::Error<LexErrorKind>;

#[derive(Debug)]
pub enum LexErrorKind {
    UnexpectedChar(char),
}

impl fmt::Display for LexErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::UnexpectedChar(ch) => write!(f, "unexpected character {:?}", ch),
        }
    }
}

impl std::error::Error for LexErrorKind {}

/// One scanned token: kind, the raw source slice it covers (string and char
/// literals keep their quotes and escapes), and its 1-based position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Token<'source> {
    pub kind: TokenKind,
    pub lexeme: &'source str,
    pub pos: Position,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Number,
    Text,
    Char,
    True,
    False,
    Null,
    Identifier,
    Keyword(Keyword),
    Operator(Operator),
    Format(FormatSpec),
    Semicolon,
    Comma,
    Dot,
    Colon,
    Question,
    Dollar,
    At,
    Arrow,
    OpenBracket,
    CloseBracket,
    OpenBrace,
    CloseBrace,
    OpenParen,
    CloseParen,
    Newline,
    Eof,
}

impl TokenKind {
    pub const fn as_operator(self) -> Option<Operator> {
        if let TokenKind::Operator(op) = self {
            Some(op)
        } else {
            None
        }
    }
    pub const fn as_keyword(self) -> Option<Keyword> {
        if let TokenKind::Keyword(kw) = self {
            Some(kw)
        } else {
            None
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Number => f.write_str("number"),
            Self::Text => f.write_str("text literal"),
            Self::Char => f.write_str("character literal"),
            Self::True => f.write_str("`true`"),
            Self::False => f.write_str("`false`"),
            Self::Null => f.write_str("`null`"),
            Self::Identifier => f.write_str("identifier"),
            Self::Keyword(kw) => write!(f, "keyword `{}`", kw),
            Self::Operator(op) => write!(f, "operator `{}`", op),
            Self::Format(spec) => write!(f, "format specifier `{}`", spec),
            Self::Semicolon => f.write_str("semicolon ';'"),
            Self::Comma => f.write_str("comma ','"),
            Self::Dot => f.write_str("dot '.'"),
            Self::Colon => f.write_str("colon ':'"),
            Self::Question => f.write_str("question mark '?'"),
            Self::Dollar => f.write_str("dollar sign '$'"),
            Self::At => f.write_str("at sign '@'"),
            Self::Arrow => f.write_str("arrow '->'"),
            Self::OpenBracket => f.write_str("opening bracket '['"),
            Self::CloseBracket => f.write_str("closing bracket ']'"),
            Self::OpenBrace => f.write_str("opening brace '{'"),
            Self::CloseBrace => f.write_str("closing brace '}'"),
            Self::OpenParen => f.write_str("opening parenthesis '('"),
            Self::CloseParen => f.write_str("closing parenthesis ')'"),
            Self::Newline => f.write_str("line break"),
            Self::Eof => f.write_str("end of file"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    Val,
    Fnc,
    Run,
    If,
    Or,
    Else,
    For,
    Try,
    Catch,
    Finally,
    Return,
    Repeat,
    When,
    Fixed,
    Struct,
    Num,
    Text,
    Char,
    Bool,
    Void,
}

impl Keyword {
    pub const fn is_type_name(self) -> bool {
        matches!(
            self,
            Self::Num | Self::Text | Self::Char | Self::Bool | Self::Void
        )
    }

    fn from_identifier(ident: &str) -> Option<Self> {
        Some(match ident {
            "val" => Self::Val,
            "fnc" => Self::Fnc,
            "run" => Self::Run,
            "if" => Self::If,
            "or" => Self::Or,
            "else" => Self::Else,
            "for" => Self::For,
            "try" => Self::Try,
            "catch" => Self::Catch,
            "finally" => Self::Finally,
            "return" => Self::Return,
            "repeat" => Self::Repeat,
            "when" => Self::When,
            "fixed" => Self::Fixed,
            "struct" => Self::Struct,
            "num" => Self::Num,
            "text" => Self::Text,
            "char" => Self::Char,
            "bool" => Self::Bool,
            "void" => Self::Void,
            _ => return None,
        })
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Val => "val",
            Self::Fnc => "fnc",
            Self::Run => "run",
            Self::If => "if",
            Self::Or => "or",
            Self::Else => "else",
            Self::For => "for",
            Self::Try => "try",
            Self::Catch => "catch",
            Self::Finally => "finally",
            Self::Return => "return",
            Self::Repeat => "repeat",
            Self::When => "when",
            Self::Fixed => "fixed",
            Self::Struct => "struct",
            Self::Num => "num",
            Self::Text => "text",
            Self::Char => "char",
            Self::Bool => "bool",
            Self::Void => "void",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Assign,
    Equals,
    NotEquals,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,
    And,
    Or,
    Not,
    Concat,
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Plus => "+",
            Self::Minus => "-",
            Self::Star => "*",
            Self::Slash => "/",
            Self::Percent => "%",
            Self::Assign => "=",
            Self::Equals => "==",
            Self::NotEquals => "!=",
            Self::Less => "<",
            Self::Greater => ">",
            Self::LessEqual => "<=",
            Self::GreaterEqual => ">=",
            Self::And => "&&",
            Self::Or => "||",
            Self::Not => "!!",
            Self::Concat => "+>>",
        })
    }
}

/// `:d` / `:f` / `:s` — distinct tokens when followed by a non-identifier
/// character; a bare `:` stays the colon token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatSpec {
    Decimal,
    Float,
    Str,
}

impl FormatSpec {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Decimal => ":d",
            Self::Float => ":f",
            Self::Str => ":s",
        }
    }
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Some(match suffix {
            "d" => Self::Decimal,
            "f" => Self::Float,
            "s" => Self::Str,
            _ => return None,
        })
    }
}

impl fmt::Display for FormatSpec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct Lexer<'source> {
    metadata: &'source SourceMetadata<'source>,
    /// Byte offset of the next unread character.
    offset: usize,
    position: Position,
}

impl<'source> Lexer<'source> {
    pub fn new(input: &'source SourceMetadata<'source>) -> Self {
        Self {
            metadata: input,
            offset: 0,
            position: Position::start(),
        }
    }

    /// Scan the whole input. The returned stream always ends with exactly one
    /// `Eof` token.
    pub fn tokenize(mut self) -> Result<Vec<Token<'source>>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        tokens.push(Token {
            kind: TokenKind::Eof,
            lexeme: "",
            pos: self.position,
        });
        Ok(tokens)
    }

    fn next_token(&mut self) -> Result<Option<Token<'source>>, LexError> {
        loop {
            self.skip_blank_and_comments();
            let start = self.offset;
            let pos = self.position;
            let ch = match self.peek() {
                Some(ch) => ch,
                None => return Ok(None),
            };

            let kind = match ch {
                '\n' => {
                    self.advance();
                    TokenKind::Newline
                }
                ';' => self.single(TokenKind::Semicolon),
                ',' => self.single(TokenKind::Comma),
                '.' => self.single(TokenKind::Dot),
                '?' => self.single(TokenKind::Question),
                '$' => self.single(TokenKind::Dollar),
                '@' => self.single(TokenKind::At),
                '[' => self.single(TokenKind::OpenBracket),
                ']' => self.single(TokenKind::CloseBracket),
                '{' => self.single(TokenKind::OpenBrace),
                '}' => self.single(TokenKind::CloseBrace),
                '(' => self.single(TokenKind::OpenParen),
                ')' => self.single(TokenKind::CloseParen),
                ':' => self.colon_or_format(),
                '-' => {
                    self.advance();
                    if self.eat('>') {
                        TokenKind::Arrow
                    } else {
                        TokenKind::Operator(Operator::Minus)
                    }
                }
                '+' => {
                    self.advance();
                    if self.rest().starts_with(">>") {
                        self.advance();
                        self.advance();
                        TokenKind::Operator(Operator::Concat)
                    } else {
                        TokenKind::Operator(Operator::Plus)
                    }
                }
                '*' => self.single(TokenKind::Operator(Operator::Star)),
                '/' => self.single(TokenKind::Operator(Operator::Slash)),
                '%' => self.single(TokenKind::Operator(Operator::Percent)),
                '=' => {
                    self.advance();
                    if self.eat('=') {
                        TokenKind::Operator(Operator::Equals)
                    } else {
                        TokenKind::Operator(Operator::Assign)
                    }
                }
                '<' => {
                    self.advance();
                    if self.eat('=') {
                        TokenKind::Operator(Operator::LessEqual)
                    } else {
                        TokenKind::Operator(Operator::Less)
                    }
                }
                '>' => {
                    self.advance();
                    if self.eat('=') {
                        TokenKind::Operator(Operator::GreaterEqual)
                    } else {
                        TokenKind::Operator(Operator::Greater)
                    }
                }
                '!' => {
                    self.advance();
                    if self.eat('=') {
                        TokenKind::Operator(Operator::NotEquals)
                    } else if self.eat('!') {
                        TokenKind::Operator(Operator::Not)
                    } else {
                        return Err(self.error(pos, LexErrorKind::UnexpectedChar('!')));
                    }
                }
                '&' => {
                    self.advance();
                    if self.eat('&') {
                        TokenKind::Operator(Operator::And)
                    } else {
                        return Err(self.error(pos, LexErrorKind::UnexpectedChar('&')));
                    }
                }
                '|' => {
                    self.advance();
                    if self.eat('|') {
                        TokenKind::Operator(Operator::Or)
                    } else {
                        return Err(self.error(pos, LexErrorKind::UnexpectedChar('|')));
                    }
                }
                '"' => {
                    if self.text_literal() {
                        TokenKind::Text
                    } else {
                        // unterminated string: emit nothing, keep scanning
                        continue;
                    }
                }
                '\'' => {
                    if self.char_literal() {
                        TokenKind::Char
                    } else {
                        continue;
                    }
                }
                c if c.is_ascii_digit() => self.number(),
                c if c.is_ascii_alphabetic() || c == '_' => self.identifier_or_keyword(start),
                c => return Err(self.error(pos, LexErrorKind::UnexpectedChar(c))),
            };

            return Ok(Some(Token {
                kind,
                lexeme: &self.metadata.input()[start..self.offset],
                pos,
            }));
        }
    }

    /// Skip spaces, carriage returns, tabs and both comment forms. Line
    /// feeds are left in place to become newline tokens.
    fn skip_blank_and_comments(&mut self) {
        loop {
            self.skip_while(|c| c == ' ' || c == '\r' || c == '\t');
            if self.rest().starts_with("//") {
                self.skip_while(|c| c != '\n');
            } else if self.rest().starts_with("/?") {
                self.advance();
                self.advance();
                // unterminated block comment runs to end of file
                while !self.rest().starts_with("?/") && self.peek().is_some() {
                    self.advance();
                }
                if self.peek().is_some() {
                    self.advance();
                    self.advance();
                }
            } else {
                return;
            }
        }
    }

    /// `true` when a closing quote was found; on failure the region up to the
    /// line feed (or end of input) has been consumed.
    fn text_literal(&mut self) -> bool {
        self.advance(); // opening quote
        loop {
            match self.peek() {
                None | Some('\n') => return false,
                Some('\\') => {
                    self.advance();
                    if self.peek().is_some() {
                        self.advance();
                    }
                }
                Some('"') => {
                    self.advance();
                    return true;
                }
                Some(_) => self.advance(),
            }
        }
    }

    fn char_literal(&mut self) -> bool {
        self.advance(); // opening quote
        match self.peek() {
            Some('\\') => {
                self.advance();
                if self.peek().is_some() {
                    self.advance();
                }
            }
            Some('\'') | None | Some('\n') => {
                // empty or unterminated
                self.skip_while(|c| c == '\'');
                return false;
            }
            Some(_) => self.advance(),
        }
        if self.eat('\'') {
            true
        } else {
            // too many characters: drop everything up to a closing quote
            self.skip_while(|c| c != '\'' && c != '\n');
            self.eat('\'');
            false
        }
    }

    fn number(&mut self) -> TokenKind {
        self.skip_while(|c| c.is_ascii_digit());
        // a dot is part of the number only when digits follow
        if self.rest().starts_with('.')
            && self
                .rest()
                .chars()
                .nth(1)
                .map_or(false, |c| c.is_ascii_digit())
        {
            self.advance();
            self.skip_while(|c| c.is_ascii_digit());
        }
        TokenKind::Number
    }

    fn identifier_or_keyword(&mut self, start: usize) -> TokenKind {
        self.skip_while(|c| c.is_ascii_alphanumeric() || c == '_');
        let ident = &self.metadata.input()[start..self.offset];
        match ident {
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => Keyword::from_identifier(ident)
                .map_or(TokenKind::Identifier, TokenKind::Keyword),
        }
    }

    fn colon_or_format(&mut self) -> TokenKind {
        let mut chars = self.rest().chars();
        chars.next(); // the colon
        let spec = match chars.next() {
            Some('d') => FormatSpec::Decimal,
            Some('f') => FormatSpec::Float,
            Some('s') => FormatSpec::Str,
            _ => return self.single(TokenKind::Colon),
        };
        // `:done` is a colon and an identifier, not a format specifier
        if chars
            .next()
            .map_or(false, |c| c.is_ascii_alphanumeric() || c == '_')
        {
            return self.single(TokenKind::Colon);
        }
        self.advance();
        self.advance();
        TokenKind::Format(spec)
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn rest(&self) -> &'source str {
        &self.metadata.input()[self.offset..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.peek() {
            self.offset += ch.len_utf8();
            if ch == '\n' {
                self.position.line += 1;
                self.position.col = 1;
            } else {
                self.position.col += 1;
            }
        }
    }

    fn eat(&mut self, ch: char) -> bool {
        if self.peek() == Some(ch) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_while<F>(&mut self, filter: F)
    where
        F: Fn(char) -> bool,
    {
        while self.peek().filter(|&c| filter(c)).is_some() {
            self.advance();
        }
    }

    fn error(&self, position: Position, kind: LexErrorKind) -> LexError {
        LexError::new(kind).with_position(position, self.metadata)
    }
}

/// Decode a text-literal lexeme (quotes included) into its byte content.
pub fn text_value(lexeme: &str) -> String {
    let inner = lexeme
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(lexeme);
    decode_escapes(inner)
}

/// Decode a char-literal lexeme (quotes included) into its single byte.
pub fn char_value(lexeme: &str) -> u8 {
    let inner = lexeme
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(lexeme);
    decode_escapes(inner).bytes().next().unwrap_or(0)
}

fn decode_escapes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                // unknown escape: kept verbatim
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &'static str) -> Vec<Token<'static>> {
        let meta = Box::leak(Box::new(SourceMetadata::new(source)));
        Lexer::new(meta).tokenize().expect("expected lexing to work")
    }

    fn kinds(source: &'static str) -> Vec<TokenKind> {
        lex(source).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn stream_ends_with_single_eof() {
        let tokens = kinds("num x = 1;");
        assert_eq!(
            tokens.iter().filter(|k| **k == TokenKind::Eof).count(),
            1
        );
        assert_eq!(*tokens.last().unwrap(), TokenKind::Eof);
    }

    #[test]
    fn punctuation_and_operators() {
        assert_eq!(
            kinds("+ +>> -> - !! != == ="),
            vec![
                TokenKind::Operator(Operator::Plus),
                TokenKind::Operator(Operator::Concat),
                TokenKind::Arrow,
                TokenKind::Operator(Operator::Minus),
                TokenKind::Operator(Operator::Not),
                TokenKind::Operator(Operator::NotEquals),
                TokenKind::Operator(Operator::Equals),
                TokenKind::Operator(Operator::Assign),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn format_specifier_vs_colon() {
        assert_eq!(
            kinds(":d :f :s :"),
            vec![
                TokenKind::Format(FormatSpec::Decimal),
                TokenKind::Format(FormatSpec::Float),
                TokenKind::Format(FormatSpec::Str),
                TokenKind::Colon,
                TokenKind::Eof,
            ]
        );
        // `:done` must not produce a format specifier
        assert_eq!(
            kinds(":done"),
            vec![TokenKind::Colon, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn keywords_and_literals() {
        assert_eq!(
            kinds("val num true false null xyz"),
            vec![
                TokenKind::Keyword(Keyword::Val),
                TokenKind::Keyword(Keyword::Num),
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
                TokenKind::Identifier,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn newline_tokens_and_positions() {
        let tokens = lex("a\nbb");
        assert_eq!(tokens[0].pos, Position { line: 1, col: 1 });
        assert_eq!(tokens[1].kind, TokenKind::Newline);
        assert_eq!(tokens[2].pos, Position { line: 2, col: 1 });
        assert_eq!(tokens[2].lexeme, "bb");
    }

    #[test]
    fn comments_are_not_emitted() {
        assert_eq!(
            kinds("1 // ignored\n2"),
            vec![
                TokenKind::Number,
                TokenKind::Newline,
                TokenKind::Number,
                TokenKind::Eof,
            ]
        );
        assert_eq!(
            kinds("1 /? block\nstill block ?/ 2"),
            vec![TokenKind::Number, TokenKind::Number, TokenKind::Eof]
        );
        // unterminated block comment swallows the rest silently
        assert_eq!(kinds("1 /? never closed"), vec![TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn text_literals_keep_raw_lexeme() {
        let tokens = lex(r#""a\nb""#);
        assert_eq!(tokens[0].kind, TokenKind::Text);
        assert_eq!(tokens[0].lexeme, r#""a\nb""#);
        assert_eq!(text_value(tokens[0].lexeme), "a\nb");
    }

    #[test]
    fn char_literals() {
        let tokens = lex(r"'x' '\n' '\\'");
        assert_eq!(
            tokens.iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![TokenKind::Char, TokenKind::Char, TokenKind::Char, TokenKind::Eof]
        );
        assert_eq!(char_value(tokens[0].lexeme), b'x');
        assert_eq!(char_value(tokens[1].lexeme), b'\n');
        assert_eq!(char_value(tokens[2].lexeme), b'\\');
    }

    #[test]
    fn unterminated_string_is_swallowed() {
        // lenient: the malformed literal produces no token at all
        assert_eq!(kinds("\"oops\n1"), vec![TokenKind::Newline, TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn invalid_char_literal_is_swallowed() {
        assert_eq!(kinds("'ab' 1"), vec![TokenKind::Number, TokenKind::Eof]);
        assert_eq!(kinds("'' 1"), vec![TokenKind::Number, TokenKind::Eof]);
    }

    #[test]
    fn decimal_numbers() {
        let tokens = lex("3.25 7");
        assert_eq!(tokens[0].kind, TokenKind::Number);
        assert_eq!(tokens[0].lexeme, "3.25");
        assert_eq!(tokens[1].lexeme, "7");
    }

    #[test]
    fn dot_not_swallowed_without_digits() {
        assert_eq!(
            kinds("3.x"),
            vec![TokenKind::Number, TokenKind::Dot, TokenKind::Identifier, TokenKind::Eof]
        );
    }

    #[test]
    fn lexeme_concatenation_reproduces_source() {
        let source = "run { @print[\"hi $name\"]; };";
        let collected: String = lex(source)
            .iter()
            .map(|t| t.lexeme)
            .collect();
        let stripped: String = source.chars().filter(|c| !c.is_whitespace()).collect();
        let collected_stripped: String =
            collected.chars().filter(|c| !c.is_whitespace()).collect();
        assert_eq!(collected_stripped, stripped);
    }

    #[test]
    fn lone_ampersand_is_an_error() {
        let meta = SourceMetadata::new("a & b");
        assert!(Lexer::new(&meta).tokenize().is_err());
    }
}
