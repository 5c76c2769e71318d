use nova_types::Span;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
    pub(crate) kind: TokenKind,
    pub(crate) text: String,
    pub(crate) range: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TokenKind {
    Ident,
    IntLiteral,
    LongLiteral,
    FloatLiteral,
    DoubleLiteral,
    CharLiteral,
    StringLiteral,
    At,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Semi,
    Comma,
    Dot,
    Ellipsis,
    ColonColon,
    Colon,
    Question,
    Arrow,
    Eq,
    EqEq,
    Bang,
    BangEq,
    Tilde,
    Plus,
    PlusPlus,
    PlusEq,
    Minus,
    MinusMinus,
    MinusEq,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Amp,
    AmpAmp,
    AmpEq,
    Pipe,
    PipePipe,
    PipeEq,
    Caret,
    CaretEq,
    Lt,
    LtEq,
    Shl,
    ShlEq,
    /// Always a single `>`; the parser glues `>>`, `>=`, `>>=` from adjacent tokens
    /// so generic argument lists can close one level at a time.
    Gt,
    Unknown,
}

pub(crate) struct Lexer<'a> {
    text: &'a str,
    offset: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub(crate) fn new(text: &'a str, offset: usize) -> Self {
        Lexer {
            text,
            offset,
            pos: 0,
        }
    }

    fn remaining(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn peek_char(&self) -> Option<char> {
        self.remaining().chars().next()
    }

    fn peek_char_n(&self, n: usize) -> Option<char> {
        self.remaining().chars().nth(n)
    }

    fn bump_char(&mut self) -> Option<char> {
        let c = self.peek_char()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn current_offset(&self) -> usize {
        self.offset + self.pos
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while matches!(self.peek_char(), Some(c) if c.is_whitespace()) {
                self.bump_char();
            }

            let rem = self.remaining();
            if rem.starts_with("//") {
                while let Some(c) = self.bump_char() {
                    if c == '\n' {
                        break;
                    }
                }
                continue;
            }

            if rem.starts_with("/*") {
                self.bump_char();
                self.bump_char();
                while !self.remaining().is_empty() && !self.remaining().starts_with("*/") {
                    self.bump_char();
                }
                if self.remaining().starts_with("*/") {
                    self.bump_char();
                    self.bump_char();
                }
                continue;
            }

            break;
        }
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while matches!(self.peek_char(), Some(c) if pred(c)) {
            self.bump_char();
        }
    }

    fn lex_number(&mut self, first: char) -> TokenKind {
        let mut is_floating = first == '.';
        if first == '0' && matches!(self.peek_char(), Some('x' | 'X' | 'b' | 'B')) {
            self.bump_char();
            self.eat_while(|c| c.is_ascii_hexdigit() || c == '_');
        } else {
            self.eat_while(|c| c.is_ascii_digit() || c == '_');
            if !is_floating
                && self.peek_char() == Some('.')
                && self.peek_char_n(1).is_some_and(|c| c.is_ascii_digit())
            {
                is_floating = true;
                self.bump_char();
                self.eat_while(|c| c.is_ascii_digit() || c == '_');
            } else if !is_floating
                && self.peek_char() == Some('.')
                && !self
                    .peek_char_n(1)
                    .is_some_and(|c| c.is_alphabetic() || c == '_' || c == '.')
            {
                // `1.` is a double literal; `1.toString` is not Java anyway.
                is_floating = true;
                self.bump_char();
            }
            if matches!(self.peek_char(), Some('e' | 'E')) {
                is_floating = true;
                self.bump_char();
                if matches!(self.peek_char(), Some('+' | '-')) {
                    self.bump_char();
                }
                self.eat_while(|c| c.is_ascii_digit() || c == '_');
            }
        }

        match self.peek_char() {
            Some('l' | 'L') => {
                self.bump_char();
                TokenKind::LongLiteral
            }
            Some('f' | 'F') => {
                self.bump_char();
                TokenKind::FloatLiteral
            }
            Some('d' | 'D') => {
                self.bump_char();
                TokenKind::DoubleLiteral
            }
            _ if is_floating => TokenKind::DoubleLiteral,
            _ => TokenKind::IntLiteral,
        }
    }

    fn lex_quoted(&mut self, quote: char) {
        // opening quote already consumed
        while let Some(c) = self.bump_char() {
            match c {
                '\\' => {
                    self.bump_char();
                }
                '\n' => break,
                c if c == quote => break,
                _ => {}
            }
        }
    }

    fn lex_text_block(&mut self) {
        // opening `"""` already consumed
        while !self.remaining().is_empty() {
            if self.remaining().starts_with("\\") {
                self.bump_char();
                self.bump_char();
                continue;
            }
            if self.remaining().starts_with("\"\"\"") {
                self.pos += 3;
                return;
            }
            self.bump_char();
        }
    }

    fn punct(&mut self, ch: char) -> TokenKind {
        let next = self.peek_char();
        let two = |lexer: &mut Self, kind: TokenKind| {
            lexer.bump_char();
            kind
        };
        match (ch, next) {
            ('{', _) => TokenKind::LBrace,
            ('}', _) => TokenKind::RBrace,
            ('(', _) => TokenKind::LParen,
            (')', _) => TokenKind::RParen,
            ('[', _) => TokenKind::LBracket,
            (']', _) => TokenKind::RBracket,
            (';', _) => TokenKind::Semi,
            (',', _) => TokenKind::Comma,
            ('@', _) => TokenKind::At,
            ('?', _) => TokenKind::Question,
            ('~', _) => TokenKind::Tilde,
            ('.', Some('.')) if self.peek_char_n(1) == Some('.') => {
                self.bump_char();
                self.bump_char();
                TokenKind::Ellipsis
            }
            ('.', _) => TokenKind::Dot,
            (':', Some(':')) => two(self, TokenKind::ColonColon),
            (':', _) => TokenKind::Colon,
            ('=', Some('=')) => two(self, TokenKind::EqEq),
            ('=', _) => TokenKind::Eq,
            ('!', Some('=')) => two(self, TokenKind::BangEq),
            ('!', _) => TokenKind::Bang,
            ('+', Some('+')) => two(self, TokenKind::PlusPlus),
            ('+', Some('=')) => two(self, TokenKind::PlusEq),
            ('+', _) => TokenKind::Plus,
            ('-', Some('-')) => two(self, TokenKind::MinusMinus),
            ('-', Some('=')) => two(self, TokenKind::MinusEq),
            ('-', Some('>')) => two(self, TokenKind::Arrow),
            ('-', _) => TokenKind::Minus,
            ('*', Some('=')) => two(self, TokenKind::StarEq),
            ('*', _) => TokenKind::Star,
            ('/', Some('=')) => two(self, TokenKind::SlashEq),
            ('/', _) => TokenKind::Slash,
            ('%', Some('=')) => two(self, TokenKind::PercentEq),
            ('%', _) => TokenKind::Percent,
            ('&', Some('&')) => two(self, TokenKind::AmpAmp),
            ('&', Some('=')) => two(self, TokenKind::AmpEq),
            ('&', _) => TokenKind::Amp,
            ('|', Some('|')) => two(self, TokenKind::PipePipe),
            ('|', Some('=')) => two(self, TokenKind::PipeEq),
            ('|', _) => TokenKind::Pipe,
            ('^', Some('=')) => two(self, TokenKind::CaretEq),
            ('^', _) => TokenKind::Caret,
            ('<', Some('=')) => two(self, TokenKind::LtEq),
            ('<', Some('<')) => {
                self.bump_char();
                if self.peek_char() == Some('=') {
                    self.bump_char();
                    TokenKind::ShlEq
                } else {
                    TokenKind::Shl
                }
            }
            ('<', _) => TokenKind::Lt,
            ('>', _) => TokenKind::Gt,
            _ => TokenKind::Unknown,
        }
    }

    fn next_token(&mut self) -> Option<Token> {
        self.skip_whitespace_and_comments();
        let start_pos = self.pos;
        let start = self.current_offset();
        let ch = self.bump_char()?;

        let kind = match ch {
            '"' if self.remaining().starts_with("\"\"") => {
                self.pos += 2;
                self.lex_text_block();
                TokenKind::StringLiteral
            }
            '"' => {
                self.lex_quoted('"');
                TokenKind::StringLiteral
            }
            '\'' => {
                self.lex_quoted('\'');
                TokenKind::CharLiteral
            }
            c if c.is_ascii_digit() => self.lex_number(c),
            '.' if self.peek_char().is_some_and(|c| c.is_ascii_digit()) => self.lex_number('.'),
            c if c.is_alphabetic() || c == '_' || c == '$' => {
                self.eat_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                TokenKind::Ident
            }
            other => self.punct(other),
        };

        let text = self.text[start_pos..self.pos].to_string();
        let range = Span::new(start, self.current_offset());
        Some(Token { kind, text, range })
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_token()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(text: &str) -> Vec<TokenKind> {
        Lexer::new(text, 0).map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_operators_with_maximal_munch() {
        assert_eq!(
            kinds("a += b++ >= c -> d :: e"),
            vec![
                TokenKind::Ident,
                TokenKind::PlusEq,
                TokenKind::Ident,
                TokenKind::PlusPlus,
                TokenKind::Gt,
                TokenKind::Eq,
                TokenKind::Ident,
                TokenKind::Arrow,
                TokenKind::Ident,
                TokenKind::ColonColon,
                TokenKind::Ident,
            ]
        );
    }

    #[test]
    fn lexes_literals() {
        assert_eq!(
            kinds("1 10L 1.5 2f 0x1F 'c' \"s\\\"\" 1e3"),
            vec![
                TokenKind::IntLiteral,
                TokenKind::LongLiteral,
                TokenKind::DoubleLiteral,
                TokenKind::FloatLiteral,
                TokenKind::IntLiteral,
                TokenKind::CharLiteral,
                TokenKind::StringLiteral,
                TokenKind::DoubleLiteral,
            ]
        );
    }

    #[test]
    fn ranges_are_offset() {
        let tokens: Vec<_> = Lexer::new("  foo /* c */ bar", 10).collect();
        assert_eq!(tokens[0].range, Span::new(12, 15));
        assert_eq!(tokens[1].text, "bar");
        assert_eq!(tokens[1].range, Span::new(24, 27));
    }
}
