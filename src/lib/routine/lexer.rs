use super::RoutineError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Identifier(String),
    Text(String),
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Question,
    Plus,
    Minus,
    Star,
    StarStar,
    Slash,
    Percent,
    Bang,
    AndAnd,
    OrOr,
    Assign,
    PlusAssign,
    MinusAssign,
    StarAssign,
    SlashAssign,
    Equal,
    NotEqual,
    Less,
    LessOrEqual,
    Greater,
    GreaterOrEqual,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, RoutineError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let peek = |i: usize| chars.get(i).map(|&(_, c)| c);

    while let Some(&(offset, c)) = chars.get(i) {
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '/' && peek(i + 1) == Some('/') {
            while peek(i).is_some_and(|c| c != '\n') {
                i += 1;
            }
            continue;
        }
        if c == '/' && peek(i + 1) == Some('*') {
            i += 2;
            loop {
                match peek(i) {
                    None => return Err(RoutineError::lex(offset, "unterminated comment")),
                    Some('*') if peek(i + 1) == Some('/') => {
                        i += 2;
                        break;
                    }
                    Some(_) => i += 1,
                }
            }
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && peek(i + 1).is_some_and(|c| c.is_ascii_digit())) {
            let start = i;
            while peek(i).is_some_and(|c| c.is_ascii_digit() || c == '.') {
                i += 1;
            }
            if matches!(peek(i), Some('e' | 'E')) {
                let mut j = i + 1;
                if matches!(peek(j), Some('+' | '-')) {
                    j += 1;
                }
                if peek(j).is_some_and(|c| c.is_ascii_digit()) {
                    i = j;
                    while peek(i).is_some_and(|c| c.is_ascii_digit()) {
                        i += 1;
                    }
                }
            }
            let end = chars.get(i).map_or(source.len(), |&(o, _)| o);
            let text = &source[offset..end];
            let number = text
                .parse::<f64>()
                .map_err(|_| RoutineError::lex(chars[start].0, "malformed number"))?;
            tokens.push(Spanned {
                token: Token::Number(number),
                offset,
            });
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            let mut name = String::new();
            while let Some(c) = peek(i).filter(|c| c.is_alphanumeric() || *c == '_' || *c == '$') {
                name.push(c);
                i += 1;
            }
            tokens.push(Spanned {
                token: Token::Identifier(name),
                offset,
            });
            continue;
        }

        if c == '"' || c == '\'' {
            let quote = c;
            let mut text = String::new();
            i += 1;
            loop {
                match peek(i) {
                    None | Some('\n') => {
                        return Err(RoutineError::lex(offset, "unterminated string"))
                    }
                    Some(c) if c == quote => {
                        i += 1;
                        break;
                    }
                    Some('\\') => {
                        if let Some(escaped) = peek(i + 1) {
                            text.push(escaped);
                        }
                        i += 2;
                    }
                    Some(c) => {
                        text.push(c);
                        i += 1;
                    }
                }
            }
            tokens.push(Spanned {
                token: Token::Text(text),
                offset,
            });
            continue;
        }

        let next = peek(i + 1);
        let after = peek(i + 2);
        let (token, width) = match (c, next, after) {
            ('=', Some('='), Some('=')) => (Token::Equal, 3),
            ('!', Some('='), Some('=')) => (Token::NotEqual, 3),
            ('=', Some('='), _) => (Token::Equal, 2),
            ('!', Some('='), _) => (Token::NotEqual, 2),
            ('<', Some('='), _) => (Token::LessOrEqual, 2),
            ('>', Some('='), _) => (Token::GreaterOrEqual, 2),
            ('&', Some('&'), _) => (Token::AndAnd, 2),
            ('|', Some('|'), _) => (Token::OrOr, 2),
            ('*', Some('*'), _) => (Token::StarStar, 2),
            ('+', Some('='), _) => (Token::PlusAssign, 2),
            ('-', Some('='), _) => (Token::MinusAssign, 2),
            ('*', Some('='), _) => (Token::StarAssign, 2),
            ('/', Some('='), _) => (Token::SlashAssign, 2),
            ('(', ..) => (Token::ParenOpen, 1),
            (')', ..) => (Token::ParenClose, 1),
            ('{', ..) => (Token::BraceOpen, 1),
            ('}', ..) => (Token::BraceClose, 1),
            ('[', ..) => (Token::BracketOpen, 1),
            (']', ..) => (Token::BracketClose, 1),
            (',', ..) => (Token::Comma, 1),
            (';', ..) => (Token::Semicolon, 1),
            (':', ..) => (Token::Colon, 1),
            ('.', ..) => (Token::Dot, 1),
            ('?', ..) => (Token::Question, 1),
            ('+', ..) => (Token::Plus, 1),
            ('-', ..) => (Token::Minus, 1),
            ('*', ..) => (Token::Star, 1),
            ('/', ..) => (Token::Slash, 1),
            ('%', ..) => (Token::Percent, 1),
            ('!', ..) => (Token::Bang, 1),
            ('=', ..) => (Token::Assign, 1),
            ('<', ..) => (Token::Less, 1),
            ('>', ..) => (Token::Greater, 1),
            _ => return Err(RoutineError::lex(offset, format!("unexpected character `{c}`"))),
        };
        tokens.push(Spanned { token, offset });
        i += width;
    }
    Ok(tokens)
}
