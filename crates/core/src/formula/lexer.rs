use super::FormulaError;

#[derive(Clone, Debug, PartialEq)]
pub enum TokenKind {
    Number(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    LeftParen,
    RightParen,
}

impl TokenKind {
    pub fn describe(&self) -> String {
        match self {
            Self::Number(value) => format!("number `{value}`"),
            Self::Identifier(name) => format!("identifier `{name}`"),
            Self::Plus => "`+`".to_string(),
            Self::Minus => "`-`".to_string(),
            Self::Star => "`*`".to_string(),
            Self::Slash => "`/`".to_string(),
            Self::LeftParen => "`(`".to_string(),
            Self::RightParen => "`)`".to_string(),
        }
    }
}

/// A token and the character offset where it starts.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub position: usize,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut index = 0;

    while index < chars.len() {
        let ch = chars[index];
        let position = index;

        let single = match ch {
            '+' => Some(TokenKind::Plus),
            '-' | '\u{2212}' => Some(TokenKind::Minus),
            '*' | '\u{00d7}' => Some(TokenKind::Star),
            '/' | '\u{00f7}' => Some(TokenKind::Slash),
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            _ => None,
        };
        if let Some(kind) = single {
            tokens.push(Token { kind, position });
            index += 1;
            continue;
        }

        if ch.is_whitespace() {
            index += 1;
            continue;
        }

        if ch.is_ascii_digit() || ch == '.' {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_digit() || chars[index] == '.') {
                index += 1;
            }
            let literal: String = chars[start..index].iter().collect();
            let value = literal
                .parse::<f64>()
                .map_err(|_| FormulaError::InvalidNumber { literal: literal.clone(), position })?;
            tokens.push(Token { kind: TokenKind::Number(value), position });
            continue;
        }

        if ch.is_ascii_alphabetic() || ch == '_' {
            let start = index;
            while index < chars.len() && (chars[index].is_ascii_alphanumeric() || chars[index] == '_')
            {
                index += 1;
            }
            let name: String = chars[start..index].iter().collect();
            tokens.push(Token { kind: TokenKind::Identifier(name), position });
            continue;
        }

        return Err(FormulaError::UnexpectedCharacter { character: ch, position });
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::{tokenize, TokenKind};
    use crate::formula::FormulaError;

    #[test]
    fn splits_numbers_identifiers_and_operators() {
        let kinds: Vec<TokenKind> = tokenize("(width*2.5) - ton_price/1000")
            .expect("tokenize")
            .into_iter()
            .map(|token| token.kind)
            .collect();

        assert_eq!(
            kinds,
            vec![
                TokenKind::LeftParen,
                TokenKind::Identifier("width".to_string()),
                TokenKind::Star,
                TokenKind::Number(2.5),
                TokenKind::RightParen,
                TokenKind::Minus,
                TokenKind::Identifier("ton_price".to_string()),
                TokenKind::Slash,
                TokenKind::Number(1000.0),
            ]
        );
    }

    #[test]
    fn accepts_typographic_operators() {
        let kinds: Vec<TokenKind> =
            tokenize("2 × 3 ÷ 4 − 1").expect("tokenize").into_iter().map(|t| t.kind).collect();
        assert_eq!(kinds[1], TokenKind::Star);
        assert_eq!(kinds[3], TokenKind::Slash);
        assert_eq!(kinds[5], TokenKind::Minus);
    }

    #[test]
    fn reports_position_of_stray_characters() {
        let error = tokenize("width $ 2").expect_err("dollar sign is not an operator");
        assert_eq!(error, FormulaError::UnexpectedCharacter { character: '$', position: 6 });
    }

    #[test]
    fn rejects_numbers_with_two_decimal_points() {
        let error = tokenize("1.2.3").expect_err("malformed number");
        assert!(matches!(error, FormulaError::InvalidNumber { position: 0, .. }));
    }
}
