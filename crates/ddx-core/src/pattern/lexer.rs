#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Word(String),
    And,
    Or,
    LParen,
    RParen,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Spanned {
    pub(crate) token: Token,
    /// Byte offset into the pattern source.
    pub(crate) pos: usize,
}

fn is_word_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '&' | '|' | '(' | ')')
}

/// Words are lower-cased here so evaluation only has to lower-case the candidate.
pub(crate) fn tokenize(src: &str) -> Vec<Spanned> {
    let mut out = Vec::new();
    let mut chars = src.char_indices().peekable();

    while let Some(&(pos, c)) = chars.peek() {
        let token = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '&' => Token::And,
            '|' => Token::Or,
            '(' => Token::LParen,
            ')' => Token::RParen,
            _ => {
                let mut end = pos;
                while let Some(&(i, w)) = chars.peek() {
                    if !is_word_char(w) {
                        break;
                    }
                    end = i + w.len_utf8();
                    chars.next();
                }
                out.push(Spanned {
                    token: Token::Word(src[pos..end].to_lowercase()),
                    pos,
                });
                continue;
            }
        };
        chars.next();
        out.push(Spanned { token, pos });
    }

    out
}
