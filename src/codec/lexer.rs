//! Line tokenizer for filter text
//!
//! Splits one line into bare and double-quoted tokens and cuts off a trailing
//! `# comment`. A `#` inside quotes is part of the token.

use crate::core::error::{Error, Result};
use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
enum RawToken {
    #[regex(r"[ \t\r\n]+")]
    Whitespace,

    #[regex(r#""[^"]*""#, allow_greedy = true)]
    Quoted,

    #[regex(r##"[^ \t\r\n"#]+"##, allow_greedy = true)]
    Bare,

    // runs to end of line
    #[regex(r"#[^\n]*", allow_greedy = true)]
    Comment,
}

/// One value token. Quotes are stripped from `text`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    pub text: &'a str,
    pub quoted: bool,
}

impl<'a> Token<'a> {
    pub fn bare(text: &'a str) -> Self {
        Self {
            text,
            quoted: false,
        }
    }

    pub fn quoted(text: &'a str) -> Self {
        Self { text, quoted: true }
    }
}

/// Splits `line` into content and trailing comment (without the `#`).
///
/// A line with an unbalanced quote is returned whole, without a comment;
/// [`tokenize`] reports the quote error.
pub fn split_comment(line: &str) -> (&str, Option<&str>) {
    let mut lexer = RawToken::lexer(line);
    while let Some(token) = lexer.next() {
        match token {
            Ok(RawToken::Comment) => {
                let span = lexer.span();
                let comment = line[span.start + 1..].trim();
                return (line[..span.start].trim_end(), Some(comment));
            }
            Ok(_) => {}
            Err(()) => return (line, None),
        }
    }
    (line, None)
}

/// Tokenizes the content part of a line. `line_no` is used for errors only.
pub fn tokenize(line: &str, line_no: usize) -> Result<Vec<Token<'_>>> {
    let mut tokens = Vec::new();
    let mut lexer = RawToken::lexer(line);
    while let Some(token) = lexer.next() {
        let slice = lexer.slice();
        match token {
            Ok(RawToken::Whitespace) => {}
            Ok(RawToken::Quoted) => tokens.push(Token::quoted(&slice[1..slice.len() - 1])),
            Ok(RawToken::Bare) => tokens.push(Token::bare(slice)),
            Ok(RawToken::Comment) => break,
            Err(()) => {
                return Err(Error::parse(
                    line_no,
                    format!("unterminated quote at column {}", lexer.span().start + 1),
                ));
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_multi_word_tokens() {
        let tokens = tokenize(r#"BaseType == "Leather Belt" "Chain Belt""#, 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::bare("BaseType"),
                Token::bare("=="),
                Token::quoted("Leather Belt"),
                Token::quoted("Chain Belt"),
            ]
        );
    }

    #[test]
    fn test_trailing_comment_is_dropped() {
        let tokens = tokenize("ItemLevel >= 80 # endgame only", 1).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[2], Token::bare("80"));
    }

    #[test]
    fn test_hash_inside_quotes_is_kept() {
        let tokens = tokenize(r#"CustomAlertSound "sounds/#1.mp3" 300"#, 1).unwrap();
        assert_eq!(tokens[1], Token::quoted("sounds/#1.mp3"));
        assert_eq!(tokens[2], Token::bare("300"));
    }

    #[test]
    fn test_unterminated_quote_is_parse_error() {
        let err = tokenize(r#"BaseType "Leather Belt"#, 7).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 7, .. }));
    }

    #[test]
    fn test_empty_quotes() {
        let tokens = tokenize(r#"HasExplicitMod """#, 1).unwrap();
        assert_eq!(tokens[1], Token::quoted(""));
    }

    #[test]
    fn test_split_comment() {
        assert_eq!(split_comment("Show # Divine Orbs"), ("Show", Some("Divine Orbs")));
        assert_eq!(split_comment("Show"), ("Show", None));
        assert_eq!(
            split_comment(r#"BaseType "A#B" # note"#),
            (r#"BaseType "A#B""#, Some("note"))
        );
    }

    #[test]
    fn test_tabs_and_runs_of_spaces() {
        let tokens = tokenize("Rarity\t  Normal   Magic", 1).unwrap();
        let texts: Vec<_> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, ["Rarity", "Normal", "Magic"]);
    }
}
