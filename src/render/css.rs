//! Locating `url()` references in stylesheets.

use std::ops::Range;

use cssparser::{ParseError, Parser, ParserInput, Token};

type CssParseError<'i> = ParseError<'i, ()>;

/// A `url()` occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CssUrl {
    /// Byte span of the whole `url(...)` expression.
    pub span: Range<usize>,
    /// The reference inside, unquoted and unescaped.
    pub url: String,
}

/// Find every `url()` in `css`, including ones nested in blocks and in other
/// functions (`image-set(url(a.png) 1x)`).
pub fn scan_urls(css: &str) -> Vec<CssUrl> {
    // Every url() needs a parenthesis.
    if memchr::memchr(b'(', css.as_bytes()).is_none() {
        return Vec::new();
    }

    let mut urls = Vec::new();
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    scan_recursive(&mut parser, &mut urls);
    urls
}

/// Render a replacement `url()` expression for `target`.
pub fn url_expression(target: &str) -> String {
    let mut out = String::with_capacity(target.len() + 7);
    out.push_str("url(\"");
    for c in target.chars() {
        match c {
            '"' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\a "),
            _ => out.push(c),
        }
    }
    out.push_str("\")");
    out
}

fn scan_recursive(parser: &mut Parser, urls: &mut Vec<CssUrl>) {
    loop {
        let start = parser.position().byte_index();
        let token = match parser.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match token {
            Token::UnquotedUrl(url) => {
                let end = parser.position().byte_index();
                urls.push(CssUrl {
                    span: start..end,
                    url: url.trim().to_string(),
                });
            }
            Token::Function(name) if name.eq_ignore_ascii_case("url") => {
                let mut found = None;
                let _ = parser.parse_nested_block(|p| {
                    if let Ok(Token::QuotedString(url)) = p.next() {
                        found = Some(url.to_string());
                    }
                    Ok::<_, CssParseError>(())
                });
                if let Some(url) = found {
                    let end = parser.position().byte_index();
                    urls.push(CssUrl {
                        span: start..end,
                        url: url.trim().to_string(),
                    });
                }
            }
            Token::Function(_)
            | Token::CurlyBracketBlock
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock => {
                let _ = parser.parse_nested_block(|p| {
                    scan_recursive(p, urls);
                    Ok::<_, CssParseError>(())
                });
            }
            _ => {}
        }
    }
}
