// ABOUTME: Minimal nom-based reader: text -> Cons-based Value forms

use nom::{
    branch::alt,
    bytes::complete::{escaped, tag, take_while, take_while1},
    character::complete::{char, digit1, multispace1, none_of, one_of},
    combinator::{map, opt, recognize, value},
    multi::many0,
    sequence::preceded,
    IResult, Parser,
};

use crate::value::Value;

/// Skips whitespace and `;`-to-end-of-line comments. No doc-comment
/// extraction or other authoring conveniences are implemented here.
fn ws_and_comments(input: &str) -> IResult<&str, ()> {
    let comment = (char(';'), take_while(|c| c != '\n'));
    many0(alt((value((), multispace1), value((), comment))))
        .map(|_| ())
        .parse(input)
}

fn parse_number(input: &str) -> IResult<&str, Value> {
    map(
        recognize((
            opt(char('-')),
            alt((
                recognize((digit1, opt((char('.'), digit1)))),
                recognize((char('.'), digit1)),
            )),
        )),
        |text: &str| {
            if text.contains('.') {
                Value::Float(text.parse().expect("recognized float literal"))
            } else {
                Value::Int(text.parse().expect("recognized int literal"))
            }
        },
    )
    .parse(input)
}

fn parse_bool(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Bool(true), tag("#t")),
        value(Value::Bool(false), tag("#f")),
    ))
    .parse(input)
}

const SYMBOL_SPECIALS: &str = "+-*/%<>=!?&";

fn is_symbol_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || SYMBOL_SPECIALS.contains(c)
}

fn parse_symbol(input: &str) -> IResult<&str, Value> {
    let mut first_chars = String::with_capacity(64);
    first_chars.push_str("abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ");
    first_chars.push_str(SYMBOL_SPECIALS);
    let (input, first) = one_of(first_chars.as_str())(input)?;
    let (input, rest) =
        take_while1::<_, _, nom::error::Error<_>>(is_symbol_char)(input).unwrap_or((input, ""));
    let mut name = String::new();
    name.push(first);
    name.push_str(rest);
    // `true`/`false` read as the Bool singletons rather than symbols that
    // would need binding; `#t`/`#f` remain the terser equivalent spelling.
    let value = match name.as_str() {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::symbol(&name),
    };
    Ok((input, value))
}

fn parse_keyword(input: &str) -> IResult<&str, Value> {
    let (input, _) = char(':')(input)?;
    let (input, name) = take_while1(is_symbol_char)(input)?;
    Ok((input, Value::keyword(name)))
}

fn parse_string(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('"')(input)?;
    if let Ok((input, _)) = char::<_, nom::error::Error<_>>('"')(input) {
        return Ok((input, Value::string("")));
    }
    let (input, content) = escaped(none_of("\"\\"), '\\', one_of("\"\\nt"))(input)?;
    let (input, _) = char('"')(input)?;

    let mut result = String::new();
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => result.push('\n'),
                Some('t') => result.push('\t'),
                Some('\\') => result.push('\\'),
                Some('"') => result.push('"'),
                Some(other) => {
                    result.push('\\');
                    result.push(other);
                }
                None => result.push('\\'),
            }
        } else {
            result.push(c);
        }
    }
    Ok((input, Value::string(result)))
}

/// `'x` desugars to `(quote x)`, the only reader-level sugar this crate
/// carries.
fn parse_quote(input: &str) -> IResult<&str, Value> {
    let (input, expr) = preceded(char('\''), parse_expr)(input)?;
    Ok((input, Value::list(vec![Value::symbol("quote"), expr])))
}

fn parse_list(input: &str) -> IResult<&str, Value> {
    let (input, _) = char('(')(input)?;
    let (input, _) = ws_and_comments(input)?;
    let mut items = Vec::new();
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = char::<_, nom::error::Error<_>>(')')(remaining) {
            return Ok((rest, Value::list(items)));
        }
        let (rest, expr) = parse_expr(remaining)?;
        items.push(expr);
        let (rest, _) = ws_and_comments(rest)?;
        remaining = rest;
    }
}

fn parse_expr(input: &str) -> IResult<&str, Value> {
    let (input, _) = ws_and_comments(input)?;
    alt((
        parse_quote,
        parse_list,
        parse_bool,
        parse_number,
        parse_string,
        parse_keyword,
        parse_symbol,
    ))
    .parse(input)
}

/// Reads every top-level form out of `text` in order. Symbols intern
/// through the global thread-local table in `src/interner.rs`, so no
/// environment parameter is needed to read a string of source text.
pub fn read_string(text: &str) -> Result<Vec<Value>, String> {
    let mut forms = Vec::new();
    let mut remaining = text;
    loop {
        let (rest, _) = ws_and_comments(remaining).map_err(|e| format!("{e:?}"))?;
        if rest.is_empty() {
            return Ok(forms);
        }
        let (rest, form) = parse_expr(rest).map_err(|e| format!("Parse error: {e:?}"))?;
        forms.push(form);
        remaining = rest;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_integers_and_floats_distinctly() {
        assert!(matches!(read_string("42").unwrap()[..], [Value::Int(42)]));
        assert!(matches!(read_string("-7").unwrap()[..], [Value::Int(-7)]));
        let floats = read_string("3.5").unwrap();
        assert!(matches!(floats[0], Value::Float(n) if (n - 3.5).abs() < 0.0001));
    }

    #[test]
    fn reads_booleans_and_strings() {
        assert!(matches!(read_string("#t").unwrap()[..], [Value::Bool(true)]));
        assert!(matches!(read_string("#f").unwrap()[..], [Value::Bool(false)]));
        let s = read_string(r#""hello\nworld""#).unwrap();
        assert_eq!(s[0].to_string(), "\"hello\nworld\"");
    }

    #[test]
    fn true_and_false_are_bareword_synonyms_for_the_hash_spellings() {
        assert!(matches!(read_string("true").unwrap()[..], [Value::Bool(true)]));
        assert!(matches!(read_string("false").unwrap()[..], [Value::Bool(false)]));
    }

    #[test]
    fn reads_symbols_including_rest_marker_and_operators() {
        for (src, expected) in [("foo-bar", "foo-bar"), ("&", "&"), ("<=", "<="), ("+", "+")] {
            let forms = read_string(src).unwrap();
            assert_eq!(forms[0].to_string(), expected);
        }
    }

    #[test]
    fn reads_keywords() {
        let forms = read_string(":name").unwrap();
        assert_eq!(forms[0].to_string(), ":name");
    }

    #[test]
    fn empty_list_reads_as_nil() {
        assert!(read_string("()").unwrap()[0].is_nil());
    }

    #[test]
    fn reads_nested_proper_lists() {
        let forms = read_string("(1 (2 3) 4)").unwrap();
        assert_eq!(forms[0].to_string(), "(1 (2 3) 4)");
    }

    #[test]
    fn quote_shorthand_desugars_to_quote_form() {
        let forms = read_string("'(a b)").unwrap();
        assert_eq!(forms[0].to_string(), "(quote (a b))");
    }

    #[test]
    fn reads_multiple_top_level_forms_in_order() {
        let forms = read_string("(def a 1) (def b 2)").unwrap();
        assert_eq!(forms.len(), 2);
        assert_eq!(forms[0].to_string(), "(def a 1)");
        assert_eq!(forms[1].to_string(), "(def b 2)");
    }

    #[test]
    fn skips_comments() {
        let forms = read_string("; leading comment\n42 ; trailing\n").unwrap();
        assert!(matches!(forms[..], [Value::Int(42)]));
    }

    #[test]
    fn unclosed_list_is_a_parse_error() {
        assert!(read_string("(1 2").is_err());
    }
}
