//! Libconfig text parser.
//!
//! Supports the subset of the format ndnrtc-client configurations use:
//! groups, lists, arrays, strings (escapes and adjacent-literal
//! concatenation), decimal and hex integers with an optional `L` suffix,
//! floats, booleans, and `#`, `//` and `/* */` comments.
//! `@include` directives are not supported.
//!
//! Parsing runs in two passes. The winnow grammar builds a raw tree that
//! remembers where each setting and array started, then lowering checks
//! duplicate names and array element kinds against those positions.

use winnow::ascii::{multispace1, till_line_ending};
use winnow::combinator::{alt, cut_err, eof, fail, opt, preceded, repeat, separated, terminated};
use winnow::error::{ContextError, ErrMode, StrContext, StrContextValue};
use winnow::prelude::*;
use winnow::token::{one_of, take_till, take_until, take_while};

use crate::error::{LibconfError, Result};
use crate::value::{Group, Value};

type PResult<T> = winnow::ModalResult<T>;

/// Deepest group, list or array nesting accepted.
pub const MAX_DEPTH: usize = 64;

const NESTING: &str = "nesting";

/// Parses a complete libconfig document.
pub fn parse(input: &str) -> Result<Group> {
    let mut rest = input;
    match document(&mut rest) {
        Ok(settings) => lower_group(input, settings),
        Err(err) => Err(grammar_error(input, rest.len(), err)),
    }
}

/// A setting as the grammar saw it. `at` is the length of the input left
/// when the setting's name started.
struct RawSetting<'i> {
    at: usize,
    name: &'i str,
    value: Raw<'i>,
}

enum Raw<'i> {
    Scalar(Value),
    Group(Vec<RawSetting<'i>>),
    List(Vec<Raw<'i>>),
    Array { at: usize, items: Vec<Raw<'i>> },
}

fn expected(what: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(what))
}

fn expected_char(c: char) -> StrContext {
    StrContext::Expected(StrContextValue::CharLiteral(c))
}

fn document<'i>(input: &mut &'i str) -> PResult<Vec<RawSetting<'i>>> {
    terminated(
        |i: &mut &'i str| settings(i, 0),
        cut_err(eof).context(expected("setting name")),
    )
    .parse_next(input)
}

fn trivia(input: &mut &str) -> PResult<()> {
    repeat(0.., alt((multispace1.void(), line_comment, block_comment))).parse_next(input)
}

fn line_comment(input: &mut &str) -> PResult<()> {
    (alt(("#", "//")), till_line_ending).void().parse_next(input)
}

fn block_comment(input: &mut &str) -> PResult<()> {
    (
        "/*",
        cut_err((take_until(0.., "*/"), "*/")).context(expected("end of comment")),
    )
        .void()
        .parse_next(input)
}

fn settings<'i>(input: &mut &'i str, depth: usize) -> PResult<Vec<RawSetting<'i>>> {
    trivia(input)?;
    repeat(0.., |i: &mut &'i str| setting(i, depth)).parse_next(input)
}

fn setting<'i>(input: &mut &'i str, depth: usize) -> PResult<RawSetting<'i>> {
    let at = input.len();
    let name = name.parse_next(input)?;
    trivia(input)?;
    cut_err(one_of(['=', ':']))
        .context(expected_char('='))
        .context(expected_char(':'))
        .parse_next(input)?;
    trivia(input)?;
    let value = cut_err(|i: &mut &'i str| value(i, depth)).parse_next(input)?;
    trivia(input)?;
    opt(one_of([';', ','])).parse_next(input)?;
    trivia(input)?;
    Ok(RawSetting { at, name, value })
}

fn name<'i>(input: &mut &'i str) -> PResult<&'i str> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '*'),
        take_while(0.., |c: char| {
            c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '*')
        }),
    )
        .take()
        .parse_next(input)
}

fn value<'i>(input: &mut &'i str, depth: usize) -> PResult<Raw<'i>> {
    if depth > MAX_DEPTH {
        return cut_err(fail).context(StrContext::Label(NESTING)).parse_next(input);
    }
    alt((
        |i: &mut &'i str| group(i, depth),
        |i: &mut &'i str| list(i, depth),
        |i: &mut &'i str| array(i, depth),
        string.map(|s| Raw::Scalar(Value::Str(s))),
        boolean.map(Raw::Scalar),
        number.map(Raw::Scalar),
    ))
    .context(expected("value"))
    .parse_next(input)
}

fn group<'i>(input: &mut &'i str, depth: usize) -> PResult<Raw<'i>> {
    '{'.parse_next(input)?;
    let settings = cut_err(|i: &mut &'i str| settings(i, depth + 1)).parse_next(input)?;
    cut_err('}').context(expected_char('}')).parse_next(input)?;
    Ok(Raw::Group(settings))
}

fn list<'i>(input: &mut &'i str, depth: usize) -> PResult<Raw<'i>> {
    '('.parse_next(input)?;
    let items = cut_err(|i: &mut &'i str| items(i, ')', depth + 1)).parse_next(input)?;
    Ok(Raw::List(items))
}

fn array<'i>(input: &mut &'i str, depth: usize) -> PResult<Raw<'i>> {
    let at = input.len();
    '['.parse_next(input)?;
    let items = cut_err(|i: &mut &'i str| items(i, ']', depth + 1)).parse_next(input)?;
    Ok(Raw::Array { at, items })
}

/// Comma separated values up to `close`, with an optional trailing comma.
fn items<'i>(input: &mut &'i str, close: char, depth: usize) -> PResult<Vec<Raw<'i>>> {
    trivia(input)?;
    let items: Vec<Raw<'i>> = separated(
        0..,
        terminated(|i: &mut &'i str| value(i, depth), trivia),
        terminated(',', trivia),
    )
    .parse_next(input)?;
    opt(terminated(',', trivia)).parse_next(input)?;
    cut_err(close).context(expected_char(close)).parse_next(input)?;
    Ok(items)
}

/// One or more string literals; adjacent literals concatenate.
fn string(input: &mut &str) -> PResult<String> {
    repeat(1.., terminated(string_literal, trivia))
        .fold(String::new, |mut acc, part: String| {
            acc.push_str(&part);
            acc
        })
        .parse_next(input)
}

enum Fragment<'i> {
    Literal(&'i str),
    Escaped(char),
}

fn string_literal(input: &mut &str) -> PResult<String> {
    '"'.parse_next(input)?;
    let text = repeat(0.., fragment)
        .fold(String::new, |mut acc, fragment| {
            match fragment {
                Fragment::Literal(s) => acc.push_str(s),
                Fragment::Escaped(c) => acc.push(c),
            }
            acc
        })
        .parse_next(input)?;
    cut_err('"').context(expected("closing quote")).parse_next(input)?;
    Ok(text)
}

fn fragment<'i>(input: &mut &'i str) -> PResult<Fragment<'i>> {
    alt((
        take_till(1.., ['"', '\\']).map(Fragment::Literal),
        preceded('\\', cut_err(escape)).map(Fragment::Escaped),
    ))
    .parse_next(input)
}

fn escape(input: &mut &str) -> PResult<char> {
    alt((
        'n'.value('\n'),
        't'.value('\t'),
        'r'.value('\r'),
        'f'.value('\u{0c}'),
        '\\'.value('\\'),
        '"'.value('"'),
        preceded('x', take_while(2, |c: char| c.is_ascii_hexdigit()))
            .verify_map(|hex: &str| u8::from_str_radix(hex, 16).ok().map(char::from)),
    ))
    .context(expected("escape sequence"))
    .parse_next(input)
}

fn boolean(input: &mut &str) -> PResult<Value> {
    take_while(1.., |c: char| c.is_ascii_alphabetic())
        .verify_map(|word: &str| {
            if word.eq_ignore_ascii_case("true") {
                Some(Value::Bool(true))
            } else if word.eq_ignore_ascii_case("false") {
                Some(Value::Bool(false))
            } else {
                None
            }
        })
        .parse_next(input)
}

fn number(input: &mut &str) -> PResult<Value> {
    (
        opt(one_of(['+', '-'])),
        take_while(1.., is_number_char),
        opt((one_of(['+', '-']), take_while(1.., is_number_char))),
    )
        .take()
        .verify_map(parse_number)
        .parse_next(input)
}

fn is_number_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.'
}

fn lower_group(source: &str, settings: Vec<RawSetting<'_>>) -> Result<Group> {
    let mut group = Group::new();
    for setting in settings {
        if group.get(setting.name).is_some() {
            return Err(LibconfError::DuplicateSetting {
                line: position(source, setting.at).0,
                name: setting.name.to_string(),
            });
        }
        let value = lower(source, setting.value)?;
        group.push(setting.name.to_string(), value);
    }
    Ok(group)
}

fn lower(source: &str, raw: Raw<'_>) -> Result<Value> {
    match raw {
        Raw::Scalar(value) => Ok(value),
        Raw::Group(settings) => lower_group(source, settings).map(Value::Group),
        Raw::List(items) => lower_items(source, items).map(Value::List),
        Raw::Array { at, items } => {
            let items = lower_items(source, items)?;
            check_array(position(source, at).0, &items)?;
            Ok(Value::Array(items))
        }
    }
}

fn lower_items(source: &str, items: Vec<Raw<'_>>) -> Result<Vec<Value>> {
    items.into_iter().map(|raw| lower(source, raw)).collect()
}

/// Line and column (both 1-based) of the point where `rest_len` bytes of
/// `source` remain.
fn position(source: &str, rest_len: usize) -> (usize, usize) {
    let offset = source.len().saturating_sub(rest_len);
    let consumed = source.get(..offset).unwrap_or(source);
    let line = consumed.matches('\n').count() + 1;
    let column = consumed.rsplit('\n').next().map_or(0, |l| l.chars().count()) + 1;
    (line, column)
}

fn grammar_error(source: &str, rest_len: usize, err: ErrMode<ContextError>) -> LibconfError {
    let (line, column) = position(source, rest_len);
    let context = match err {
        ErrMode::Backtrack(e) | ErrMode::Cut(e) => e,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    if context.context().any(|c| matches!(c, StrContext::Label(NESTING))) {
        return LibconfError::TooDeep {
            line,
            limit: MAX_DEPTH,
        };
    }

    let expected = context
        .context()
        .filter_map(|c| match c {
            StrContext::Expected(value) => Some(value.to_string()),
            _ => None,
        })
        .collect::<Vec<_>>();
    let expected = if expected.is_empty() {
        "valid syntax".to_string()
    } else {
        expected.join(" or ")
    };

    let rest = source.get(source.len().saturating_sub(rest_len)..).unwrap_or("");
    match rest.chars().next() {
        None => LibconfError::UnexpectedEof { line, expected },
        Some(found) => LibconfError::Syntax {
            line,
            column,
            message: format!("expected {expected}, found {found:?}"),
        },
    }
}

fn parse_number(token: &str) -> Option<Value> {
    let (negative, digits) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token.strip_prefix('+').unwrap_or(token)),
    };
    let sign = if negative { -1 } else { 1 };

    if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        let (hex, long) = strip_long_suffix(hex);
        let value = i64::from_str_radix(hex, 16).ok()? * sign;
        return Some(if long { Value::Int64(value) } else { Value::Int(value) });
    }

    if digits.contains(['.', 'e', 'E']) {
        return token.parse::<f64>().ok().map(Value::Float);
    }

    let (decimal, long) = strip_long_suffix(digits);
    if decimal.is_empty() || !decimal.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let value = decimal.parse::<i64>().ok()? * sign;
    Some(if long { Value::Int64(value) } else { Value::Int(value) })
}

fn strip_long_suffix(digits: &str) -> (&str, bool) {
    if let Some(rest) = digits.strip_suffix("LL") {
        (rest, true)
    } else if let Some(rest) = digits.strip_suffix('L') {
        (rest, true)
    } else {
        (digits, false)
    }
}

fn check_array(line: usize, items: &[Value]) -> Result<()> {
    let mut first: Option<&Value> = None;
    for item in items {
        if !item.is_scalar() {
            return Err(LibconfError::HeterogeneousArray {
                line,
                first: "scalar".to_string(),
                other: item.kind().to_string(),
            });
        }
        match first {
            None => first = Some(item),
            Some(head) if same_scalar_kind(head, item) => {}
            Some(head) => {
                return Err(LibconfError::HeterogeneousArray {
                    line,
                    first: head.kind().to_string(),
                    other: item.kind().to_string(),
                })
            }
        }
    }
    Ok(())
}

fn same_scalar_kind(a: &Value, b: &Value) -> bool {
    matches!(
        (a, b),
        (Value::Int(_) | Value::Int64(_), Value::Int(_) | Value::Int64(_))
            | (Value::Float(_), Value::Float(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Bool(_), Value::Bool(_))
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRODUCER: &str = r#"
        // producer settings
        general = {
            log_level = "default";
            log_path = "/tmp";
        };
        produce = {
            streams = ({
                type = "video";
                name = "camera";
                source = { name = "/tmp/camera"; type = "pipe"; };
                threads = ({ name = "t"; coder = { frame_rate = 30; max_bitrate = 10000; drop_frames = true; }; });
            });
        };
    "#;

    fn lookup<'a>(group: &'a Group, path: &[&str]) -> Option<&'a Value> {
        let (last, parents) = path.split_last()?;
        let mut current = group;
        for name in parents {
            current = current.get(name)?.as_group()?;
        }
        current.get(last)
    }

    #[test]
    fn test_parse_producer_document() {
        let doc = parse(PRODUCER).unwrap();
        assert_eq!(
            lookup(&doc, &["general", "log_level"]).and_then(Value::as_str),
            Some("default")
        );

        let streams = lookup(&doc, &["produce", "streams"])
            .and_then(Value::as_items)
            .unwrap();
        let stream = streams.first().and_then(Value::as_group).unwrap();
        assert_eq!(stream.get("name").and_then(Value::as_str), Some("camera"));
        assert_eq!(
            lookup(stream, &["source", "type"]).and_then(Value::as_str),
            Some("pipe")
        );

        let thread = stream
            .get("threads")
            .and_then(Value::as_items)
            .and_then(|t| t.first())
            .and_then(Value::as_group)
            .unwrap();
        assert_eq!(lookup(thread, &["coder", "frame_rate"]).and_then(Value::as_i64), Some(30));
        assert_eq!(lookup(thread, &["coder", "drop_frames"]).and_then(Value::as_bool), Some(true));
    }

    #[test]
    fn test_scalars() {
        let doc = parse(
            "a = 0x1F; b = 42L; c = -3; d = 1.5e3; e = .5; f = FALSE; g = \"x\\ty\\\"\" \"z\";",
        )
        .unwrap();
        assert_eq!(doc.get("a"), Some(&Value::Int(31)));
        assert_eq!(doc.get("b"), Some(&Value::Int64(42)));
        assert_eq!(doc.get("c"), Some(&Value::Int(-3)));
        assert_eq!(doc.get("d"), Some(&Value::Float(1500.0)));
        assert_eq!(doc.get("e"), Some(&Value::Float(0.5)));
        assert_eq!(doc.get("f"), Some(&Value::Bool(false)));
        assert_eq!(doc.get("g").and_then(Value::as_str), Some("x\ty\"z"));
    }

    #[test]
    fn test_colon_separator_and_comments() {
        let doc = parse("# hash\n/* block\ncomment */ name : \"v\"\n other = [1, 2, 3]").unwrap();
        assert_eq!(doc.get("name").and_then(Value::as_str), Some("v"));
        assert_eq!(
            doc.get("other"),
            Some(&Value::Array(vec![Value::Int(1), Value::Int(2), Value::Int(3)]))
        );
    }

    #[test]
    fn test_negative_exponent() {
        let doc = parse("x = 2.5e-2;").unwrap();
        assert_eq!(doc.get("x"), Some(&Value::Float(0.025)));
    }

    #[test]
    fn test_heterogeneous_array_rejected() {
        let err = parse("x = [1, \"two\"];").unwrap_err();
        assert!(matches!(err, LibconfError::HeterogeneousArray { .. }));
    }

    #[test]
    fn test_duplicate_setting_rejected() {
        let err = parse("x = 1;\nx = 2;").unwrap_err();
        assert_eq!(
            err,
            LibconfError::DuplicateSetting {
                line: 2,
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn test_unterminated_group() {
        let err = parse("general = { log_level = \"all\";").unwrap_err();
        assert!(matches!(err, LibconfError::UnexpectedEof { .. }));
    }

    #[test]
    fn test_missing_equals() {
        let err = parse("general { }").unwrap_err();
        assert!(matches!(err, LibconfError::Syntax { line: 1, .. }));
    }

    #[test]
    fn test_bad_word() {
        assert!(parse("x = maybe;").is_err());
        assert!(parse("x = 12abc;").is_err());
    }

    #[test]
    fn test_syntax_error_position() {
        let err = parse("a = 1;\nb  ? 2;").unwrap_err();
        match err {
            LibconfError::Syntax { line, column, message } => {
                assert_eq!((line, column), (2, 4));
                assert!(message.contains("`=`"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unterminated_string() {
        let err = parse("x = \"open;").unwrap_err();
        assert!(matches!(err, LibconfError::UnexpectedEof { line: 1, .. }));
    }

    #[test]
    fn test_trailing_comma_and_empty_containers() {
        let doc = parse("a = (1, 2,); b = []; c = {}; d = ();").unwrap();
        assert_eq!(doc.get("a"), Some(&Value::List(vec![Value::Int(1), Value::Int(2)])));
        assert_eq!(doc.get("b"), Some(&Value::Array(Vec::new())));
        assert_eq!(doc.get("c"), Some(&Value::Group(Group::new())));
        assert_eq!(doc.get("d"), Some(&Value::List(Vec::new())));
    }

    #[test]
    fn test_deep_nesting_rejected() {
        let input = format!("x = {}", "(".repeat(10_000));
        let err = parse(&input).unwrap_err();
        assert_eq!(
            err,
            LibconfError::TooDeep {
                line: 1,
                limit: MAX_DEPTH
            }
        );
    }

    #[test]
    fn test_nesting_at_limit_accepted() {
        let input = format!("x = {}1{};", "(".repeat(MAX_DEPTH), ")".repeat(MAX_DEPTH));
        assert!(parse(&input).is_ok());
    }
}
