//! Libconfig text writer.
//!
//! Output layout follows the style ndnrtc sample configs use: groups and
//! lists open on their own line, scalars and arrays stay inline, and
//! every setting ends with `;`.

use std::fmt::{self, Write};

use crate::value::{Group, Value};

const INDENT: &str = "    ";

/// Serializes a document.
pub fn to_string(group: &Group) -> String {
    group.to_string()
}

fn indent<W: Write + ?Sized>(out: &mut W, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        out.write_str(INDENT)?;
    }
    Ok(())
}

pub(crate) fn write_settings<W: Write + ?Sized>(out: &mut W, group: &Group, depth: usize) -> fmt::Result {
    for (name, value) in group.iter() {
        indent(out, depth)?;
        write!(out, "{name} =")?;
        match value {
            Value::Group(inner) => {
                out.write_char('\n')?;
                indent(out, depth)?;
                out.write_str("{\n")?;
                write_settings(out, inner, depth + 1)?;
                indent(out, depth)?;
                out.write_str("};\n")?;
            }
            Value::List(items) => {
                out.write_char('\n')?;
                indent(out, depth)?;
                out.write_str("(\n")?;
                write_items(out, items, depth + 1)?;
                indent(out, depth)?;
                out.write_str(");\n")?;
            }
            scalar => {
                out.write_char(' ')?;
                write_inline(out, scalar)?;
                out.write_str(";\n")?;
            }
        }
    }
    Ok(())
}

fn write_items<W: Write + ?Sized>(out: &mut W, items: &[Value], depth: usize) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        let separator = if i + 1 < items.len() { "," } else { "" };
        indent(out, depth)?;
        match item {
            Value::Group(inner) => {
                out.write_str("{\n")?;
                write_settings(out, inner, depth + 1)?;
                indent(out, depth)?;
                out.write_char('}')?;
            }
            Value::List(inner) => {
                out.write_str("(\n")?;
                write_items(out, inner, depth + 1)?;
                indent(out, depth)?;
                out.write_char(')')?;
            }
            scalar => write_inline(out, scalar)?,
        }
        out.write_str(separator)?;
        out.write_char('\n')?;
    }
    Ok(())
}

fn write_inline<W: Write + ?Sized>(out: &mut W, value: &Value) -> fmt::Result {
    match value {
        Value::Bool(v) => write!(out, "{v}"),
        Value::Int(v) if i32::try_from(*v).is_ok() => write!(out, "{v}"),
        Value::Int(v) | Value::Int64(v) => write!(out, "{v}L"),
        Value::Float(v) => write!(out, "{v:?}"),
        Value::Str(s) => write_quoted(out, s),
        Value::Array(items) | Value::List(items) => {
            let (open, close) = if matches!(value, Value::Array(_)) {
                ('[', ']')
            } else {
                ('(', ')')
            };
            out.write_char(open)?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.write_str(", ")?;
                }
                write_inline(out, item)?;
            }
            out.write_char(close)
        }
        Value::Group(inner) => {
            out.write_char('{')?;
            for (name, item) in inner.iter() {
                write!(out, " {name} = ")?;
                write_inline(out, item)?;
                out.write_char(';')?;
            }
            out.write_str(" }")
        }
    }
}

fn write_quoted<W: Write + ?Sized>(out: &mut W, s: &str) -> fmt::Result {
    out.write_char('"')?;
    for c in s.chars() {
        match c {
            '"' => out.write_str("\\\"")?,
            '\\' => out.write_str("\\\\")?,
            '\n' => out.write_str("\\n")?,
            '\r' => out.write_str("\\r")?,
            '\t' => out.write_str("\\t")?,
            '\u{0c}' => out.write_str("\\f")?,
            c if u32::from(c) < 0x20 => write!(out, "\\x{:02x}", u32::from(c))?,
            c => out.write_char(c)?,
        }
    }
    out.write_char('"')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::parse;

    #[test]
    fn test_layout() {
        let mut source = Group::new();
        source.set("name", "/tmp/camera");
        source.set("type", "pipe");
        let mut stream = Group::new();
        stream.set("source", source);
        let mut produce = Group::new();
        produce.set("streams", Value::List(vec![Value::Group(stream)]));
        let mut doc = Group::new();
        doc.set("produce", produce);

        let expected = "\
produce =
{
    streams =
    (
        {
            source =
            {
                name = \"/tmp/camera\";
                type = \"pipe\";
            };
        }
    );
};
";
        assert_eq!(to_string(&doc), expected);
    }

    #[test]
    fn test_scalars_reparse_identically() {
        let mut doc = Group::new();
        doc.set("quote", "say \"hi\"\\\n");
        doc.set("big", Value::Int(1 << 40));
        doc.set("long", Value::Int64(7));
        doc.set("ratio", Value::Float(2.0));
        doc.set("flags", Value::Array(vec![Value::Bool(true), Value::Bool(false)]));
        doc.set("mixed", Value::List(vec![Value::Int(1), Value::from("a")]));

        let text = to_string(&doc);
        assert!(text.contains("big = 1099511627776L;"));
        assert!(text.contains("ratio = 2.0;"));
        assert!(text.contains("flags = [true, false];"));

        let reparsed = parse(&text).unwrap();
        assert_eq!(reparsed.get("quote"), doc.get("quote"));
        assert_eq!(reparsed.get("big"), Some(&Value::Int64(1 << 40)));
        assert_eq!(reparsed.get("long"), Some(&Value::Int64(7)));
        assert_eq!(reparsed.get("ratio"), doc.get("ratio"));
        assert_eq!(reparsed.get("flags"), doc.get("flags"));
        assert_eq!(reparsed.get("mixed"), doc.get("mixed"));
    }

    #[test]
    fn test_control_characters_are_hex_escaped() {
        let mut doc = Group::new();
        doc.set("bell", "\u{07}");
        assert_eq!(to_string(&doc), "bell = \"\\x07\";\n");
        assert_eq!(parse(&to_string(&doc)).unwrap().get("bell"), doc.get("bell"));
    }
}
