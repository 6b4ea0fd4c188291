use std::io;

use serde::Serialize;
use serde_json::{ser::Formatter, Value};

use crate::tool_parser::errors::{ParserError, ParserResult};

/// Compact JSON with a space after each separator: `{"a": 1, "b": [1, 2]}`
#[derive(Debug, Clone, Copy, Default)]
pub struct CanonicalFormatter;

impl Formatter for CanonicalFormatter {
    #[inline]
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    #[inline]
    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(b": ")
    }
}

/// Serialize with first-appearance key order and canonical spacing.
pub fn to_canonical_json<T>(value: &T) -> ParserResult<String>
where
    T: ?Sized + Serialize,
{
    let mut buf = Vec::with_capacity(128);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, CanonicalFormatter);
    value.serialize(&mut ser)?;
    String::from_utf8(buf).map_err(|e| ParserError::ParsingFailed(e.to_string()))
}

/// Canonical text without its provisional tail.
pub fn stable_prefix(value: &Value, provisional_tail: usize) -> ParserResult<String> {
    let mut text = to_canonical_json(value)?;
    let keep = text.len().saturating_sub(provisional_tail);
    if !text.is_char_boundary(keep) {
        return Err(ParserError::ParsingFailed(format!(
            "Provisional tail {} splits a character",
            provisional_tail
        )));
    }
    text.truncate(keep);
    Ok(text)
}
