use crate::error::{NpyError, NpyResult};
use crate::types::ElementType;

// ---------------------------------------------------------------------------
// Descriptor tokens
// ---------------------------------------------------------------------------

/// Map a `descr` value (quotes already removed, e.g. `"<f4"`, `"|b1"`, `"d"`)
/// to its element type.
///
/// `=`, `<` and `|` prefixes are dropped and little-endian is assumed; a `>`
/// prefix is refused.
pub fn parse_descr(token: &str) -> NpyResult<ElementType> {
    let token = token.trim();
    if token.is_empty() {
        return Err(NpyError::Format("no descr in header".into()));
    }
    if token.starts_with('>') {
        return Err(NpyError::Format(format!(
            "big-endian descr {token} not supported"
        )));
    }

    let code = token.trim_start_matches(['=', '<', '|']);
    let dtype = match code {
        "e" | "f2" => ElementType::F16,
        "f" | "f4" => ElementType::F32,
        "d" | "f8" => ElementType::F64,
        "q" | "i8" => ElementType::I64,
        "B" | "u1" => ElementType::U8,
        // bool has no representation of its own
        "?" | "b1" => ElementType::U8,
        "I" | "u4" => ElementType::U32,
        _ => return Err(NpyError::Format(format!("unrecognized descr {token}"))),
    };
    Ok(dtype)
}

/// Canonical width-suffixed code emitted on write, without the byte-order
/// prefix. bf16 and f8e4m3 have none.
pub fn canonical_descr(dtype: ElementType) -> NpyResult<&'static str> {
    match dtype {
        ElementType::F16 => Ok("f2"),
        ElementType::F32 => Ok("f4"),
        ElementType::F64 => Ok("f8"),
        ElementType::I64 => Ok("i8"),
        ElementType::U8 => Ok("u1"),
        ElementType::U32 => Ok("u4"),
        ElementType::BF16 | ElementType::F8E4M3 => Err(NpyError::UnsupportedType(format!(
            "{dtype} is not supported for writing"
        ))),
    }
}
