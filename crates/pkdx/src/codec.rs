//! 🔤 codec.rs: one CSV line in, a `Vec<String>` out. And back again, for the append path.
//!
//! 🎬 *[a comma walks into a quoted field]*
//! *["you can't split here," says the quote.]*
//! *[the comma sits down quietly. it has learned its place.]*
//!
//! 🧠 Knowledge graph:
//! - `parse_line`: RFC 4180 quoting on a single line. Doubled quotes are escapes.
//!   A bare quote inside an unquoted field is an error, like a strict CSV reader would say.
//! - `encode_row`: the inverse, quoting only the fields that need it.
//! - memchr does the scanning because it's already in the toolbox and it's very fast at
//!   finding one of two bytes. It was hired for newlines. It now also does commas. Promotion. 🦆
//! - Multi-line quoted fields are not a thing here. The dex is one record per line.

use memchr::{memchr, memchr2};

use crate::errors::{DexError, DexResult};

/// 🔪 Split one CSV line into its fields.
///
/// Returns `DexError::Decode` on unterminated quotes or stray quotes. The caller decides
/// whether that's fatal (spoiler: it never is, the row just gets skipped).
pub fn parse_line(line: &str) -> DexResult<Vec<String>> {
    let bytes = line.as_bytes();
    let mut fields = Vec::new();
    let mut pos = 0usize;

    loop {
        if bytes.get(pos) == Some(&b'"') {
            // -- 🎁 quoted field: everything up to the next lonely quote is ours
            let mut field = String::new();
            let mut cursor = pos + 1;
            loop {
                let Some(offset) = memchr(b'"', &bytes[cursor..]) else {
                    return Err(DexError::Decode(format!(
                        "unterminated quoted field starting at column {}",
                        pos + 1
                    )));
                };
                field.push_str(&line[cursor..cursor + offset]);
                let after_quote = cursor + offset + 1;
                if bytes.get(after_quote) == Some(&b'"') {
                    // -- "" is an escaped quote. the CSV spec's idea of a joke.
                    field.push('"');
                    cursor = after_quote + 1;
                } else {
                    cursor = after_quote;
                    break;
                }
            }
            fields.push(field);

            match bytes.get(cursor) {
                None => return Ok(fields),
                Some(b',') => pos = cursor + 1,
                Some(_) => {
                    return Err(DexError::Decode(format!(
                        "unexpected character after closing quote at column {}",
                        cursor + 1
                    )));
                }
            }
        } else {
            match memchr2(b',', b'"', &bytes[pos..]) {
                None => {
                    fields.push(line[pos..].to_string());
                    return Ok(fields);
                }
                Some(offset) if bytes[pos + offset] == b',' => {
                    fields.push(line[pos..pos + offset].to_string());
                    pos += offset + 1;
                }
                Some(offset) => {
                    return Err(DexError::Decode(format!(
                        "bare quote in unquoted field at column {}",
                        pos + offset + 1
                    )));
                }
            }
        }
    }
}

/// 🖊️ Render fields as one CSV line (no trailing newline).
pub fn encode_row<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = String::new();
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let field = field.as_ref();
        if needs_quotes(field) {
            line.push('"');
            line.push_str(&field.replace('"', "\"\""));
            line.push('"');
        } else {
            line.push_str(field);
        }
    }
    line
}

fn needs_quotes(field: &str) -> bool {
    memchr2(b',', b'"', field.as_bytes()).is_some()
        || memchr2(b'\n', b'\r', field.as_bytes()).is_some()
        || field.starts_with(' ')
        || field.ends_with(' ')
}
