use std::borrow::Cow;

use memchr::{memchr, memchr2};

/// Splits one CSV line into fields, honouring double quotes.
///
/// Outer quotes are stripped from quoted fields; `""` escapes inside them
/// are left for [`field_str`] to undo. Quoted newlines are not supported.
pub fn split_fields<'a>(line: &'a [u8], out: &mut Vec<&'a [u8]>) {
    out.clear();
    let mut pos = 0;

    loop {
        if line.get(pos) == Some(&b'"') {
            // Quoted field: find the closing quote that is not doubled
            let start = pos + 1;
            let mut cursor = start;
            let end = loop {
                match memchr(b'"', &line[cursor..]) {
                    Some(rel) => {
                        let q = cursor + rel;
                        if line.get(q + 1) == Some(&b'"') {
                            cursor = q + 2;
                        } else {
                            break q;
                        }
                    }
                    None => break line.len(),
                }
            };
            out.push(&line[start..end]);

            // skip to the next delimiter after the closing quote
            let after = (end + 1).min(line.len());
            match memchr(b',', &line[after..]) {
                Some(rel) => pos = after + rel + 1,
                None => return,
            }
        } else {
            match memchr2(b',', b'"', &line[pos..]) {
                Some(rel) if line[pos + rel] == b',' => {
                    out.push(&line[pos..pos + rel]);
                    pos += rel + 1;
                }
                // stray quote inside an unquoted field: treat it literally
                Some(_) | None => match memchr(b',', &line[pos..]) {
                    Some(rel) => {
                        out.push(&line[pos..pos + rel]);
                        pos += rel + 1;
                    }
                    None => {
                        out.push(&line[pos..]);
                        return;
                    }
                },
            }
        }
    }
}

/// Decodes a field, undoing `""` escapes.
pub fn field_str(field: &[u8]) -> Cow<'_, str> {
    let s = String::from_utf8_lossy(field);
    if s.contains("\"\"") {
        Cow::Owned(s.replace("\"\"", "\""))
    } else {
        s
    }
}

/// Strips a trailing carriage return.
pub fn trim_cr(line: &[u8]) -> &[u8] {
    match line.last() {
        Some(b'\r') => &line[..line.len() - 1],
        _ => line,
    }
}
