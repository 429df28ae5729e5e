// Copyright 2015 Ted Mielczarek. See the COPYRIGHT
// file at the top-level directory of this distribution.

//! Split a symbol-file record line into whitespace-delimited fields.

/// Split `line` into at most `max_tokens` fields on runs of ASCII space,
/// `\r`, and `\n`.
///
/// The final field, once `max_tokens - 1` fields have already been taken,
/// extends to the end of the line (minus any trailing `\r`/`\n`) rather
/// than being split further, so that multi-word function names and
/// `STACK WIN` program strings survive intact.
///
/// Returns the tokens found together with whether exactly `max_tokens` of
/// them were produced; a caller should treat `false` as a malformed record.
///
/// The original C++ tokenizer has a bug where this final-field-absorbs-the-
/// rest behavior is accidentally suppressed (`if (!remaining > 0)` parses as
/// `if ((!remaining) > 0)`, which is always false). This implementation
/// deliberately does the intended thing instead.
pub fn tokenize(line: &str, max_tokens: usize) -> (Vec<&str>, bool) {
    let mut tokens = Vec::with_capacity(max_tokens);
    let mut rest = line;

    if max_tokens == 0 {
        return (tokens, true);
    }

    while tokens.len() + 1 < max_tokens {
        rest = trim_leading_delims(rest);
        let split_at = rest.find(is_delim);
        match split_at {
            Some(idx) if idx > 0 => {
                tokens.push(&rest[..idx]);
                rest = &rest[idx..];
            }
            _ => return (tokens, false),
        }
    }

    let last = trim_trailing_crlf(trim_leading_delims(rest));
    if last.is_empty() {
        return (tokens, false);
    }
    tokens.push(last);
    (tokens, tokens.len() == max_tokens)
}

fn is_delim(c: char) -> bool {
    c == ' ' || c == '\r' || c == '\n'
}

fn trim_leading_delims(s: &str) -> &str {
    s.trim_start_matches(is_delim)
}

fn trim_trailing_crlf(s: &str) -> &str {
    s.trim_end_matches(|c| c == '\r' || c == '\n')
}
