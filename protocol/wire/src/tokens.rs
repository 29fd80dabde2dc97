//! Quoting-aware request tokenizer.
//!
//! Requests are sequences of whitespace-separated words; a double-quoted
//! span counts as one word with its quotes stripped. The server uses
//! [`locations`] to find the command word without copying, and [`to_bytes`]
//! to materialize argument lists for handlers registered in argv mode.

/// Byte ranges of the tokens in `input`, in order.
///
/// Each range is `(start, end)` of the token content; for a quoted token
/// the quotes sit outside the range. An unterminated quote runs to the end
/// of the input.
pub fn locations(input: &[u8]) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < input.len() {
        if input[i].is_ascii_whitespace() {
            i += 1;
            continue;
        }
        if input[i] == b'"' {
            let start = i + 1;
            let mut j = start;
            while j < input.len() && input[j] != b'"' {
                j += 1;
            }
            out.push((start, j));
            i = if j < input.len() { j + 1 } else { j };
        } else {
            let start = i;
            while i < input.len() && !input[i].is_ascii_whitespace() {
                i += 1;
            }
            out.push((start, i));
        }
    }
    out
}

/// The tokens of `input`, materialized as owned byte strings.
pub fn to_bytes(input: &[u8]) -> Vec<Vec<u8>> {
    locations(input)
        .into_iter()
        .map(|(start, end)| input[start..end].to_vec())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_words() {
        let toks = to_bytes(b"just the one test");
        assert_eq!(toks, vec![b"just".to_vec(), b"the".to_vec(), b"one".to_vec(), b"test".to_vec()]);
    }

    #[test]
    fn leading_and_repeated_whitespace() {
        let toks = to_bytes(b"  a \t b  ");
        assert_eq!(toks, vec![b"a".to_vec(), b"b".to_vec()]);
    }

    #[test]
    fn quoted_span_is_one_token() {
        let toks = to_bytes(br#"foo "bar baz" quux"#);
        assert_eq!(toks, vec![b"foo".to_vec(), b"bar baz".to_vec(), b"quux".to_vec()]);
    }

    #[test]
    fn unterminated_quote_runs_to_end() {
        let toks = to_bytes(br#"a "b c"#);
        assert_eq!(toks, vec![b"a".to_vec(), b"b c".to_vec()]);
    }

    #[test]
    fn empty_input() {
        assert!(locations(b"").is_empty());
        assert!(locations(b"   ").is_empty());
    }

    #[test]
    fn locations_index_original_bytes() {
        let input = b"echo it works!";
        let locs = locations(input);
        assert_eq!(&input[locs[0].0..locs[0].1], b"echo");
        // The argument payload is everything from the second token on.
        assert_eq!(&input[locs[1].0..], b"it works!");
    }
}
