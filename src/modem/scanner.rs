// SeismoNode: Streaming Token Matcher
//
// Bytes are fed one at a time. Each registered token keeps a count of how
// many of its bytes have been matched contiguously; a mismatching byte
// restarts the count at 1 if it is the token's first byte, otherwise at 0.
// No KMP failure function is needed: the AT vocabulary has no
// self-overlapping tokens.

/// Tokens beyond this count are ignored.
pub const MAX_TOKENS: usize = 8;

/// Partial-match state for one token.
#[derive(Debug, Clone, Copy)]
pub struct PendingToken<'t> {
    token: &'t [u8],
    matched: usize,
}

impl<'t> PendingToken<'t> {
    pub fn new(token: &'t [u8]) -> Self {
        Self { token, matched: 0 }
    }

    /// Advance with `byte`; returns `true` when the token just completed.
    pub fn feed(&mut self, byte: u8) -> bool {
        let Some(&first) = self.token.first() else {
            return false;
        };

        if byte == self.token[self.matched] {
            self.matched += 1;
            if self.matched == self.token.len() {
                self.matched = 0;
                return true;
            }
        } else {
            self.matched = usize::from(byte == first);
        }
        false
    }
}

/// Matches up to [`MAX_TOKENS`] tokens against the same byte stream.
#[derive(Debug, Clone)]
pub struct TokenScanner<'t> {
    pending: Vec<PendingToken<'t>>,
}

impl<'t> TokenScanner<'t> {
    pub fn new(tokens: &[&'t [u8]]) -> Self {
        Self {
            pending: tokens
                .iter()
                .take(MAX_TOKENS)
                .map(|&t| PendingToken::new(t))
                .collect(),
        }
    }

    /// Feed one byte. Returns the index of the lowest-numbered token that
    /// completes on this byte.
    pub fn feed(&mut self, byte: u8) -> Option<usize> {
        let mut hit = None;
        for (i, pending) in self.pending.iter_mut().enumerate() {
            if pending.feed(byte) && hit.is_none() {
                hit = Some(i);
            }
        }
        hit
    }

    /// Feed a chunk, stopping at the first completed token.
    pub fn feed_slice(&mut self, bytes: &[u8]) -> Option<usize> {
        bytes.iter().find_map(|&b| self.feed(b))
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_first_completed_token() {
        let mut scanner = TokenScanner::new(&[b"OK\r\n", b"ERROR\r\n"]);
        assert_eq!(scanner.feed_slice(b"\r\nbusy p...\r\nERROR\r\nOK\r\n"), Some(1));
    }

    #[test]
    fn no_match_yields_none() {
        let mut scanner = TokenScanner::new(&[b"SEND OK\r\n"]);
        assert_eq!(scanner.feed_slice(b"SEND FAIL\r\n"), None);
    }

    #[test]
    fn restarts_on_first_byte() {
        // "OOK": the second 'O' breaks the partial match but restarts it
        let mut scanner = TokenScanner::new(&[b"OK"]);
        assert_eq!(scanner.feed_slice(b"OOK"), Some(0));
    }

    #[test]
    fn lower_index_wins_on_same_byte() {
        let mut scanner = TokenScanner::new(&[b"no change\r\n", b"\r\n"]);
        assert_eq!(scanner.feed_slice(b"no change\r\n"), Some(0));

        let mut scanner = TokenScanner::new(&[b"K\r\n", b"OK\r\n"]);
        assert_eq!(scanner.feed_slice(b"OK\r\n"), Some(0));
    }

    #[test]
    fn chunking_does_not_change_result() {
        let stream: &[u8] = b"AT+CIPSTART=4\r\n\r\nALREADY CONNECTED\r\n\r\nERROR\r\n";
        let tokens: [&[u8]; 3] = [b"OK\r\n", b"ALREADY CONNECTED\r\n", b"ERROR\r\n"];

        let mut whole = TokenScanner::new(&tokens);
        let expected = whole.feed_slice(stream);
        assert_eq!(expected, Some(1));

        for chunk in 1..stream.len() {
            let mut scanner = TokenScanner::new(&tokens);
            let got = stream.chunks(chunk).find_map(|c| scanner.feed_slice(c));
            assert_eq!(got, expected, "chunk size {chunk}");
        }
    }

    #[test]
    fn tokens_past_eighth_are_ignored() {
        let tokens: [&[u8]; 9] = [
            b"a1", b"a2", b"a3", b"a4", b"a5", b"a6", b"a7", b"a8", b"NINE",
        ];
        let mut scanner = TokenScanner::new(&tokens);
        assert_eq!(scanner.len(), MAX_TOKENS);
        assert_eq!(scanner.feed_slice(b"NINE a8"), Some(7));
    }

    #[test]
    fn empty_token_never_matches() {
        let mut scanner = TokenScanner::new(&[b"", b">"]);
        assert_eq!(scanner.feed_slice(b"xx>"), Some(1));
    }
}
