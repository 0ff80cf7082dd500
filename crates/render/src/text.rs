use eveleve_core::models::MESSAGE_LIMIT;

/// Largest chunk a plain text message is split into.
pub const CHUNK_LIMIT: usize = MESSAGE_LIMIT - 1;

/// Split text that exceeds the message ceiling into chunks of at most
/// [`CHUNK_LIMIT`] characters, packing whole lines greedily.
pub fn split_message(text: &str) -> Vec<String> { split_lines(text, CHUNK_LIMIT) }

/// Lines are joined back with `\n`; a line that alone exceeds `limit` is cut
/// on character boundaries.
pub fn split_lines(text: &str, limit: usize) -> Vec<String> {
    assert!(limit > 0, "chunk limit must be positive");
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }
    let mut chunks = Vec::new();
    // Current chunk and its length in characters
    let mut current: Option<(String, usize)> = None;
    for line in text.split('\n') {
        let line_len = line.chars().count();
        if line_len > limit {
            if let Some((chunk, _)) = current.take() {
                chunks.push(chunk);
            }
            let chars: Vec<char> = line.chars().collect();
            let mut pieces = chars.chunks(limit).map(|c| c.iter().collect::<String>()).peekable();
            while let Some(piece) = pieces.next() {
                if pieces.peek().is_some() {
                    chunks.push(piece);
                } else {
                    let len = piece.chars().count();
                    current = Some((piece, len));
                }
            }
            continue;
        }
        current = match current.take() {
            Some((mut chunk, len)) if len + 1 + line_len <= limit => {
                chunk.push('\n');
                chunk.push_str(line);
                Some((chunk, len + 1 + line_len))
            }
            Some((chunk, _)) => {
                chunks.push(chunk);
                Some((line.to_string(), line_len))
            }
            None => Some((line.to_string(), line_len)),
        };
    }
    if let Some((chunk, _)) = current {
        chunks.push(chunk);
    }
    chunks
}
