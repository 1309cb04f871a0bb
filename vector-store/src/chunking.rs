//! Fixed-window text chunking for ingestion.

use crate::errors::VectorStoreError;

pub const DEFAULT_MAX_CHARS: usize = 10_000;
pub const DEFAULT_OVERLAP: usize = 200;

/// A chunk ready for [`crate::VectorStore::upsert`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Chunk {
    pub id: u64,
    pub text: String,
}

/// Splits `text` into windows of at most `max_chars` characters, each
/// starting `max_chars - overlap` characters after the previous one.
///
/// Windows are counted in chars, never splitting a UTF-8 sequence. The last
/// window ends exactly at the end of the input.
pub fn chunk_text(
    text: &str,
    max_chars: usize,
    overlap: usize,
) -> Result<Vec<String>, VectorStoreError> {
    if max_chars == 0 {
        return Err(VectorStoreError::Config("max_chars must be > 0".into()));
    }
    if overlap >= max_chars {
        return Err(VectorStoreError::Config(format!(
            "overlap ({overlap}) must be smaller than max_chars ({max_chars})"
        )));
    }

    // Byte offset of every char, plus the end.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let len = bounds.len() - 1;

    let mut out = Vec::new();
    let mut start = 0usize;
    while start < len {
        let end = (start + max_chars).min(len);
        out.push(text[bounds[start]..bounds[end]].to_string());
        if end == len {
            break;
        }
        start = end - overlap;
    }
    Ok(out)
}

/// Chunks every document and numbers the chunks sequentially from `first_id`.
pub fn chunk_documents<'a, I>(
    docs: I,
    first_id: u64,
    max_chars: usize,
    overlap: usize,
) -> Result<Vec<Chunk>, VectorStoreError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut next = first_id;
    let mut out = Vec::new();
    for doc in docs {
        for text in chunk_text(doc, max_chars, overlap)? {
            out.push(Chunk { id: next, text });
            next += 1;
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn windows_overlap_and_cover_the_input() {
        let text: String = ('a'..='y').collect();
        let chunks = chunk_text(&text, 10, 2).unwrap();
        assert_eq!(chunks, vec!["abcdefghij", "ijklmnopqr", "qrstuvwxy"]);
    }

    #[test]
    fn short_and_empty_inputs() {
        assert_eq!(chunk_text("short", 10, 2).unwrap(), vec!["short"]);
        assert!(chunk_text("", 10, 2).unwrap().is_empty());
    }

    #[test]
    fn exact_multiple_does_not_emit_a_tail() {
        let chunks = chunk_text("abcdefghij", 10, 3).unwrap();
        assert_eq!(chunks, vec!["abcdefghij"]);
    }

    #[test]
    fn multibyte_text_is_split_on_char_boundaries() {
        let text = "§§§§§ééééé";
        let chunks = chunk_text(text, 4, 1).unwrap();
        assert_eq!(chunks, vec!["§§§§", "§§éé", "éééé"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 4));
    }

    #[test]
    fn bad_overlap_is_rejected() {
        assert!(matches!(chunk_text("abc", 5, 5), Err(VectorStoreError::Config(_))));
        assert!(chunk_text("abc", 0, 0).is_err());
    }

    #[test]
    fn documents_get_sequential_ids() {
        let chunks = chunk_documents(["abcdef", "xy"], 100, 4, 1).unwrap();
        let ids: Vec<u64> = chunks.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![100, 101, 102]);
        assert_eq!(chunks[2].text, "xy");
    }
}
