/// Text recognized from one audio buffer, tagged with that buffer's index.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionResult {
    pub index: usize,
    pub text: String,
}

impl RecognitionResult {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Non-empty recognition results in ascending sequence order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Transcript {
    entries: Vec<RecognitionResult>,
}

impl Transcript {
    /// Builds a transcript from results collected in any order.
    ///
    /// Results are sorted by sequence index before empty ones are dropped, so
    /// completion order never leaks into the output.
    pub fn assemble(mut results: Vec<RecognitionResult>) -> Self {
        results.sort_by_key(|r| r.index);
        results.retain(|r| !r.is_empty());
        Self { entries: results }
    }

    pub fn entries(&self) -> &[RecognitionResult] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assemble_sorts_by_index() {
        let transcript = Transcript::assemble(vec![
            RecognitionResult::new(2, "c"),
            RecognitionResult::new(0, "a"),
            RecognitionResult::new(1, "b"),
        ]);
        let indices: Vec<usize> = transcript.entries().iter().map(|e| e.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_assemble_drops_empty_and_whitespace_text() {
        let transcript = Transcript::assemble(vec![
            RecognitionResult::new(3, "world"),
            RecognitionResult::new(1, ""),
            RecognitionResult::new(0, "hello"),
            RecognitionResult::new(2, "   "),
        ]);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.entries()[0], RecognitionResult::new(0, "hello"));
        assert_eq!(transcript.entries()[1], RecognitionResult::new(3, "world"));
    }

    #[test]
    fn test_assemble_empty_input() {
        let transcript = Transcript::assemble(Vec::new());
        assert!(transcript.is_empty());
        assert_eq!(transcript.len(), 0);
    }
}
