//! Mock tokenizer implementation for testing

use std::collections::HashMap;

use super::traits::Vocabulary;

/// Id assigned to every character not covered by a vocabulary entry
pub const MOCK_UNK_ID: u32 = 0;

/// Mock tokenizer for testing purposes
#[derive(Debug, Clone)]
pub struct MockTokenizer {
    vocab: HashMap<String, u32>,
    reverse_vocab: HashMap<u32, String>,
}

impl Default for MockTokenizer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTokenizer {
    /// Vocabulary with the marker tokens of the built-in conventions
    pub fn new() -> Self {
        let tokens = [
            ("<eos>", 999),
            ("<bos>", 1000),
            ("<|im_start|>", 1001),
            ("<|im_end|>", 1002),
            ("<|eot_id|>", 1003),
            ("<tool_call>", 1010),
            ("</tool_call>", 1011),
            ("[TOOL_CALLS]", 1012),
            ("<|python_tag|>", 1013),
        ];
        Self::from_tokens(tokens)
    }

    /// Vocabulary without any tool call markers
    pub fn without_markers() -> Self {
        Self::from_tokens([("<eos>", 999), ("<bos>", 1000)])
    }

    pub fn from_tokens<'a>(tokens: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let mut vocab = HashMap::new();
        let mut reverse_vocab = HashMap::new();
        for (token, id) in tokens {
            vocab.insert(token.to_string(), id);
            reverse_vocab.insert(id, token.to_string());
        }
        Self {
            vocab,
            reverse_vocab,
        }
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Greedy longest-match over vocabulary entries; every other character
    /// becomes one `MOCK_UNK_ID` token.
    pub fn encode(&self, input: &str) -> Vec<u32> {
        let mut ids = Vec::new();
        let mut rest = input;
        while let Some(ch) = rest.chars().next() {
            let matched = self
                .vocab
                .iter()
                .filter(|(token, _)| rest.starts_with(token.as_str()))
                .max_by_key(|(token, _)| token.len());
            match matched {
                Some((token, &id)) => {
                    ids.push(id);
                    rest = &rest[token.len()..];
                }
                None => {
                    ids.push(MOCK_UNK_ID);
                    rest = &rest[ch.len_utf8()..];
                }
            }
        }
        ids
    }
}

impl Vocabulary for MockTokenizer {
    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.vocab.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.reverse_vocab.get(&id).cloned()
    }
}
