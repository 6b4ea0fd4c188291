use std::collections::HashMap;
use std::sync::Arc;

/// Token lookup consumed by the tool parsers. Tokenization itself lives elsewhere.
pub trait Vocabulary: Send + Sync {
    fn token_to_id(&self, token: &str) -> Option<u32>;

    fn id_to_token(&self, _id: u32) -> Option<String> {
        None
    }
}

impl Vocabulary for HashMap<String, u32> {
    fn token_to_id(&self, token: &str) -> Option<u32> {
        self.get(token).copied()
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        self.iter()
            .find(|(_, token_id)| **token_id == id)
            .map(|(token, _)| token.clone())
    }
}

impl<V: Vocabulary + ?Sized> Vocabulary for Arc<V> {
    fn token_to_id(&self, token: &str) -> Option<u32> {
        (**self).token_to_id(token)
    }

    fn id_to_token(&self, id: u32) -> Option<String> {
        (**self).id_to_token(id)
    }
}

/// Vocabulary with no entries, for conventions that need no marker tokens
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyVocabulary;

impl Vocabulary for EmptyVocabulary {
    fn token_to_id(&self, _token: &str) -> Option<u32> {
        None
    }
}
