pub mod mock;
pub mod traits;

pub use mock::MockTokenizer;
pub use traits::{EmptyVocabulary, Vocabulary};
