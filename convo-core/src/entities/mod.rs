pub mod conversations;

pub use conversations::{TranscriptRecord, UpsertConversation, UpsertOutcome};
