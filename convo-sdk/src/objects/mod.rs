pub mod callback;

pub use callback::{
    CallMetadata, DecodeError, POST_CALL_TRANSCRIPTION, TranscriptTurn, TranscriptionData,
    VerifiedEvent,
};
