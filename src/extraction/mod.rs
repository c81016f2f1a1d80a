pub mod assembler;
pub mod error;
pub mod outcome;
pub mod render;
pub mod service;
pub mod text_decoders;

pub use assembler::{assemble, FileMeta};
pub use error::{ExtractionError, ExtractionFailure, ParseCause};
pub use outcome::{ExtractedContent, ExtractionOutcome};
pub use service::ExtractionService;
