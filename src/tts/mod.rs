pub mod cache;
pub mod protocol;

pub use cache::{SynthesizeError, Synthesizer};
pub use protocol::TtsError;
