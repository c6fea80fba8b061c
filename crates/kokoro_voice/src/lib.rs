//! Voice synthesis collaborator.

pub mod elevenlabs;
pub mod tts;

pub use elevenlabs::ElevenLabsTts;
pub use tts::{SynthesizedAudio, TextToSpeech};
