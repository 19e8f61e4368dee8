//! Decoding, in-memory sources and cpal playback

pub mod source;
pub mod decode;
pub mod output;
pub mod playback;

pub use source::AudioSource;
pub use decode::{decode_file, DecodeError};
pub use output::{list_output_devices, AudioError, AudioOutput, CpalBackend, OutputBackend, OutputStream};
pub use playback::{PlaybackEngine, PlaybackShared, PlaybackState};
