pub mod error;
pub mod options;
pub mod output;
pub mod params;

pub use error::ErgonError;
pub use options::{resolve, resolve_parsed, OptionSource, Origin, Resolved};
pub use output::JsonOutput;
pub use params::{
    AspectRatio, AudioFormat, ImageEngine, ImageFormat, ImageParams, ImageType, Language,
    Quality, SizePreset, Speed, SpeechParams, TextFormat, TtsModel, VideoAspectRatio,
    VideoDuration, VideoEngine, VideoParams, VideoResolution, Voice,
};
