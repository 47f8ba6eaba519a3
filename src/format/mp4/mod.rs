//! MP4 container input
//!
//! Only available when the `mp4-support` feature is enabled:
//!
//! ```toml
//! [dependencies]
//! avcplay = { version = "0.1", features = ["mp4-support"] }
//! ```

pub mod demuxer;

pub use demuxer::Mp4Source;
