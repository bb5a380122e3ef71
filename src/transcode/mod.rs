//! Transcoding: the encoder capability and the per-candidate transcoder.

pub mod encoder;
pub mod transcoder;
