pub mod channel_splitter;
pub mod loudness;
