pub mod scripted;
pub mod tone;
