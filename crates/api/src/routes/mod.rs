pub mod media;
pub mod source;
pub mod status;
