pub mod audio;
pub mod pipeline;
pub mod shared;
pub mod subtitle;
pub mod tasks;
pub mod video;
