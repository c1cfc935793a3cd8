pub mod headless;
pub mod mixer;
pub mod playback;
pub mod stem;
pub mod tracker;
