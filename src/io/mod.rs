pub mod audio;
pub mod net;
pub mod paths;
pub mod store;
