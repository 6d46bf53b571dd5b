pub mod arrangement;
pub mod instrument;
pub mod mixdown;
pub mod playhead;
pub mod recording;
pub mod session;
pub mod timeline;
