//! Media widgets: the hymn audio player, the score viewer and the playlist
//! they are fed from.

mod audio;
mod pdf;
mod playlist;

pub use audio::{AudioPlayer, DEFAULT_VOLUME, format_time};
pub use pdf::{MAX_ZOOM, MIN_ZOOM, PdfViewer, ViewerMode};
pub use playlist::{Playlist, Track};
