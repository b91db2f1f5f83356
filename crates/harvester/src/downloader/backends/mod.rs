//! Provider resolver implementations
//!
//! This module contains specific implementations of the SourceResolver trait.
//! Each backend turns one provider's links into resolved files.
//!
//! Currently supported:
//! - Google Drive files and folders (id-addressed, page-token pagination)
//! - Dropbox shared links (path-addressed listing, cursor pagination)
//! - Imgur albums and direct image links (flat, single request)

pub mod drive;
pub mod dropbox;
pub mod imgur;

// Re-export main implementations
pub use drive::DriveResolver;
pub use dropbox::DropboxResolver;
pub use imgur::ImgurResolver;
