pub mod cinema;
pub mod gallery;
pub mod interaction;
pub mod spatial;
pub mod thumbnails;
pub mod ui;
