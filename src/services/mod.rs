// Services module - business logic layer

pub mod clock;
pub mod image_index;
pub mod proxy;
pub mod trakt_data;

// Upstream providers
pub mod tmdb;
pub mod trakt;
