pub mod handlers;
mod models;
mod position;
mod search;

pub use models::Location;
pub use position::{IpPositionClient, PositionError, PositionSource};
pub use search::{OpenMeteoGeocoder, PlaceSearch, SearchError};
