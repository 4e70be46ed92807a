pub mod api;
pub mod live;

pub use api::create_api_routes;
pub use live::create_live_routes;
