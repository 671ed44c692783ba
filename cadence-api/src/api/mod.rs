//! HTTP API handlers for cadence-api

pub mod calendars;
pub mod content_items;
pub mod health;
pub mod keywords;
pub mod organizations;

pub use calendars::calendar_routes;
pub use content_items::content_item_routes;
pub use health::health_routes;
pub use keywords::keyword_routes;
pub use organizations::organization_routes;
