//! Request dispatch: ordered route table, dispatcher and HTTP mount.
//!
//! Paths are matched against route keys in registration order; the first
//! match wins. Keys may be exact or prefixes, so register narrow keys before
//! broad ones.

pub mod dispatcher;
pub mod http;
pub mod request;
pub mod route;
pub mod table;

pub use dispatcher::{DispatchOptions, Dispatcher};
pub use http::api_routes;
pub use request::{ApiRequest, ApiResponse, ResponseBody, require_method};
pub use route::RouteKey;
pub use table::{Handler, HandlerResult, RouteTable, RouteTableBuilder};
