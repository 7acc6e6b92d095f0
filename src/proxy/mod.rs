//! Resource-scoped data proxy.

pub mod registry;
pub mod resource;

pub use registry::{AccessObserver, MissingResource, ResourceProxy};
pub use resource::{
    CreateParams, DeleteManyParams, DeleteParams, GetListParams, GetManyParams,
    GetManyReferenceParams, GetOneParams, ListResult, Operation, Pagination, PlaceholderBackend,
    ResourceBackend, ResourceRequest, ResourceResponse, Sort, SortOrder, UpdateManyParams,
    UpdateParams,
};
