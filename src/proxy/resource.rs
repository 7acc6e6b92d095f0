//! Resource operations and the backend trait they are forwarded to.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProxyError;

/// The nine data operations a resource backend serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Operation {
    Create,
    Delete,
    DeleteMany,
    GetList,
    GetMany,
    GetManyReference,
    GetOne,
    Update,
    UpdateMany,
}

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::Create,
        Operation::Delete,
        Operation::DeleteMany,
        Operation::GetList,
        Operation::GetMany,
        Operation::GetManyReference,
        Operation::GetOne,
        Operation::Update,
        Operation::UpdateMany,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Delete => "delete",
            Operation::DeleteMany => "deleteMany",
            Operation::GetList => "getList",
            Operation::GetMany => "getMany",
            Operation::GetManyReference => "getManyReference",
            Operation::GetOne => "getOne",
            Operation::Update => "update",
            Operation::UpdateMany => "updateMany",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetListParams {
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub sort: Sort,
    #[serde(default)]
    pub filter: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetOneParams {
    pub id: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetManyParams {
    pub ids: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetManyReferenceParams {
    pub target: String,
    pub id: Value,
    #[serde(default)]
    pub pagination: Pagination,
    #[serde(default)]
    pub sort: Sort,
    #[serde(default)]
    pub filter: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateParams {
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateParams {
    pub id: Value,
    pub data: Value,
    #[serde(default)]
    pub previous_data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateManyParams {
    pub ids: Vec<Value>,
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteParams {
    pub id: Value,
    #[serde(default)]
    pub previous_data: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteManyParams {
    pub ids: Vec<Value>,
}

/// One page of records plus the total match count.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: u64,
}

/// A single operation with its parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceRequest {
    Create(CreateParams),
    Delete(DeleteParams),
    DeleteMany(DeleteManyParams),
    GetList(GetListParams),
    GetMany(GetManyParams),
    GetManyReference(GetManyReferenceParams),
    GetOne(GetOneParams),
    Update(UpdateParams),
    UpdateMany(UpdateManyParams),
}

impl ResourceRequest {
    pub fn operation(&self) -> Operation {
        match self {
            ResourceRequest::Create(_) => Operation::Create,
            ResourceRequest::Delete(_) => Operation::Delete,
            ResourceRequest::DeleteMany(_) => Operation::DeleteMany,
            ResourceRequest::GetList(_) => Operation::GetList,
            ResourceRequest::GetMany(_) => Operation::GetMany,
            ResourceRequest::GetManyReference(_) => Operation::GetManyReference,
            ResourceRequest::GetOne(_) => Operation::GetOne,
            ResourceRequest::Update(_) => Operation::Update,
            ResourceRequest::UpdateMany(_) => Operation::UpdateMany,
        }
    }

    /// Decode params for `operation` from a JSON value.
    pub fn from_json(operation: Operation, params: Value) -> Result<Self, serde_json::Error> {
        Ok(match operation {
            Operation::Create => ResourceRequest::Create(serde_json::from_value(params)?),
            Operation::Delete => ResourceRequest::Delete(serde_json::from_value(params)?),
            Operation::DeleteMany => ResourceRequest::DeleteMany(serde_json::from_value(params)?),
            Operation::GetList => ResourceRequest::GetList(serde_json::from_value(params)?),
            Operation::GetMany => ResourceRequest::GetMany(serde_json::from_value(params)?),
            Operation::GetManyReference => {
                ResourceRequest::GetManyReference(serde_json::from_value(params)?)
            }
            Operation::GetOne => ResourceRequest::GetOne(serde_json::from_value(params)?),
            Operation::Update => ResourceRequest::Update(serde_json::from_value(params)?),
            Operation::UpdateMany => ResourceRequest::UpdateMany(serde_json::from_value(params)?),
        })
    }
}

/// Result of an operation. Serializes to the `{data, total?}` shape
/// front-ends expect; `Null` serializes to `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResourceResponse {
    List { data: Vec<Value>, total: u64 },
    Many { data: Vec<Value> },
    One { data: Value },
    Null,
}

impl From<ListResult> for ResourceResponse {
    fn from(result: ListResult) -> Self {
        ResourceResponse::List {
            data: result.data,
            total: result.total,
        }
    }
}

/// Implementation of the data operations. Every call carries the resource
/// name, so one backend may serve several resources.
#[async_trait]
pub trait ResourceBackend: Send + Sync {
    async fn get_list(
        &self,
        resource: &str,
        params: GetListParams,
    ) -> Result<ListResult, ProxyError>;

    async fn get_one(&self, resource: &str, params: GetOneParams) -> Result<Value, ProxyError>;

    async fn get_many(
        &self,
        resource: &str,
        params: GetManyParams,
    ) -> Result<Vec<Value>, ProxyError>;

    async fn get_many_reference(
        &self,
        resource: &str,
        params: GetManyReferenceParams,
    ) -> Result<ListResult, ProxyError>;

    async fn create(&self, resource: &str, params: CreateParams) -> Result<Value, ProxyError>;

    async fn update(&self, resource: &str, params: UpdateParams) -> Result<Value, ProxyError>;

    /// Returns the ids that were updated.
    async fn update_many(
        &self,
        resource: &str,
        params: UpdateManyParams,
    ) -> Result<Vec<Value>, ProxyError>;

    async fn delete(&self, resource: &str, params: DeleteParams) -> Result<Value, ProxyError>;

    /// Returns the ids that were deleted.
    async fn delete_many(
        &self,
        resource: &str,
        params: DeleteManyParams,
    ) -> Result<Vec<Value>, ProxyError>;

    /// Route a request to the matching method.
    async fn handle(
        &self,
        resource: &str,
        request: ResourceRequest,
    ) -> Result<ResourceResponse, ProxyError> {
        Ok(match request {
            ResourceRequest::GetList(p) => self.get_list(resource, p).await?.into(),
            ResourceRequest::GetManyReference(p) => {
                self.get_many_reference(resource, p).await?.into()
            }
            ResourceRequest::GetMany(p) => ResourceResponse::Many {
                data: self.get_many(resource, p).await?,
            },
            ResourceRequest::UpdateMany(p) => ResourceResponse::Many {
                data: self.update_many(resource, p).await?,
            },
            ResourceRequest::DeleteMany(p) => ResourceResponse::Many {
                data: self.delete_many(resource, p).await?,
            },
            ResourceRequest::GetOne(p) => ResourceResponse::One {
                data: self.get_one(resource, p).await?,
            },
            ResourceRequest::Create(p) => ResourceResponse::One {
                data: self.create(resource, p).await?,
            },
            ResourceRequest::Update(p) => ResourceResponse::One {
                data: self.update(resource, p).await?,
            },
            ResourceRequest::Delete(p) => ResourceResponse::One {
                data: self.delete(resource, p).await?,
            },
        })
    }
}

/// Stand-in used before a resource is wired up: list and many-style
/// operations return nothing, single-item operations are rejected.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderBackend;

fn reject<T>(resource: &str, operation: Operation) -> Result<T, ProxyError> {
    Err(ProxyError::Rejected {
        operation: operation.to_string(),
        resource: resource.to_string(),
    })
}

#[async_trait]
impl ResourceBackend for PlaceholderBackend {
    async fn get_list(&self, _: &str, _params: GetListParams) -> Result<ListResult, ProxyError> {
        Ok(ListResult::default())
    }

    async fn get_one(&self, resource: &str, _params: GetOneParams) -> Result<Value, ProxyError> {
        reject(resource, Operation::GetOne)
    }

    async fn get_many(&self, _: &str, _params: GetManyParams) -> Result<Vec<Value>, ProxyError> {
        Ok(Vec::new())
    }

    async fn get_many_reference(
        &self,
        _: &str,
        _params: GetManyReferenceParams,
    ) -> Result<ListResult, ProxyError> {
        Ok(ListResult::default())
    }

    async fn create(&self, resource: &str, _params: CreateParams) -> Result<Value, ProxyError> {
        reject(resource, Operation::Create)
    }

    async fn update(&self, resource: &str, _params: UpdateParams) -> Result<Value, ProxyError> {
        reject(resource, Operation::Update)
    }

    async fn update_many(
        &self,
        _: &str,
        _params: UpdateManyParams,
    ) -> Result<Vec<Value>, ProxyError> {
        Ok(Vec::new())
    }

    async fn delete(&self, resource: &str, _params: DeleteParams) -> Result<Value, ProxyError> {
        reject(resource, Operation::Delete)
    }

    async fn delete_many(
        &self,
        _: &str,
        _params: DeleteManyParams,
    ) -> Result<Vec<Value>, ProxyError> {
        Ok(Vec::new())
    }
}
