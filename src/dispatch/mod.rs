//! Dispatcher contract and per-request scope.
//!
//! Routing and business handlers live outside this crate. The pipeline only
//! needs a [`Dispatcher`] to turn a request plus its [`RequestScope`] into a
//! response or a [`Failure`].

pub mod failure;

use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::auth::AuthorizationContext;
use crate::config::RoleBaseline;
use crate::http::request::GatewayRequest;
use crate::pool::ResourceSet;
use crate::reporting::Breadcrumb;

pub use failure::{Failure, FailureKind};

/// Application logic behind the gateway.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Handle one dynamic request using the resources in `scope`.
    async fn dispatch(
        &self,
        request: &GatewayRequest,
        scope: &mut RequestScope,
    ) -> Result<Response, Failure>;

    /// Resolve the route for diagnostics. `None` when no route matches.
    fn resolve(&self, _request: &GatewayRequest) -> Option<RouteMatch> {
        None
    }
}

/// Route resolved for a request, with labels that classify the action.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteMatch {
    pub method: String,
    pub path: String,
    pub labels: HashMap<String, String>,
}

impl RouteMatch {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn label<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.labels.get(key).map(String::as_str).unwrap_or(default)
    }
}

/// Everything one dynamic request owns while it is being served.
#[derive(Debug)]
pub struct RequestScope {
    pub auth: AuthorizationContext,
    pub resources: ResourceSet,
    breadcrumbs: Vec<Breadcrumb>,
    user: Option<String>,
    project: Option<String>,
}

impl RequestScope {
    pub fn new(baseline: RoleBaseline) -> Self {
        Self {
            auth: AuthorizationContext::new(baseline),
            resources: ResourceSet::new(),
            breadcrumbs: Vec::new(),
            user: None,
            project: None,
        }
    }

    pub fn add_breadcrumb(&mut self, breadcrumb: Breadcrumb) {
        self.breadcrumbs.push(breadcrumb);
    }

    pub fn breadcrumbs(&self) -> &[Breadcrumb] {
        &self.breadcrumbs
    }

    /// Record the user resolved for this request.
    pub fn set_user(&mut self, id: impl Into<String>) {
        self.user = Some(id.into());
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Record the project (tenant) the request belongs to.
    pub fn set_project(&mut self, id: impl Into<String>) {
        self.project = Some(id.into());
    }

    pub fn project(&self) -> Option<&str> {
        self.project.as_deref()
    }
}

/// Answers every dynamic request with a JSON 404.
///
/// Used when the gateway runs without application routes mounted.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotFoundDispatcher;

#[async_trait]
impl Dispatcher for NotFoundDispatcher {
    async fn dispatch(
        &self,
        request: &GatewayRequest,
        _scope: &mut RequestScope,
    ) -> Result<Response, Failure> {
        let body = serde_json::json!({
            "message": format!("No route found for {} {}", request.method(), request.path()),
            "code": StatusCode::NOT_FOUND.as_u16(),
        });
        Ok((StatusCode::NOT_FOUND, Json(body)).into_response())
    }
}
