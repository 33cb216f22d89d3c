//! Response bodies.
//!
//! Pages are rendered as a JSON document naming the template and carrying its
//! context, so any front end can do the final HTML rendering.

use crate::server::ServerError;
use axum::{
    Json as AxumJson,
    body::Bytes,
    extract::FromRequest,
    response::{IntoResponse, Response},
};
use axum_extra::TypedHeader;
use headers::ContentType;
use serde::Serialize;

#[derive(Clone, Debug)]
pub struct Template<C> {
    name: &'static str,
    context: C,
}

#[derive(Serialize)]
struct TemplateDocument<'a, C> {
    template: &'static str,
    context: &'a C,
}

impl<C: Serialize> Template<C> {
    pub fn new(name: &'static str, context: C) -> Self {
        Self { name, context }
    }

    pub fn render(&self) -> Result<Bytes, serde_json::Error> {
        let document = TemplateDocument {
            template: self.name,
            context: &self.context,
        };
        serde_json::to_vec(&document).map(Bytes::from)
    }
}

impl<C: Serialize> IntoResponse for Template<C> {
    fn into_response(self) -> Response {
        match self.render() {
            Ok(page) => RenderedPage(page).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}

/// A page that was already rendered, possibly served from the page cache.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct RenderedPage(pub Bytes);

impl IntoResponse for RenderedPage {
    fn into_response(self) -> Response {
        (TypedHeader(ContentType::json()), self.0).into_response()
    }
}

/// JSON body extractor and response whose failures are reported as [`ServerError`]s.
#[derive(FromRequest, Debug, Clone, Copy, Default)]
#[from_request(via(AxumJson), rejection(ServerError))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        match serde_json::to_vec(&self.0) {
            Ok(json) => (TypedHeader(ContentType::json()), json).into_response(),
            Err(err) => ServerError::JsonResponse(err).into_response(),
        }
    }
}
