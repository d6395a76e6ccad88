//! Axum extractor that deserialises and validates JSON

use crate::error::ExplorerError;

use async_trait::async_trait;
use axum::{
    extract::{rejection::JsonRejection, FromRequest, Json},
    http::Request,
};
use serde::de::DeserializeOwned;
use validator::Validate;

/// An axum extractor based on the Json extractor that also performs validation using the validator
/// crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

#[async_trait]
impl<T, S, B> FromRequest<S, B> for ValidatedJson<T>
where
    T: DeserializeOwned + Validate,
    S: Send + Sync,
    Json<T>: FromRequest<S, B, Rejection = JsonRejection>,
    B: Send + 'static,
{
    type Rejection = ExplorerError;

    /// Extract a `ValidatedJson` from a `Request`.
    async fn from_request(req: Request<B>, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ScaleMode, UpdateRequest};

    use axum::{
        body::Body,
        http::{self, Request, StatusCode},
        response::Response,
        routing::post,
        Router,
    };
    use regex::Regex;
    use tower::ServiceExt;

    async fn echo(ValidatedJson(request): ValidatedJson<UpdateRequest>) -> String {
        format!(
            "month: {} relayout: {} scale: {}",
            request.month,
            request.relayout_data.is_some(),
            request.yaxis_type
        )
    }

    async fn request(body: &'static str) -> Response {
        Router::new()
            .route("/", post(echo))
            .oneshot(
                Request::builder()
                    .method(http::Method::POST)
                    .uri("/")
                    .header(http::header::CONTENT_TYPE, mime::APPLICATION_JSON.as_ref())
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    async fn body_string(response: Response) -> String {
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn assert_bad_request(body: &'static str, patterns: &[&str]) {
        let response = request(body).await;
        assert_eq!(StatusCode::BAD_REQUEST, response.status());
        let body = body_string(response).await;
        for pattern in patterns {
            let re = Regex::new(pattern).unwrap();
            assert!(re.is_match(&body), "body: {body}");
        }
    }

    #[tokio::test]
    async fn ok() {
        let body = r#"{"month": 3, "relayout_data": {"autosize": true}, "yaxis_type": "Log"}"#;
        let response = request(body).await;
        assert_eq!(StatusCode::OK, response.status());
        let expected = format!("month: 3 relayout: true scale: {}", ScaleMode::Log);
        assert_eq!(expected, body_string(response).await);
    }

    #[tokio::test]
    async fn defaults() {
        let response = request("{}").await;
        assert_eq!(StatusCode::OK, response.status());
        assert_eq!("month: 0 relayout: false scale: Linear", body_string(response).await);
    }

    #[tokio::test]
    async fn invalid_json() {
        assert_bad_request("{\"", &[r"Failed to parse the request body as JSON"]).await;
    }

    #[tokio::test]
    async fn invalid_month_type() {
        assert_bad_request(
            r#"{"month": "Jan"}"#,
            &[r#".*month: invalid type: string \\?"Jan\\?".*"#],
        )
        .await;
    }

    #[tokio::test]
    async fn invalid_scale() {
        assert_bad_request(r#"{"yaxis_type": "linear"}"#, &[r".*unknown variant.*"]).await;
    }

    #[tokio::test]
    async fn month_out_of_range() {
        assert_bad_request(
            r#"{"month": 13}"#,
            &[
                r".*request data is not valid.*",
                r".*month: month must be between 0 and 12.*",
            ],
        )
        .await;
    }
}
