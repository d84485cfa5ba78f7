//! Dashboard data fetchers. Each returns the `data` payload of its endpoint
//! as the API sent it.

use learnlens_auth::{ApiClient, ApiError};
use serde_json::Value;

pub const DASHBOARD_PATH: &str = "/dashboard";
pub const INSIGHTS_PATH: &str = "/insights";
pub const COURSES_PATH: &str = "/my-courses";

async fn fetch(api: &ApiClient, path: &str, what: &str) -> Result<Value, ApiError> {
    api.get::<Value>(path).await.inspect_err(|e| {
        tracing::error!(error = %e, "failed to fetch {what}");
    })
}

/// `data` member, treating `null` like an absent member.
fn data_of(mut body: Value) -> Option<Value> {
    body.get_mut("data")
        .map(Value::take)
        .filter(|data| !data.is_null())
}

/// `GET /dashboard`: learning style, quiz scores and activity summary.
pub async fn fetch_dashboard(api: &ApiClient) -> Result<Value, ApiError> {
    let body = fetch(api, DASHBOARD_PATH, "dashboard").await?;
    Ok(data_of(body).unwrap_or(Value::Null))
}

/// `GET /insights`; `{}` when the learner has no insights yet.
pub async fn fetch_insights(api: &ApiClient) -> Result<Value, ApiError> {
    let body = fetch(api, INSIGHTS_PATH, "insights").await?;
    Ok(data_of(body).unwrap_or_else(|| Value::Object(serde_json::Map::new())))
}

/// `GET /my-courses`; the `courses` list, empty when absent.
pub async fn fetch_courses(api: &ApiClient) -> Result<Value, ApiError> {
    let body = fetch(api, COURSES_PATH, "courses").await?;
    let courses = data_of(body)
        .and_then(|mut data| data.get_mut("courses").map(Value::take))
        .filter(|courses| !courses.is_null());
    Ok(courses.unwrap_or_else(|| Value::Array(Vec::new())))
}
