//! Recommendation query routes
//!
//! - GET    /api/v1/recommendations/{user_id}/realtime
//! - GET    /api/v1/recommendations/{user_id}/daily?date=YYYY/MM/DD
//! - GET    /api/v1/recommendations/{user_id}/weekly?start_date=YYYY/MM/DD
//! - POST   /api/v1/recommendations/{user_id}/projection
//! - GET    /api/v1/recommendation/{id}
//! - DELETE /api/v1/recommendation/{id}
//!
//! `{user_id}` and `{id}` are percent-decoded, so ids containing `/` or
//! other reserved characters are reachable as `%2F` and so on.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Method, Response, StatusCode};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use super::{error_response, json_response, method_not_allowed_response, not_found_response};
use crate::db::schemas::RecommendationProjection;
use crate::server::AppState;
use crate::types::HealthError;

pub const RECOMMENDATIONS_PREFIX: &str = "/api/v1/recommendations/";
pub const RECOMMENDATION_PREFIX: &str = "/api/v1/recommendation/";

/// Parsed recommendation route
#[derive(Debug, PartialEq, Eq)]
enum Route<'a> {
    Realtime(Cow<'a, str>),
    Daily(Cow<'a, str>),
    Weekly(Cow<'a, str>),
    RebuildProjection(Cow<'a, str>),
    ById(Cow<'a, str>),
    Retract(Cow<'a, str>),
    /// A path segment that does not decode to UTF-8
    BadEncoding,
    MethodNotAllowed,
    Unknown,
}

fn parse_route<'a>(method: &Method, path: &'a str) -> Route<'a> {
    if let Some(rest) = path.strip_prefix(RECOMMENDATIONS_PREFIX) {
        let Some((user_id, action)) = rest.split_once('/') else {
            return Route::Unknown;
        };
        if user_id.is_empty() {
            return Route::Unknown;
        }
        let Ok(user_id) = urlencoding::decode(user_id) else {
            return Route::BadEncoding;
        };
        return match (method, action) {
            (&Method::GET, "realtime") => Route::Realtime(user_id),
            (&Method::GET, "daily") => Route::Daily(user_id),
            (&Method::GET, "weekly") => Route::Weekly(user_id),
            (&Method::POST, "projection") => Route::RebuildProjection(user_id),
            (_, "realtime" | "daily" | "weekly" | "projection") => Route::MethodNotAllowed,
            _ => Route::Unknown,
        };
    }

    if let Some(id) = path.strip_prefix(RECOMMENDATION_PREFIX) {
        if id.is_empty() || id.contains('/') {
            return Route::Unknown;
        }
        let Ok(id) = urlencoding::decode(id) else {
            return Route::BadEncoding;
        };
        return match *method {
            Method::GET => Route::ById(id),
            Method::DELETE => Route::Retract(id),
            _ => Route::MethodNotAllowed,
        };
    }

    Route::Unknown
}

#[derive(Debug, Default, Deserialize)]
struct DailyQuery {
    date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct WeeklyQuery {
    start_date: Option<String>,
}

/// List payload for daily and weekly summaries
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    pub user_id: String,
    pub count: usize,
    pub recommendations: Vec<RecommendationProjection>,
}

fn parse_query<'de, T: Deserialize<'de>>(query: &'de str) -> Result<T, HealthError> {
    serde_urlencoded::from_str(query)
        .map_err(|e| HealthError::BadRequest(format!("invalid query string: {}", e)))
}

fn required(value: Option<String>, name: &str) -> Result<String, HealthError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| HealthError::BadRequest(format!("missing query parameter '{}'", name)))
}

fn summary(user_id: &str, recommendations: Vec<RecommendationProjection>) -> SummaryResponse {
    SummaryResponse {
        user_id: user_id.to_string(),
        count: recommendations.len(),
        recommendations,
    }
}

/// Dispatch a request under the recommendation prefixes
pub async fn handle_recommendations_request(
    state: &AppState,
    method: &Method,
    path: &str,
    query: &str,
) -> Response<Full<Bytes>> {
    let service = &state.recommendations;

    let result = match parse_route(method, path) {
        Route::Realtime(user_id) => service
            .realtime(&user_id)
            .await
            .map(|r| json_response(StatusCode::OK, &r)),

        Route::Daily(user_id) => {
            let daily = async {
                let params: DailyQuery = parse_query(query)?;
                let date = required(params.date, "date")?;
                service.daily(&user_id, &date).await
            };
            daily
                .await
                .map(|rows| json_response(StatusCode::OK, &summary(&user_id, rows)))
        }

        Route::Weekly(user_id) => {
            let weekly = async {
                let params: WeeklyQuery = parse_query(query)?;
                let start_date = required(params.start_date, "start_date")?;
                service.weekly(&user_id, &start_date).await
            };
            weekly
                .await
                .map(|rows| json_response(StatusCode::OK, &summary(&user_id, rows)))
        }

        Route::RebuildProjection(user_id) => service
            .rebuild_projection(&user_id)
            .await
            .map(|outcome| json_response(StatusCode::OK, &outcome)),

        Route::ById(id) => service
            .by_id(&id)
            .await
            .map(|r| json_response(StatusCode::OK, &r)),

        Route::Retract(id) => service
            .retract(&id)
            .await
            .map(|outcome| json_response(StatusCode::OK, &outcome)),

        Route::BadEncoding => Err(HealthError::BadRequest(
            "path segment is not valid percent-encoded UTF-8".to_string(),
        )),
        Route::MethodNotAllowed => return method_not_allowed_response(path),
        Route::Unknown => return not_found_response(path),
    };

    result.unwrap_or_else(|e| error_response(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_routes() {
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendations/u1/realtime"),
            Route::Realtime("u1".into())
        );
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendations/u1/weekly"),
            Route::Weekly("u1".into())
        );
        assert_eq!(
            parse_route(&Method::POST, "/api/v1/recommendations/u1/projection"),
            Route::RebuildProjection("u1".into())
        );
        assert_eq!(
            parse_route(&Method::DELETE, "/api/v1/recommendations/u1/daily"),
            Route::MethodNotAllowed
        );
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendations//realtime"),
            Route::Unknown
        );
    }

    #[test]
    fn test_id_routes() {
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendation/abc"),
            Route::ById("abc".into())
        );
        assert_eq!(
            parse_route(&Method::DELETE, "/api/v1/recommendation/abc"),
            Route::Retract("abc".into())
        );
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendation/abc/extra"),
            Route::Unknown
        );
    }

    #[test]
    fn test_path_segments_are_percent_decoded() {
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendations/team%2Fu%201/realtime"),
            Route::Realtime("team/u 1".into())
        );
        assert_eq!(
            parse_route(&Method::DELETE, "/api/v1/recommendation/r%3A7"),
            Route::Retract("r:7".into())
        );
        assert_eq!(
            parse_route(&Method::GET, "/api/v1/recommendations/%FF/realtime"),
            Route::BadEncoding
        );
    }

    #[test]
    fn test_query_decoding() {
        let params: DailyQuery = parse_query("date=2024%2F05%2F01").unwrap();
        assert_eq!(params.date.as_deref(), Some("2024/05/01"));

        let params: WeeklyQuery = parse_query("").unwrap();
        assert!(required(params.start_date, "start_date").is_err());
    }
}
