//! Request handlers. Each one validates shape, delegates, and maps the result.

use axum::body::Bytes;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, Path, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::info;

use crate::domain::model::{AssetKind, TimeSpec, TrimPolicy, TrimRequest};
use crate::error::{ClipiaError, ClipiaResult, RangeViolation};
use crate::http::{ApiError, ApiResult, AppState, SESSION_HEADER};
use crate::store::AssetStore;
use crate::workspace::SessionId;

/// Session from the `x-clipia-session` header, or the default session
fn session_from(headers: &HeaderMap) -> ClipiaResult<SessionId> {
    match headers.get(SESSION_HEADER) {
        None => Ok(SessionId::default()),
        Some(value) => {
            let raw = value
                .to_str()
                .map_err(|_| ClipiaError::validation("Session header must be ASCII"))?;
            SessionId::parse(raw.trim())
        }
    }
}

/// Parse a JSON object body, with our own error mapping instead of the Json rejection
fn json_object(body: &Bytes) -> ClipiaResult<Map<String, Value>> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(ClipiaError::validation("Request body must be a JSON object")),
        Err(e) => Err(ClipiaError::validation(format!("Invalid JSON body: {}", e))),
    }
}

/// Time field given as a JSON number or a time string
fn time_field(map: &Map<String, Value>, field: &'static str) -> ClipiaResult<TimeSpec> {
    match map.get(field) {
        Some(Value::Number(n)) => match n.as_f64() {
            Some(seconds) => TimeSpec::from_number(field, seconds),
            None => Err(RangeViolation::NonNumeric { field }.into()),
        },
        Some(Value::String(s)) => TimeSpec::parse(field, s),
        _ => Err(RangeViolation::NonNumeric { field }.into()),
    }
}

fn optional_seconds(map: &Map<String, Value>, field: &'static str) -> ClipiaResult<Option<f64>> {
    match map.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(_) => time_field(map, field).map(|t| Some(t.seconds)),
    }
}

fn string_field<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    map.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn upload_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    upload(state, headers, multipart, AssetKind::Video, "video").await
}

pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<Response> {
    upload(state, headers, multipart, AssetKind::Image, "image").await
}

async fn upload(
    state: AppState,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
    kind: AssetKind,
    field_name: &str,
) -> ApiResult<Response> {
    let session = session_from(&headers)?;
    let mut multipart = multipart
        .map_err(|e| ClipiaError::validation(format!("Expected a multipart upload: {}", e)))?;
    let malformed = |e: axum::extract::multipart::MultipartError| {
        ClipiaError::validation(format!("Malformed upload: {}", e))
    };

    while let Some(mut field) = multipart.next_field().await.map_err(malformed)? {
        if field.name() != Some(field_name) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(str::to_string)
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ClipiaError::validation("No selected file."))?;
        let content_type = field.content_type().map(str::to_string);

        let mut staged = state
            .store
            .begin_upload(kind, &file_name, content_type.as_deref())
            .await?;
        while let Some(chunk) = field.chunk().await.map_err(malformed)? {
            staged.write_chunk(&chunk).await?;
        }
        let asset = staged.commit().await?;

        if kind == AssetKind::Video {
            state.workspace.set_current(&session, &asset.id).await?;
        }
        info!(asset_id = %asset.id, %session, kind = %kind, "Upload stored");

        let body = json!({
            "success": true,
            "message": "File uploaded successfully.",
            "filename": asset.id,
            "asset": asset,
        });
        return Ok((StatusCode::CREATED, Json(body)).into_response());
    }

    Err(ClipiaError::validation(format!("No {} part in the request.", field_name)).into())
}

pub async fn trim_video(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let session = session_from(&headers)?;
    let map = json_object(&body)?;

    let (Some(filename), true, true) = (
        string_field(&map, "filename"),
        map.contains_key("start_time"),
        map.contains_key("end_time"),
    ) else {
        return Err(ClipiaError::validation("Missing required parameters.").into());
    };

    let start = time_field(&map, "start_time")?;
    let end = time_field(&map, "end_time")?;
    let policy = string_field(&map, "policy")
        .map(str::parse::<TrimPolicy>)
        .transpose()?;

    let source = AssetStore::resolve(filename)
        .map_err(|e| ApiError::from(e).with_not_found_message("Video not found."))?;
    let mut request = TrimRequest::new(source, start, end)?;
    if let Some(policy) = policy {
        request = request.with_policy(policy);
    }

    let outcome = state
        .engine
        .trim(request)
        .await
        .map_err(|e| ApiError::from(e).with_not_found_message("Video not found."))?;
    state
        .workspace
        .set_current(&session, &outcome.asset.id)
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Video trimmed successfully.",
        "trimmed_filename": outcome.asset.id,
        "asset": outcome.asset,
        "policy": outcome.plan.policy,
        "verification": outcome.verification,
    })))
}

pub async fn split_video(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let map = json_object(&body)?;
    let filename = string_field(&map, "filename")
        .ok_or_else(|| ClipiaError::validation("Missing required parameters."))?;
    let clip_seconds = optional_seconds(&map, "clip_seconds")?;
    let overlap_seconds = optional_seconds(&map, "overlap_seconds")?;

    let source = AssetStore::resolve(filename)
        .map_err(|e| ApiError::from(e).with_not_found_message("Video not found."))?;
    let outcomes = state
        .engine
        .split(&source, clip_seconds, overlap_seconds)
        .await
        .map_err(|e| ApiError::from(e).with_not_found_message("Video not found."))?;

    let clips: Vec<_> = outcomes.into_iter().map(|o| o.asset).collect();
    Ok(Json(json!({
        "success": true,
        "message": format!("Video split into {} clips.", clips.len()),
        "clips": clips,
    })))
}

pub async fn get_video(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    serve_asset(&state, &id, AssetKind::Video, request)
        .await
        .map_err(|e| ApiError::from(e).with_not_found_message("Video not found."))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Response> {
    serve_asset(&state, &id, AssetKind::Image, request)
        .await
        .map_err(|e| ApiError::from(e).with_not_found_message("Image not found."))
}

/// Stream a committed asset with Range support
async fn serve_asset(
    state: &AppState,
    raw_id: &str,
    kind: AssetKind,
    request: Request,
) -> ClipiaResult<Response> {
    let id = AssetStore::resolve(raw_id)?;
    let (asset, path) = state.store.path_of(&id).await?;
    if asset.kind != kind {
        return Err(ClipiaError::not_found(raw_id));
    }

    let mut response = match ServeFile::new(&path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        // metadata committed but bytes gone
        return Err(ClipiaError::Storage(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("data file missing for {}", asset.id),
        )));
    }

    if let Ok(value) = HeaderValue::from_str(&asset.content_type) {
        response.headers_mut().insert(header::CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&asset.original_name)) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

fn content_disposition(name: &str) -> String {
    let ascii: String = name
        .chars()
        .map(|c| if c.is_ascii_graphic() || c == ' ' { c } else { '_' })
        .map(|c| if c == '"' || c == '\\' { '_' } else { c })
        .collect();
    format!("inline; filename=\"{}\"", ascii)
}

pub async fn asset_metadata(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let id = AssetStore::resolve(&id)?;
    let asset = state.store.metadata(&id).await?;
    Ok(Json(json!({ "success": true, "asset": asset })))
}

pub async fn get_workspace(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<Value>> {
    let session = session_from(&headers)?;
    let snapshot = state.workspace.snapshot(&session)?;
    Ok(Json(json!({
        "success": true,
        "session": session,
        "current_asset": snapshot.current_asset,
        "context": snapshot.context,
        "updated_at": snapshot.updated_at,
    })))
}

pub async fn put_workspace_context(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let session = session_from(&headers)?;
    let map = json_object(&body)?;
    let context = map
        .get("context")
        .and_then(Value::as_str)
        .ok_or_else(|| ClipiaError::validation("Missing required parameters."))?;

    let snapshot = state.workspace.set_context(&session, context).await?;
    Ok(Json(json!({
        "success": true,
        "message": "Context updated.",
        "session": session,
        "current_asset": snapshot.current_asset,
        "context": snapshot.context,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_field_accepts_numbers_and_strings() {
        let map = json_object(&Bytes::from_static(
            br#"{"start_time": 2, "end_time": "00:05.5"}"#,
        ))
        .unwrap();
        assert_eq!(time_field(&map, "start_time").unwrap().seconds, 2.0);
        assert_eq!(time_field(&map, "end_time").unwrap().seconds, 5.5);
    }

    #[test]
    fn test_time_field_rejects_other_types() {
        let map = json_object(&Bytes::from_static(br#"{"start_time": true}"#)).unwrap();
        assert!(matches!(
            time_field(&map, "start_time"),
            Err(ClipiaError::InvalidRange(RangeViolation::NonNumeric { .. }))
        ));
    }

    #[test]
    fn test_json_object_rejects_arrays() {
        assert!(json_object(&Bytes::from_static(b"[1,2]")).is_err());
        assert!(json_object(&Bytes::from_static(b"{not json")).is_err());
    }

    #[test]
    fn test_session_header() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_from(&headers).unwrap(), SessionId::default());
        headers.insert(SESSION_HEADER, HeaderValue::from_static("tab-7"));
        assert_eq!(session_from(&headers).unwrap().as_str(), "tab-7");
        headers.insert(SESSION_HEADER, HeaderValue::from_static("../x"));
        assert!(session_from(&headers).is_err());
    }

    #[test]
    fn test_content_disposition_is_header_safe() {
        assert_eq!(
            content_disposition("my \"best\" clip.mp4"),
            "inline; filename=\"my _best_ clip.mp4\""
        );
        assert_eq!(content_disposition("é.mp4"), "inline; filename=\"_.mp4\"");
    }
}
