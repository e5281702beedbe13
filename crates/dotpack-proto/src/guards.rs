//! Structural type guards for raw protocol messages.
//!
//! A request guard returns true only when the value is an object, its `type`
//! equals the expected tag, and its `payload` (when required) is an object
//! carrying the required fields with the right JSON types. Optional fields may
//! be absent. Response guards check the `name` under the constant
//! `type: "notification"` envelope.
//!
//! Guards never panic and never allocate; they are the admission check in
//! front of the host's dispatcher.

use crate::{MessageType, NotificationName, NOTIFICATION_TYPE};
use serde_json::{Map, Value};

/// Signature shared by every guard.
pub type Guard = fn(&Value) -> bool;

/// The guard that admits messages of `message_type`.
#[must_use]
pub fn guard_for(message_type: MessageType) -> Guard {
    match message_type {
        MessageType::Ready => is_ready,
        MessageType::SearchRequest => is_search_request,
        MessageType::LoadMoreRequest => is_load_more_request,
        MessageType::PackageDetailsRequest => is_package_details_request,
        MessageType::GetProjects => is_get_projects,
        MessageType::RefreshProjectCache => is_refresh_project_cache,
        MessageType::InstallPackageRequest => is_install_package_request,
        MessageType::UninstallPackageRequest => is_uninstall_package_request,
        MessageType::GetPackageSourcesRequest => is_get_package_sources_request,
    }
}

fn has_type(value: &Value, tag: MessageType) -> bool {
    value
        .as_object()
        .and_then(|obj| obj.get("type"))
        .and_then(Value::as_str)
        == Some(tag.as_str())
}

fn payload(value: &Value) -> Option<&Map<String, Value>> {
    value.get("payload").and_then(Value::as_object)
}

/// A missing payload is fine; a present one must be an object.
fn optional_payload(value: &Value) -> Option<Option<&Map<String, Value>>> {
    match value.get("payload") {
        None => Some(None),
        Some(Value::Object(map)) => Some(Some(map)),
        Some(_) => None,
    }
}

fn has_str(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).is_some_and(Value::is_string)
}

fn opt_str(map: &Map<String, Value>, key: &str) -> bool {
    matches!(map.get(key), None | Some(Value::Null | Value::String(_)))
}

fn has_str_array(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key)
        .and_then(Value::as_array)
        .is_some_and(|items| items.iter().all(Value::is_string))
}

fn optional_request_id(value: &Value, tag: MessageType) -> bool {
    if !has_type(value, tag) {
        return false;
    }
    match optional_payload(value) {
        Some(None) => true,
        Some(Some(map)) => opt_str(map, "requestId"),
        None => false,
    }
}

#[must_use]
pub fn is_ready(value: &Value) -> bool {
    has_type(value, MessageType::Ready)
}

#[must_use]
pub fn is_search_request(value: &Value) -> bool {
    if !has_type(value, MessageType::SearchRequest) {
        return false;
    }
    payload(value).is_some_and(|p| has_str(p, "query") && opt_str(p, "requestId"))
}

#[must_use]
pub fn is_load_more_request(value: &Value) -> bool {
    optional_request_id(value, MessageType::LoadMoreRequest)
}

#[must_use]
pub fn is_package_details_request(value: &Value) -> bool {
    if !has_type(value, MessageType::PackageDetailsRequest) {
        return false;
    }
    payload(value).is_some_and(|p| {
        has_str(p, "packageId")
            && opt_str(p, "version")
            && opt_str(p, "requestId")
            && opt_str(p, "sourceId")
    })
}

#[must_use]
pub fn is_get_projects(value: &Value) -> bool {
    if !has_type(value, MessageType::GetProjects) {
        return false;
    }
    match optional_payload(value) {
        Some(None) => true,
        Some(Some(p)) => opt_str(p, "requestId") && opt_str(p, "packageId"),
        None => false,
    }
}

#[must_use]
pub fn is_refresh_project_cache(value: &Value) -> bool {
    optional_request_id(value, MessageType::RefreshProjectCache)
}

#[must_use]
pub fn is_install_package_request(value: &Value) -> bool {
    if !has_type(value, MessageType::InstallPackageRequest) {
        return false;
    }
    payload(value).is_some_and(|p| {
        has_str(p, "packageId")
            && has_str(p, "version")
            && has_str_array(p, "projectPaths")
            && has_str(p, "requestId")
    })
}

#[must_use]
pub fn is_uninstall_package_request(value: &Value) -> bool {
    if !has_type(value, MessageType::UninstallPackageRequest) {
        return false;
    }
    payload(value).is_some_and(|p| {
        has_str(p, "packageId") && has_str_array(p, "projectPaths") && has_str(p, "requestId")
    })
}

#[must_use]
pub fn is_get_package_sources_request(value: &Value) -> bool {
    optional_request_id(value, MessageType::GetPackageSourcesRequest)
}

// ---------------------------------------------------------------------------
// Response guards
// ---------------------------------------------------------------------------

fn notification_args<'a>(
    value: &'a Value,
    name: NotificationName,
) -> Option<&'a Map<String, Value>> {
    let obj = value.as_object()?;
    if obj.get("type").and_then(Value::as_str) != Some(NOTIFICATION_TYPE) {
        return None;
    }
    if obj.get("name").and_then(Value::as_str) != Some(name.as_str()) {
        return None;
    }
    obj.get("args").and_then(Value::as_object)
}

/// Any well-formed notification envelope with a known name.
#[must_use]
pub fn is_notification(value: &Value) -> bool {
    value
        .get("name")
        .and_then(Value::as_str)
        .and_then(NotificationName::from_tag)
        .is_some_and(|name| notification_args(value, name).is_some())
}

#[must_use]
pub fn is_search_response(value: &Value) -> bool {
    notification_args(value, NotificationName::SearchResponse)
        .is_some_and(|a| a.get("results").is_some_and(Value::is_array) && has_str(a, "query"))
}

#[must_use]
pub fn is_get_projects_response(value: &Value) -> bool {
    notification_args(value, NotificationName::GetProjectsResponse)
        .is_some_and(|a| a.get("projects").is_some_and(Value::is_array))
}

#[must_use]
pub fn is_package_details_response(value: &Value) -> bool {
    notification_args(value, NotificationName::PackageDetailsResponse)
        .is_some_and(|a| has_str(a, "packageId"))
}

#[must_use]
pub fn is_install_package_response(value: &Value) -> bool {
    notification_args(value, NotificationName::InstallPackageResponse).is_some_and(|a| {
        has_str(a, "packageId")
            && a.get("success").is_some_and(Value::is_boolean)
            && a.get("results").is_some_and(Value::is_array)
            && has_str(a, "requestId")
    })
}

#[must_use]
pub fn is_uninstall_package_response(value: &Value) -> bool {
    notification_args(value, NotificationName::UninstallPackageResponse).is_some_and(|a| {
        has_str(a, "packageId")
            && a.get("success").is_some_and(Value::is_boolean)
            && a.get("results").is_some_and(Value::is_array)
            && has_str(a, "requestId")
    })
}

#[must_use]
pub fn is_package_sources_response(value: &Value) -> bool {
    notification_args(value, NotificationName::PackageSourcesResponse)
        .is_some_and(|a| a.get("sources").is_some_and(Value::is_array))
}

#[must_use]
pub fn is_projects_changed(value: &Value) -> bool {
    notification_args(value, NotificationName::ProjectsChanged).is_some()
}
