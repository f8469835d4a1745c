//! HubSpot CRM contacts

use super::config::ProviderConfig;
use super::items::NormalizedItem;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;

pub const NAME: &str = "hubspot";
pub const DISPLAY_NAME: &str = "HubSpot";

const AUTHORIZATION_URL: &str = "https://app.hubspot.com/oauth/authorize";
const TOKEN_URL: &str = "https://api.hubapi.com/oauth/v1/token";
const CONTACTS_URL: &str = "https://api.hubapi.com/crm/v3/objects/contacts";
const CONTACT_URL_BASE: &str = "https://app.hubspot.com/contacts/contacts";

const ITEM_TYPE: &str = "Contact";
const MIME_TYPE: &str = "application/vnd.hubspot.contact";
const UNNAMED: &str = "Unnamed Contact";

pub(super) fn apply_defaults(provider: &mut ProviderConfig) {
    if provider.display_name.is_none() {
        provider.display_name = Some(DISPLAY_NAME.to_string());
    }
    if provider.authorization_url.is_none() {
        provider.authorization_url = Some(AUTHORIZATION_URL.to_string());
    }
    if provider.token_url.is_none() {
        provider.token_url = Some(TOKEN_URL.to_string());
    }
    if provider.items_url.is_none() {
        provider.items_url = Some(CONTACTS_URL.to_string());
    }
    if provider.scopes.is_empty() {
        provider.scopes = vec!["oauth".to_string()];
    }
    if provider.optional_scopes.is_empty() {
        provider.optional_scopes = vec![
            "crm.objects.contacts.read".to_string(),
            "crm.objects.contacts.write".to_string(),
        ];
    }
    if provider.item_properties.is_empty() {
        provider.item_properties = [
            "firstname",
            "lastname",
            "email",
            "company",
            "createdate",
            "lastmodifieddate",
        ]
        .iter()
        .map(|p| p.to_string())
        .collect();
    }
    // The consent URL has never carried a challenge for HubSpot
    if provider.use_pkce.is_none() {
        provider.use_pkce = Some(false);
    }
}

fn property<'a>(record: &'a Value, name: &str) -> Option<&'a str> {
    record
        .get("properties")
        .and_then(|props| props.get(name))
        .and_then(Value::as_str)
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

/// Map a CRM v3 contact object onto a [`NormalizedItem`]
pub fn normalize_contact(record: &Value) -> NormalizedItem {
    let id = match record.get("id") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) => id.to_string(),
        _ => String::new(),
    };

    let first = property(record, "firstname").unwrap_or_default();
    let last = property(record, "lastname").unwrap_or_default();
    let full_name = format!("{} {}", first, last).trim().to_string();
    let name = if !full_name.is_empty() {
        full_name
    } else {
        property(record, "email")
            .filter(|email| !email.is_empty())
            .unwrap_or(UNNAMED)
            .to_string()
    };

    let created_at = record.get("createdAt").and_then(Value::as_str);
    let updated_at = record.get("updatedAt").and_then(Value::as_str);

    let mut extra = BTreeMap::from([("source".to_string(), NAME.to_string())]);
    if let Some(updated_at) = updated_at {
        extra.insert("last_updated".to_string(), updated_at.to_string());
    }
    if let Some(company) = property(record, "company") {
        extra.insert("company".to_string(), company.to_string());
    }

    NormalizedItem {
        url: Some(format!("{}/{}", CONTACT_URL_BASE, id)),
        id,
        item_type: ITEM_TYPE.to_string(),
        name,
        creation_time: timestamp(created_at),
        last_modified_time: timestamp(updated_at),
        mime_type: Some(MIME_TYPE.to_string()),
        extra,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_full_contact() {
        let item = normalize_contact(&json!({
            "id": "501",
            "properties": {
                "firstname": "Ada",
                "lastname": "Lovelace",
                "email": "ada@example.com",
                "company": "Analytical Engines"
            },
            "createdAt": "2024-03-01T10:00:00.000Z",
            "updatedAt": "2024-03-02T12:30:00Z",
            "archived": false
        }));

        assert_eq!(item.id, "501");
        assert_eq!(item.item_type, "Contact");
        assert_eq!(item.name, "Ada Lovelace");
        assert_eq!(
            item.creation_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            item.last_modified_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 2, 12, 30, 0).unwrap())
        );
        assert_eq!(
            item.url.as_deref(),
            Some("https://app.hubspot.com/contacts/contacts/501")
        );
        assert_eq!(item.mime_type.as_deref(), Some("application/vnd.hubspot.contact"));
        assert_eq!(item.extra["source"], "hubspot");
        assert_eq!(item.extra["company"], "Analytical Engines");
        assert_eq!(item.extra["last_updated"], "2024-03-02T12:30:00Z");
    }

    #[test]
    fn test_single_name_part() {
        let item = normalize_contact(&json!({
            "id": "1",
            "properties": {"firstname": "Grace", "lastname": null}
        }));
        assert_eq!(item.name, "Grace");
    }

    #[test]
    fn test_name_falls_back_to_email() {
        let item = normalize_contact(&json!({
            "id": "2",
            "properties": {"email": "x@y.com"}
        }));
        assert_eq!(item.name, "x@y.com");
    }

    #[test]
    fn test_name_falls_back_to_placeholder() {
        let item = normalize_contact(&json!({"id": "3", "properties": {}}));
        assert_eq!(item.name, "Unnamed Contact");
        assert!(item.creation_time.is_none());
        assert!(!item.extra.contains_key("company"));
        assert!(!item.extra.contains_key("last_updated"));
    }

    #[test]
    fn test_unparseable_timestamp_is_none() {
        let item = normalize_contact(&json!({
            "id": "4",
            "createdAt": "yesterday",
            "properties": {"firstname": "A"}
        }));
        assert!(item.creation_time.is_none());
    }

    #[test]
    fn test_defaults_fill_everything() {
        let mut provider = ProviderConfig::default();
        apply_defaults(&mut provider);
        assert_eq!(provider.display_name.as_deref(), Some("HubSpot"));
        assert_eq!(provider.items_url.as_deref(), Some(CONTACTS_URL));
        assert_eq!(provider.optional_scopes.len(), 2);
        assert_eq!(provider.item_properties.len(), 6);
        assert_eq!(provider.use_pkce, Some(false));
    }
}
