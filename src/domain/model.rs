use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the input file is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputType {
    /// Newline-delimited JSON, pushed as one bulk request.
    #[default]
    Json,
    /// A captured HTTP transaction.
    Raw,
    /// Anything else, stored verbatim.
    Other,
}

impl From<&str> for InputType {
    fn from(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "json" => InputType::Json,
            "raw" => InputType::Raw,
            _ => InputType::Other,
        }
    }
}

/// One captured request/response pair, or a raw blob, as stored in the index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "project")]
    pub project_name: String,
    #[serde(rename = "host")]
    pub host_name: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub raw: String,
    #[serde(
        rename = "responseHTTPVersion",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub response_http_version: String,
    #[serde(
        rename = "responseStatusCode",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub response_status_code: String,
    #[serde(
        rename = "responseStatusMessage",
        default,
        skip_serializing_if = "String::is_empty"
    )]
    pub response_status_message: String,
    #[serde(rename = "requestHeader")]
    pub request_header: String,
    #[serde(rename = "requestBody", default, skip_serializing_if = "String::is_empty")]
    pub request_body: String,
    #[serde(rename = "responseHeader")]
    pub response_header: String,
    #[serde(rename = "responseBody")]
    pub response_body: String,
}

/// Fields recovered from a transaction dump. Metadata is attached separately
/// when the record is built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedInteraction {
    pub url: String,
    pub request_header: String,
    pub response_http_version: String,
    pub response_status_code: String,
    pub response_status_message: String,
    pub response_header: String,
    pub response_body: String,
}

impl InteractionRecord {
    pub fn from_parsed(
        parsed: ParsedInteraction,
        timestamp: DateTime<Utc>,
        project: &str,
        host: &str,
    ) -> Self {
        Self {
            timestamp,
            project_name: project.to_string(),
            host_name: host.to_string(),
            url: parsed.url,
            response_http_version: parsed.response_http_version,
            response_status_code: parsed.response_status_code,
            response_status_message: parsed.response_status_message,
            request_header: parsed.request_header,
            response_header: parsed.response_header,
            response_body: parsed.response_body,
            ..Default::default()
        }
    }

    pub fn from_raw(content: String, timestamp: DateTime<Utc>, project: &str) -> Self {
        Self {
            timestamp,
            project_name: project.to_string(),
            raw: content,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "project")]
    pub project_name: String,
    #[serde(rename = "host")]
    pub host_name: String,
    pub entry: String,
    pub level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_input_type_is_case_insensitive() {
        assert_eq!(InputType::from("JSON"), InputType::Json);
        assert_eq!(InputType::from("Raw"), InputType::Raw);
        assert_eq!(InputType::from("csv"), InputType::Other);
        assert_eq!(InputType::from(""), InputType::Other);
    }

    #[test]
    fn test_parsed_record_field_names() {
        let parsed = ParsedInteraction {
            url: "GET /x HTTP/1.1".to_string(),
            request_header: "Host: example.com".to_string(),
            response_http_version: "HTTP/1.1".to_string(),
            response_status_code: "200".to_string(),
            response_status_message: "OK".to_string(),
            response_header: "HTTP/1.1 200 OK".to_string(),
            response_body: "hello\n".to_string(),
        };
        let record = InteractionRecord::from_parsed(parsed, fixed_time(), "acme", "example.com");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["project"], "acme");
        assert_eq!(value["host"], "example.com");
        assert_eq!(value["responseHTTPVersion"], "HTTP/1.1");
        assert_eq!(value["responseStatusCode"], "200");
        assert_eq!(value["requestHeader"], "Host: example.com");
        assert!(value.get("raw").is_none());
        assert!(value.get("requestBody").is_none());
    }

    #[test]
    fn test_raw_record_omits_status_fields() {
        let record = InteractionRecord::from_raw("a,b,c\n".to_string(), fixed_time(), "acme");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["raw"], "a,b,c\n");
        assert_eq!(value["host"], "");
        assert!(value.get("responseStatusCode").is_none());
        // always present, even when empty
        assert_eq!(value["responseBody"], "");
        assert_eq!(value["url"], "");
    }
}
