use crate::application_port::ApiError;
use crate::domain_port::TransportResponse;
use serde::Deserialize;

/// Error envelope. Servers put the machine code in `code` and the human text
/// in `message`; older endpoints only send `error`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn parse(response: &TransportResponse) -> Self {
        serde_json::from_slice(&response.body).unwrap_or_default()
    }
}

pub(crate) fn server_error(response: &TransportResponse) -> ApiError {
    let body = ErrorBody::parse(response);
    ApiError::Server {
        status: response.status,
        code: body.code,
        message: body.message.or(body.error),
    }
}

/// Payload of a 2xx response; `None` for 204 or an empty body.
pub(crate) fn success_payload(
    response: &TransportResponse,
) -> Result<Option<serde_json::Value>, ApiError> {
    if response.status == 204 || response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice(&response.body)
        .map(Some)
        .map_err(|e| ApiError::Client(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_content_has_no_payload() {
        assert_eq!(success_payload(&TransportResponse::empty(204)).unwrap(), None);
        assert_eq!(success_payload(&TransportResponse::empty(200)).unwrap(), None);
    }

    #[test]
    fn malformed_payload_is_a_client_error() {
        let resp = TransportResponse::new(200, "<html>");
        assert!(matches!(success_payload(&resp), Err(ApiError::Client(_))));
    }

    #[test]
    fn server_error_falls_back_to_error_field() {
        let resp = TransportResponse::json(409, &json!({ "error": "duplicate name" }));
        assert_eq!(
            server_error(&resp),
            ApiError::Server {
                status: 409,
                code: None,
                message: Some("duplicate name".into()),
            }
        );
    }
}
