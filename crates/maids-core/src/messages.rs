//! Static en-us message catalog.
//!
//! Messages are addressed by a dotted key (`server.<status>.<name>`) and
//! rendered by substituting `{{name}}` placeholders from a JSON object of
//! parameters. The key also determines the reply status, see
//! [`status_for_key`].

use serde_json::Value;

/// Keys of every message the service can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKey {
    MissingRequiredParameter,
    InvalidParameter,
    MaxNumOfIdsInRegisterExceeded,
    MaxNumOfIdsInCreatedExceeded,
    DuplicateAppId,
    Unauthorized,
    StoreUnavailable,
}

impl MessageKey {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingRequiredParameter => "server.400.missingRequiredParameter",
            Self::InvalidParameter => "server.400.invalidParameter",
            Self::MaxNumOfIdsInRegisterExceeded => "server.400.maxNumOfIdsInRegisterExceeded",
            Self::MaxNumOfIdsInCreatedExceeded => "server.400.maxNumOfIdsInCreatedExceeded",
            Self::DuplicateAppId => "server.400.duplicateAppId",
            Self::Unauthorized => "server.400.unauthorized",
            Self::StoreUnavailable => "server.500.storeUnavailable",
        }
    }

    const fn template(self) -> &'static str {
        match self {
            Self::MissingRequiredParameter => "Missing required parameter \"{{parameter}}\".",
            Self::InvalidParameter => {
                "Invalid parameter \"{{parameter}}\", the value must be of type {{type}}."
            }
            Self::MaxNumOfIdsInRegisterExceeded => {
                "Cannot register {{numOfIds}} App IDs in one request, the maximum is {{maxNumOfIds}}."
            }
            Self::MaxNumOfIdsInCreatedExceeded => {
                "Cannot create {{numOfIds}} App IDs in one request, the maximum is {{maxNumOfIds}}."
            }
            Self::DuplicateAppId => "The App ID \"{{id}}\" already exists.",
            Self::Unauthorized => "You are not authorized to perform this action.",
            Self::StoreUnavailable => {
                "The App ID store could not complete the request, please try again later."
            }
        }
    }

    /// Stable machine readable code: the lower-cased key.
    pub fn code(self) -> String {
        self.as_str().to_ascii_lowercase()
    }

    pub fn status(self) -> u16 {
        status_for_key(self.as_str())
    }

    pub fn render(self, data: &Value) -> String {
        render(self.template(), data)
    }
}

/// Derives a reply status from a message key.
///
/// A few well known keys map to their dedicated status, any other `server.*`
/// key uses its numeric second segment, everything else is a 500.
pub fn status_for_key(key: &str) -> u16 {
    match key {
        "server.400.forbidden" => 403,
        "server.400.notFound" => 404,
        "server.400.unauthorized" => 401,
        _ => {
            let mut parts = key.split('.');
            match (parts.next(), parts.next()) {
                (Some("server"), Some(status)) => status.parse().unwrap_or(500),
                _ => 500,
            }
        }
    }
}

/// Substitutes `{{name}}` placeholders with values from `data`.
///
/// Unknown placeholders are left untouched. String values are inserted
/// without quotes, other JSON values use their compact JSON form.
pub fn render(template: &str, data: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };

        let name = after[..end].trim();
        match data.get(name) {
            Some(Value::String(s)) => out.push_str(s),
            Some(value) => out.push_str(&value.to_string()),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_follows_the_key() {
        assert_eq!(status_for_key("server.400.duplicateAppId"), 400);
        assert_eq!(status_for_key("server.400.unauthorized"), 401);
        assert_eq!(status_for_key("server.400.forbidden"), 403);
        assert_eq!(status_for_key("server.400.notFound"), 404);
        assert_eq!(status_for_key("server.503.down"), 503);
        assert_eq!(status_for_key("server.abc.down"), 500);
        assert_eq!(status_for_key("client.400.oops"), 500);
        assert_eq!(MessageKey::StoreUnavailable.status(), 500);
    }

    #[test]
    fn codes_are_lower_case() {
        assert_eq!(MessageKey::DuplicateAppId.code(), "server.400.duplicateappid");
    }

    #[test]
    fn render_substitutes_known_placeholders() {
        let data = json!({ "parameter": "ids", "type": "string", "n": 3 });
        assert_eq!(
            render("{{parameter}} must be {{ type }} x{{n}}", &data),
            "ids must be string x3"
        );
        assert_eq!(render("keep {{missing}} as is", &data), "keep {{missing}} as is");
        assert_eq!(render("dangling {{parameter", &data), "dangling {{parameter");
        assert_eq!(render("no placeholders", &data), "no placeholders");
    }
}
