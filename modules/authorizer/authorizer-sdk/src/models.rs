//! Domain models for the authorizer module.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use gatekeeper_security::AuthorizerContext;
use serde::{Deserialize, Deserializer, Serialize};

/// Policy language version understood by the gateway.
pub const POLICY_VERSION: &str = "2012-10-17";

/// The only action a statement ever grants or denies.
pub const INVOKE_ACTION: &str = "execute-api:Invoke";

/// Principal reported when the caller ends up with no Allow statement.
pub const UNAUTHORISED_PRINCIPAL: &str = "Unauthorised";

/// Authorizer event as delivered by the gateway.
///
/// REQUEST-type events carry the token in `headers`; TOKEN-type events put it
/// in `authorizationToken`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authorization_token: Option<String>,
    /// ARN of the method being invoked.
    pub method_arn: String,
    /// A `null` value from the gateway is read as no headers.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub headers: HashMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_context: Option<RequestContext>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AuthorizerRequest {
    #[must_use]
    pub fn new(method_arn: &str) -> Self {
        Self {
            method_arn: method_arn.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.insert(name.to_owned(), value.to_owned());
        self
    }

    #[must_use]
    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_context = Some(RequestContext {
            request_id: Some(request_id.to_owned()),
        });
        self
    }

    /// Look up a header by name.
    ///
    /// An exact-case match wins. Otherwise the name is matched ignoring ASCII
    /// case, and several such matches count as no header at all.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        if let Some(value) = self.headers.get(name) {
            return Some(value.as_str());
        }
        let mut matches = self
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case(name));
        match (matches.next(), matches.next()) {
            (Some((_, value)), None) => Some(value.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.request_context
            .as_ref()
            .and_then(|ctx| ctx.request_id.as_deref())
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<HashMap<String, String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<HashMap<String, String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Successful authorization decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationResult {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    pub context: AuthorizerContext,
}

impl AuthorizationResult {
    /// Statements with `Allow` effect, in document order.
    pub fn allows(&self) -> impl Iterator<Item = &Statement> {
        self.policy_document
            .statement
            .iter()
            .filter(|s| s.effect == Effect::Allow)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(rename = "Version")]
    pub version: String,
    #[serde(rename = "Statement")]
    pub statement: Vec<Statement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Statement {
    pub effect: Effect,
    pub action: String,
    pub resource: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// HTTP method of a grant. `Any` renders as the `*` wildcard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum HttpMethod {
    #[serde(rename = "GET")]
    Get,
    #[serde(rename = "POST")]
    Post,
    #[serde(rename = "PUT")]
    Put,
    #[serde(rename = "PATCH")]
    Patch,
    #[serde(rename = "DELETE")]
    Delete,
    #[serde(rename = "HEAD")]
    Head,
    #[serde(rename = "OPTIONS")]
    Options,
    #[serde(rename = "*")]
    Any,
}

impl HttpMethod {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Any => "*",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            "HEAD" => Ok(Self::Head),
            "OPTIONS" => Ok(Self::Options),
            "*" => Ok(Self::Any),
            other => Err(format!("unsupported HTTP method '{other}'")),
        }
    }
}

/// Permission to call `method` on every path matching `resource`.
///
/// `*` matches any value at a segment; a trailing `*` matches the prefix and
/// everything below it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceGrant {
    pub method: HttpMethod,
    pub resource: String,
}

impl ResourceGrant {
    #[must_use]
    pub fn new(method: HttpMethod, resource: &str) -> Self {
        Self {
            method,
            resource: resource.to_owned(),
        }
    }
}

/// Which vocabulary recognised a role, and where it sorts in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleKind {
    /// Exact-match catalog entry; `rank` is its position in the catalog.
    Legacy { rank: usize },
    /// Compiled `Entity.Scope` token.
    Functional,
}

/// Grants one role token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleGrants {
    pub role: String,
    pub kind: RoleKind,
    pub grants: Vec<ResourceGrant>,
    /// Resources of these grants also need a CORS preflight allowance.
    pub preflight: bool,
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_event_deserializes() {
        let event = json!({
            "type": "REQUEST",
            "methodArn": "arn:aws:execute-api:eu-west-1:123:abc/prod/GET/clinics",
            "headers": { "authorization": "Bearer t0k" },
            "requestContext": { "requestId": "req-1", "stage": "prod" }
        });

        let req: AuthorizerRequest = serde_json::from_value(event).unwrap();
        assert_eq!(req.header("Authorization"), Some("Bearer t0k"));
        assert_eq!(req.request_id(), Some("req-1"));
        assert!(req.authorization_token.is_none());
    }

    #[test]
    fn test_token_event_deserializes() {
        let event = json!({
            "type": "TOKEN",
            "authorizationToken": "Bearer t0k",
            "methodArn": "arn:aws:execute-api:eu-west-1:123:abc/prod/GET/clinics"
        });

        let req: AuthorizerRequest = serde_json::from_value(event).unwrap();
        assert_eq!(req.authorization_token.as_deref(), Some("Bearer t0k"));
        assert!(req.headers.is_empty());
        assert_eq!(req.request_id(), None);
    }

    #[test]
    fn test_null_headers_read_as_empty() {
        let event = json!({
            "type": "REQUEST",
            "methodArn": "arn:aws:execute-api:eu-west-1:123:abc/prod/GET/clinics",
            "headers": null
        });

        let req: AuthorizerRequest = serde_json::from_value(event).unwrap();
        assert!(req.headers.is_empty());
        assert_eq!(req.header("Authorization"), None);
    }

    #[test]
    fn test_header_exact_case_wins() {
        let req = AuthorizerRequest::new("arn")
            .with_header("authorization", "Bearer lower")
            .with_header("Authorization", "Bearer exact");

        assert_eq!(req.header("Authorization"), Some("Bearer exact"));
        assert_eq!(req.header("authorization"), Some("Bearer lower"));
    }

    #[test]
    fn test_header_ambiguous_case_is_absent() {
        let req = AuthorizerRequest::new("arn")
            .with_header("authorization", "Bearer a")
            .with_header("AUTHORIZATION", "Bearer b");

        assert_eq!(req.header("Authorization"), None);
    }

    #[test]
    fn test_result_serializes_in_gateway_shape() {
        let result = AuthorizationResult {
            principal_id: "user-1".to_owned(),
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_owned(),
                statement: vec![Statement {
                    effect: Effect::Allow,
                    action: INVOKE_ACTION.to_owned(),
                    resource: vec!["arn:aws:execute-api:r:a:api/s/GET/x".to_owned()],
                }],
            },
            context: AuthorizerContext::builder()
                .tenant_id("t")
                .caller_email("e@x")
                .build(),
        };

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(
            value,
            json!({
                "principalId": "user-1",
                "policyDocument": {
                    "Version": "2012-10-17",
                    "Statement": [{
                        "Effect": "Allow",
                        "Action": "execute-api:Invoke",
                        "Resource": ["arn:aws:execute-api:r:a:api/s/GET/x"]
                    }]
                },
                "context": { "tenantId": "t", "callerEmail": "e@x" }
            })
        );
    }

    #[test]
    fn test_http_method_parse() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!("*".parse::<HttpMethod>().unwrap(), HttpMethod::Any);
        assert!("TRACE".parse::<HttpMethod>().is_err());
    }

    #[test]
    fn test_http_method_serde() {
        let m: HttpMethod = serde_json::from_value(json!("OPTIONS")).unwrap();
        assert_eq!(m, HttpMethod::Options);
        assert_eq!(serde_json::to_value(HttpMethod::Any).unwrap(), json!("*"));
    }
}
