//! Gateway method ARNs: `arn:aws:execute-api:{region}:{account}:{apiId}/{stage}/{verb}/{resource}`.

use std::fmt;
use std::str::FromStr;

use authorizer_sdk::{HttpMethod, ResourceGrant};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ArnError {
    #[error("ARN is null or blank")]
    Blank,

    #[error("ARN does not consist of six colon-delimited parts")]
    PartCount,

    #[error("ARN part 0 should be exact string 'arn'")]
    NotArn,

    #[error("ARN part 1 should be exact string 'aws'")]
    NotAws,

    #[error("ARN part 2 is not 'execute-api' - this is not an API Gateway ARN")]
    NotExecuteApi,

    #[error("ARN path should consist of at least three parts: /{{apiId}}/{{stage}}/{{httpVerb}}/")]
    ShortPath,

    #[error("ARN names unsupported HTTP verb '{0}'")]
    Verb(String),
}

/// Parsed method ARN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceArn {
    pub region: String,
    pub account_id: String,
    pub api_id: String,
    pub stage: String,
    pub http_verb: HttpMethod,
    /// First path segment after the verb, possibly empty for the root resource.
    pub resource: String,
    /// Remaining segments below `resource`.
    pub child_resource: Option<String>,
}

impl ResourceArn {
    /// ARN for `grant` on the same API, with every stage or only this one.
    #[must_use]
    pub fn for_grant(&self, grant: &ResourceGrant, pin_stage: bool) -> Self {
        let (resource, child_resource) = split_resource(&grant.resource);
        Self {
            region: self.region.clone(),
            account_id: self.account_id.clone(),
            api_id: self.api_id.clone(),
            stage: if pin_stage {
                self.stage.clone()
            } else {
                "*".to_owned()
            },
            http_verb: grant.method,
            resource,
            child_resource,
        }
    }
}

fn split_resource(path: &str) -> (String, Option<String>) {
    match path.split_once('/') {
        Some((head, rest)) => (head.to_owned(), Some(rest.to_owned())),
        None => (path.to_owned(), None),
    }
}

impl FromStr for ResourceArn {
    type Err = ArnError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().is_empty() {
            return Err(ArnError::Blank);
        }
        let parts: Vec<&str> = s.split(':').collect();
        let [arn, partition, service, region, account_id, path] = parts.as_slice() else {
            return Err(ArnError::PartCount);
        };
        if *arn != "arn" {
            return Err(ArnError::NotArn);
        }
        if *partition != "aws" {
            return Err(ArnError::NotAws);
        }
        if *service != "execute-api" {
            return Err(ArnError::NotExecuteApi);
        }

        let mut segments = path.splitn(4, '/');
        let (Some(api_id), Some(stage), Some(verb)) =
            (segments.next(), segments.next(), segments.next())
        else {
            return Err(ArnError::ShortPath);
        };
        let http_verb = verb
            .parse::<HttpMethod>()
            .map_err(|_| ArnError::Verb(verb.to_owned()))?;
        let (resource, child_resource) = split_resource(segments.next().unwrap_or_default());

        Ok(Self {
            region: (*region).to_owned(),
            account_id: (*account_id).to_owned(),
            api_id: api_id.to_owned(),
            stage: stage.to_owned(),
            http_verb,
            resource,
            child_resource,
        })
    }
}

impl fmt::Display for ResourceArn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "arn:aws:execute-api:{}:{}:{}/{}/{}/{}",
            self.region, self.account_id, self.api_id, self.stage, self.http_verb, self.resource
        )?;
        if let Some(child) = &self.child_resource {
            write!(f, "/{child}")?;
        }
        Ok(())
    }
}
