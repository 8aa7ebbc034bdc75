//! Final policy document and identity context.

use authorizer_sdk::{
    AuthorizationResult, Effect, INVOKE_ACTION, POLICY_VERSION, PolicyDocument, Statement,
    UNAUTHORISED_PRINCIPAL,
};
use gatekeeper_security::AuthorizerContext;

use super::arn::ResourceArn;
use super::claims::Identity;
use super::synthesizer::GrantStatement;
use crate::config::AuthorizerConfig;

pub struct PolicyBuilder {
    deny_on_empty: bool,
    pin_stage: bool,
}

impl PolicyBuilder {
    #[must_use]
    pub fn new(cfg: &AuthorizerConfig) -> Self {
        Self {
            deny_on_empty: cfg.deny_on_empty,
            pin_stage: cfg.pin_stage,
        }
    }

    /// Render statements against the requested API and attach the caller context.
    ///
    /// Without any Allow statement the principal is `Unauthorised`; the context
    /// is attached either way.
    #[must_use]
    pub fn build(
        &self,
        identity: &Identity,
        statements: &[GrantStatement],
        requested: &ResourceArn,
    ) -> AuthorizationResult {
        let mut rendered: Vec<Statement> = statements
            .iter()
            .map(|s| Statement {
                effect: s.effect,
                action: INVOKE_ACTION.to_owned(),
                resource: s
                    .grants
                    .iter()
                    .map(|g| requested.for_grant(g, self.pin_stage).to_string())
                    .collect(),
            })
            .collect();

        let allowed = rendered.iter().any(|s| s.effect == Effect::Allow);
        if !allowed && self.deny_on_empty {
            rendered.push(Statement {
                effect: Effect::Deny,
                action: INVOKE_ACTION.to_owned(),
                resource: vec![requested.to_string()],
            });
        }

        let principal_id = if allowed {
            identity.subject.clone()
        } else {
            UNAUTHORISED_PRINCIPAL.to_owned()
        };

        AuthorizationResult {
            principal_id,
            policy_document: PolicyDocument {
                version: POLICY_VERSION.to_owned(),
                statement: rendered,
            },
            context: AuthorizerContext::builder()
                .tenant_id(&identity.tenant_id)
                .caller_email(&identity.email)
                .build(),
        }
    }
}
