// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::collections::HashMap;

use crate::{
    models::{
        author::{AuthorReply, AuthorStatus},
        avp::{Args, Avp},
    },
    policy::Service,
};

/// Session authorizer: intersects the client's requested attributes with
/// the user's services and emits the server-side attribute list.
///
/// Each service is *activated* when any incoming AVP carries its name as
/// attribute or as value (the latter covers `shell*`, where the service
/// name travels in value position). An activated service contributes its
/// `set_values` once its matchers, if any, are satisfied by the incoming
/// attribute map. The walk deliberately visits every service even after
/// one contributed, and duplicate reply attributes are kept verbatim:
/// NX-OS style policies rely on repeated `shell:roles` keys.
#[derive(Debug, Clone)]
pub struct SessionAuthorizer {
    services: Vec<Service>,
    scope: String,
}

impl SessionAuthorizer {
    pub fn new(services: &[Service], scope: &str) -> Self {
        Self {
            services: services.to_vec(),
            scope: scope.to_string(),
        }
    }

    pub fn evaluate(&self, args: &Args) -> AuthorReply {
        // The localized scope participates in activation like any other
        // client attribute.
        let mut incoming = args.clone();
        incoming.push(Avp::new("scope", &self.scope));

        let mut reply_avps: Vec<Avp> = Vec::new();
        let mut replaces_request = false;

        for service in &self.services {
            let Some(activating) = incoming
                .iter()
                .find(|avp| avp.name() == service.name || avp.value() == service.name)
            else {
                continue;
            };

            if activating.optional() && activating.name() != "cmd" {
                replaces_request = true;
            }

            if !service.matches.is_empty() && !Self::matchers_pass(service, &incoming) {
                continue;
            }

            for set_value in &service.set_values {
                if set_value.optional {
                    replaces_request = true;
                    reply_avps.push(Avp::new_optional(&set_value.name, &set_value.value));
                } else {
                    reply_avps.push(Avp::new(&set_value.name, &set_value.value));
                }
            }
        }

        if reply_avps.is_empty() {
            return AuthorReply::status(AuthorStatus::Fail);
        }

        let status = if replaces_request {
            AuthorStatus::PassRepl
        } else {
            AuthorStatus::PassAdd
        };
        AuthorReply::with_args(status, reply_avps)
    }

    fn matchers_pass(service: &Service, incoming: &Args) -> bool {
        let mut attrs: HashMap<&str, &str> = HashMap::new();
        for avp in incoming.iter() {
            attrs.insert(avp.name(), avp.value());
        }

        service.matches.iter().all(|matcher| {
            attrs
                .get(matcher.name.as_str())
                .is_some_and(|got| matcher.values.iter().all(|want| want == got))
        })
    }
}
