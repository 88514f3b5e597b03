// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use tacplus_server_rs::models::{
    author::{AuthorRequest, AuthorStatus},
    avp::{Args, Avp},
};

use super::scope_users;

const SECRETS: &str = r#"
secrets:
  - name: localhost
    secret: fortytwo
    provider: 1
    handler: 1
    options:
      prefixes: '["127.0.0.0/8"]'
"#;

fn request(user: &str, avps: Vec<Avp>) -> AuthorRequest {
    AuthorRequest {
        authen_method: 0x06,
        priv_lvl: 15,
        authen_type: 0x01,
        authen_service: 0x01,
        user: user.to_string(),
        port: "tty0".to_string(),
        rem_addr: "198.51.100.7".to_string(),
        args: Args::new(avps),
    }
}

fn shell_command(cmd: &str, cmd_args: &[&str]) -> Vec<Avp> {
    let mut avps = vec![Avp::new("service", "shell"), Avp::new("cmd", cmd)];
    avps.extend(cmd_args.iter().map(|a| Avp::new("cmd-arg", *a)));
    avps
}

#[test]
fn named_permit_rule_passes_the_command() {
    let doc = format!(
        r#"{SECRETS}
users:
  - name: oper
    scopes: [localhost]
    author_version: 1
    commands:
      - name: show
        action: 2
"#
    );
    let users = scope_users(&doc, "localhost");
    let bundle = users.get("oper").expect("user built");

    let outcome = bundle
        .authorizer
        .evaluate(&request("oper", shell_command("show", &["version"])));
    assert_eq!(outcome.reply.status, AuthorStatus::PassAdd);
    assert_eq!(outcome.variant, "command");

    let denied = bundle
        .authorizer
        .evaluate(&request("oper", shell_command("reload", &[])));
    assert_eq!(denied.reply.status, AuthorStatus::Fail);
}

#[test]
fn wildcard_permit_rule_passes_any_command() {
    let doc = format!(
        r#"{SECRETS}
users:
  - name: oper
    scopes: [localhost]
    author_version: 1
    commands:
      - name: "*"
        action: 2
"#
    );
    let users = scope_users(&doc, "localhost");
    let outcome = users
        .get("oper")
        .expect("user built")
        .authorizer
        .evaluate(&request("oper", shell_command("show", &["version"])));
    assert_eq!(outcome.reply.status, AuthorStatus::PassAdd);
}

#[test]
fn pipeline_without_pipe_permission_is_denied() {
    let doc = format!(
        r#"{SECRETS}
users:
  - name: oper
    scopes: [localhost]
    commands:
      - name: show
        action: 2
"#
    );
    let users = scope_users(&doc, "localhost");
    let outcome = users.get("oper").expect("user built").authorizer.evaluate(
        &request(
            "oper",
            shell_command("show", &["version", "|", "grep", "uptime"]),
        ),
    );
    assert_eq!(outcome.reply.status, AuthorStatus::Fail);
    assert_eq!(outcome.reply.server_msg, "not authorized");
    assert_eq!(outcome.variant, "command_pipe");
}

#[test]
fn pipeline_with_pipe_permission_passes_within_the_split_budget() {
    let doc = format!(
        r#"{SECRETS}
users:
  - name: oper
    scopes: [localhost]
    commands:
      - name: show
        action: 2
      - name: "|"
        action: 2
        match: ["sudo.*", "grep.*"]
"#
    );
    let users = scope_users(&doc, "localhost");
    let bundle = users.get("oper").expect("user built");

    let piped = request(
        "oper",
        shell_command("show", &["version", "|", "grep", "uptime"]),
    );
    assert_eq!(
        bundle.authorizer.evaluate(&piped).reply.status,
        AuthorStatus::PassAdd
    );

    // Six pipe segments blow the default budget of five separators.
    let mut flooded = vec!["version"];
    for _ in 0..6 {
        flooded.push("|");
        flooded.push("grep x");
    }
    let overflow = request("oper", shell_command("show", &flooded));
    assert_eq!(
        bundle.authorizer.evaluate(&overflow).reply.status,
        AuthorStatus::Fail
    );
}

#[test]
fn session_authorize_accumulates_every_matching_service() {
    let doc = format!(
        r#"{SECRETS}
users:
  - name: oper
    scopes: [foo-scope]
    services:
      - name: shell
        set_values:
          - name: priv-lvl
            value: "15"
            optional: true
          - name: shell:roles
            value: admin
            optional: true
      - name: foo-scope
        set_values:
          - name: firepower
            value: or bust
            optional: true
"#
    );
    let users = scope_users(&doc, "foo-scope");
    let outcome = users.get("oper").expect("user built").authorizer.evaluate(
        &request(
            "oper",
            vec![
                Avp::new("service", "shell"),
                Avp::new_optional("priv-lvl", "15"),
                Avp::new_optional("shell:roles", "admin"),
                Avp::new("scope", "foo-scope"),
            ],
        ),
    );

    assert_eq!(outcome.reply.status, AuthorStatus::PassRepl);
    assert_eq!(outcome.variant, "session");
    assert_eq!(
        outcome.reply.args,
        vec![
            Avp::new_optional("priv-lvl", "15"),
            Avp::new_optional("shell:roles", "admin"),
            Avp::new_optional("firepower", "or bust"),
        ]
    );
}
