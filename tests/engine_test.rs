// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Integration tests for the PoC scan engine
 * Scripted-dispatcher scenarios for verdict semantics, short-circuiting
 * and extraction, plus mockito-backed tests of the real transport.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use lonkero_poc::errors::{Result, ScannerError};
use lonkero_poc::http_client::{HttpDispatch, RawResponse};
use lonkero_poc::poc::{PocEvent, PocRule};
use lonkero_poc::protocol::Request;
use lonkero_poc::reverse::ReverseConfig;
use lonkero_poc::scanner::{Scanner, ScannerConfig};

const TARGET: &str = "http://target.example";

type Handler = Box<dyn Fn(&Request) -> Result<RawResponse> + Send + Sync>;

/// Scripted transport: answers from a closure and records every probe URL.
struct MockDispatch {
    handler: Handler,
    log: Mutex<Vec<String>>,
}

impl MockDispatch {
    fn new(
        handler: impl Fn(&Request) -> Result<RawResponse> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            handler: Box::new(handler),
            log: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

impl HttpDispatch for MockDispatch {
    fn dispatch(&self, request: &Request, _follow_redirects: bool) -> Result<RawResponse> {
        self.log.lock().unwrap().push(request.url.full.clone());
        (self.handler)(request)
    }
}

fn respond(status: u16, body: &str) -> Result<RawResponse> {
    Ok(RawResponse {
        status,
        headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
        body: body.as_bytes().to_vec(),
    })
}

fn rule(method: &str, path: &str, expression: &str) -> PocRule {
    PocRule {
        method: method.to_string(),
        path: path.to_string(),
        expression: expression.to_string(),
        ..Default::default()
    }
}

fn search_rule(path: &str, search: &str) -> PocRule {
    PocRule {
        method: "GET".to_string(),
        path: path.to_string(),
        search: search.to_string(),
        ..Default::default()
    }
}

fn scanner_with(
    poc: &PocEvent,
    dispatch: Arc<MockDispatch>,
    reverse: Option<ReverseConfig>,
) -> Scanner {
    Scanner::with_config(
        poc,
        ScannerConfig {
            reverse,
            dispatch: Some(dispatch),
            ..Default::default()
        },
    )
    .unwrap()
}

#[test]
fn test_simple_string_match_verifies() {
    let poc = PocEvent {
        name: "simple-match".to_string(),
        rules: vec![rule(
            "GET",
            "/",
            r#"response.status == 200 && response.body.bcontains(b"hello")"#,
        )],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, "hello world"));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(scanner.run(TARGET).unwrap());
}

#[test]
fn test_simple_string_match_fails_on_status() {
    let poc = PocEvent {
        name: "simple-match".to_string(),
        rules: vec![rule(
            "GET",
            "/",
            r#"response.status == 200 && response.body.bcontains(b"hello")"#,
        )],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(404, "hello world"));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(!scanner.run(TARGET).unwrap());
}

#[test]
fn test_simple_string_match_fails_on_body() {
    let poc = PocEvent {
        name: "simple-match".to_string(),
        rules: vec![rule(
            "GET",
            "/",
            r#"response.status == 200 && response.body.bcontains(b"hello")"#,
        )],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, "goodbye"));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(!scanner.run(TARGET).unwrap());
}

#[test]
fn test_template_substitution_reaches_the_wire() {
    let mut set = BTreeMap::new();
    set.insert("flag".to_string(), "randomLowercase(6)".to_string());
    let poc = PocEvent {
        name: "echo".to_string(),
        set,
        rules: vec![rule(
            "GET",
            "/echo?x={{flag}}",
            "response.body_string.contains(flag)",
        )],
        ..Default::default()
    };
    // echo the query string back as the body
    let dispatch = MockDispatch::new(|request| respond(200, &request.url.query));
    let mut scanner = scanner_with(&poc, dispatch.clone(), None);

    let flag = scanner.bindings()["flag"].format();
    assert_eq!(flag.len(), 6);

    assert!(scanner.run(TARGET).unwrap());
    let calls = dispatch.calls();
    assert_eq!(calls.len(), 1);
    // the concrete flag value appears literally in the outgoing path
    assert!(calls[0].contains(&format!("x={flag}")));
}

#[test]
fn test_search_extraction_feeds_later_rules() {
    let poc = PocEvent {
        name: "extract".to_string(),
        rules: vec![
            search_rule("/token", "token=(?P<tok>[a-z0-9]+)"),
            rule(
                "GET",
                "/use?t={{tok}}",
                r#"response.status == 200 && tok == "abc123""#,
            ),
        ],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|request| {
        if request.url.path.ends_with("/token") {
            respond(200, "session token=abc123 issued")
        } else {
            respond(200, "")
        }
    });
    let mut scanner = scanner_with(&poc, dispatch.clone(), None);
    assert!(scanner.run(TARGET).unwrap());

    // the capture persisted into the engine bindings and the template
    assert_eq!(scanner.bindings()["tok"].format(), "abc123");
    let calls = dispatch.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls[1].contains("t=abc123"));
}

#[test]
fn test_search_miss_is_false_not_error() {
    let poc = PocEvent {
        name: "extract-miss".to_string(),
        rules: vec![search_rule("/token", "token=(?P<tok>[a-z0-9]+)")],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, "nothing to see"));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(!scanner.run(TARGET).unwrap());
}

#[test]
fn test_rules_list_short_circuits() {
    let poc = PocEvent {
        name: "and-short-circuit".to_string(),
        rules: vec![
            rule("GET", "/first", "response.status == 500"),
            rule("GET", "/second", "response.status == 200"),
        ],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let mut scanner = scanner_with(&poc, dispatch.clone(), None);
    assert!(!scanner.run(TARGET).unwrap());
    // rule two is never dispatched after rule one verdicts false
    assert_eq!(dispatch.calls().len(), 1);
}

#[test]
fn test_groups_verify_with_or_semantics() {
    let mut groups = BTreeMap::new();
    groups.insert(
        "g1".to_string(),
        vec![rule("GET", "/miss", "response.status == 404")],
    );
    groups.insert(
        "g2".to_string(),
        vec![rule("GET", "/hit", "response.status == 200")],
    );
    let poc = PocEvent {
        name: "group-or".to_string(),
        groups,
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(scanner.run(TARGET).unwrap());
}

#[test]
fn test_groups_short_circuit_after_first_verifying_group() {
    let mut groups = BTreeMap::new();
    groups.insert(
        "a".to_string(),
        vec![rule("GET", "/a", "response.status == 200")],
    );
    groups.insert(
        "b".to_string(),
        vec![rule("GET", "/b", "response.status == 200")],
    );
    let poc = PocEvent {
        name: "group-short-circuit".to_string(),
        groups,
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let mut scanner = scanner_with(&poc, dispatch.clone(), None);
    assert!(scanner.run(TARGET).unwrap());

    let calls = dispatch.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls.iter().any(|url| url.contains("/b")));
}

#[test]
fn test_rules_run_before_groups_when_both_present() {
    let mut groups = BTreeMap::new();
    groups.insert(
        "fallback".to_string(),
        vec![rule("GET", "/group", "response.status == 200")],
    );
    let poc = PocEvent {
        name: "both".to_string(),
        rules: vec![rule("GET", "/list", "response.status == 500")],
        groups,
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let mut scanner = scanner_with(&poc, dispatch.clone(), None);
    // the list fails, the group verifies
    assert!(scanner.run(TARGET).unwrap());
    let calls = dispatch.calls();
    assert!(calls[0].contains("/list"));
    assert!(calls[1].contains("/group"));
}

#[test]
fn test_transport_error_surfaces_as_error() {
    let poc = PocEvent {
        name: "transport".to_string(),
        rules: vec![rule("GET", "/", "response.status == 200")],
        ..Default::default()
    };
    let dispatch =
        MockDispatch::new(|_| Err(ScannerError::Transport("connection refused".to_string())));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(matches!(
        scanner.run(TARGET),
        Err(ScannerError::Transport(_))
    ));
}

#[test]
fn test_runtime_expression_error_is_not_a_false_verdict() {
    let poc = PocEvent {
        name: "substr-error".to_string(),
        rules: vec![rule("GET", "/", r#"substr("abcdef", 2, 10) == "x""#)],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(matches!(
        scanner.run(TARGET),
        Err(ScannerError::Evaluate { .. })
    ));
}

#[test]
fn test_compile_error_fails_construction() {
    let poc = PocEvent {
        name: "bad-expression".to_string(),
        rules: vec![rule("GET", "/", "response.status ==")],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let result = Scanner::with_config(
        &poc,
        ScannerConfig {
            dispatch: Some(dispatch),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(ScannerError::Compile { .. })));
}

#[test]
fn test_invalid_search_pattern_fails_construction() {
    let poc = PocEvent {
        name: "bad-search".to_string(),
        rules: vec![search_rule("/", "(")],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|_| respond(200, ""));
    let result = Scanner::with_config(
        &poc,
        ScannerConfig {
            dispatch: Some(dispatch),
            ..Default::default()
        },
    );
    assert!(matches!(result, Err(ScannerError::InvalidSearch { .. })));
}

#[test]
fn test_reverse_callback_detected() {
    let mut reverse = ReverseConfig::new("callback.example", "testtoken");
    reverse.api = "http://collector.example/records".to_string();

    let mut set = BTreeMap::new();
    set.insert("r".to_string(), "newReverse()".to_string());
    let poc = PocEvent {
        name: "blind-ssrf".to_string(),
        set,
        rules: vec![rule("GET", "/inject?x={{r.url}}", "r.wait(0)")],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|request| {
        if request.url.domain == "collector.example" {
            // an interaction was recorded for the flag
            respond(200, r#"{"meta": {}, "data": [{"id": 1}]}"#)
        } else {
            respond(200, "")
        }
    });
    let mut scanner = scanner_with(&poc, dispatch.clone(), Some(reverse));
    assert!(scanner.run(TARGET).unwrap());

    let calls = dispatch.calls();
    // the probe carries the minted callback URL
    assert!(calls[0].contains("callback.example"));
    // at least one collector query followed the probe
    assert!(calls[1..]
        .iter()
        .any(|url| url.contains("token=testtoken") && url.contains("filter=")));
}

#[test]
fn test_reverse_callback_absent() {
    let mut reverse = ReverseConfig::new("callback.example", "testtoken");
    reverse.api = "http://collector.example/records".to_string();

    let mut set = BTreeMap::new();
    set.insert("r".to_string(), "newReverse()".to_string());
    let poc = PocEvent {
        name: "blind-ssrf".to_string(),
        set,
        rules: vec![rule("GET", "/inject?x={{r.url}}", "r.wait(0)")],
        ..Default::default()
    };
    let dispatch = MockDispatch::new(|request| {
        if request.url.domain == "collector.example" {
            respond(200, r#"{"meta": {}, "data": []}"#)
        } else {
            respond(200, "")
        }
    });
    let mut scanner = scanner_with(&poc, dispatch.clone(), Some(reverse));
    assert!(!scanner.run(TARGET).unwrap());

    // both dns and http record types were queried before giving up
    let collector_calls: Vec<_> = dispatch
        .calls()
        .into_iter()
        .filter(|url| url.contains("collector.example"))
        .collect();
    assert!(collector_calls.iter().any(|url| url.contains("type=dns")));
    assert!(collector_calls.iter().any(|url| url.contains("type=http")));
}

#[test]
fn test_yaml_poc_end_to_end() {
    let poc = PocEvent::from_yaml(
        r#"
name: poc-yaml-login-page
set:
  payload: base64("probe")
rules:
  - method: POST
    path: /login
    headers:
      Content-Type: application/x-www-form-urlencoded
    body: "user=admin&token={{payload}}"
    expression: response.status == 200 && response.body_string.icontains("WELCOME")
"#,
    )
    .unwrap();
    let dispatch = MockDispatch::new(|request| {
        let body = String::from_utf8_lossy(&request.body).into_owned();
        if request.method == "POST" && body.contains("token=cHJvYmU=") {
            respond(200, "welcome back")
        } else {
            respond(403, "denied")
        }
    });
    let mut scanner = scanner_with(&poc, dispatch, None);
    assert!(scanner.run(TARGET).unwrap());
}

// ---------------------------------------------------------------------------
// Real transport through mockito
// ---------------------------------------------------------------------------

#[test]
fn test_reqwest_dispatch_end_to_end() {
    let mut server = mockito::Server::new();
    let _health = server
        .mock("GET", "/health")
        .with_status(200)
        .with_body("status: ok - hello")
        .create();

    let poc = PocEvent {
        name: "real-transport".to_string(),
        rules: vec![rule(
            "GET",
            "/health",
            r#"response.status == 200 && response.body_string.contains("hello")"#,
        )],
        ..Default::default()
    };
    let mut scanner = Scanner::new(&poc).unwrap();
    assert!(scanner.run(&server.url()).unwrap());
}

#[test]
fn test_reqwest_dispatch_honours_redirect_flag() {
    let mut server = mockito::Server::new();
    let _old = server
        .mock("GET", "/old")
        .with_status(302)
        .with_header("Location", "/new")
        .create();
    let _new = server
        .mock("GET", "/new")
        .with_status(200)
        .with_body("moved here")
        .create();

    let mut followed = rule(
        "GET",
        "/old",
        r#"response.status == 200 && response.body_string.contains("moved")"#,
    );
    followed.follow_redirects = true;
    let poc = PocEvent {
        name: "redirects-followed".to_string(),
        rules: vec![followed],
        ..Default::default()
    };
    let mut scanner = Scanner::new(&poc).unwrap();
    assert!(scanner.run(&server.url()).unwrap());

    let poc = PocEvent {
        name: "redirects-not-followed".to_string(),
        rules: vec![rule("GET", "/old", "response.status == 302")],
        ..Default::default()
    };
    let mut scanner = Scanner::new(&poc).unwrap();
    assert!(scanner.run(&server.url()).unwrap());
}
