// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

/**
 * Bountyy Oy - Template Substitution
 * Interpolates resolved bindings into a rule's path, headers and body.
 * `{{name}}` holes are replaced literally, with no escape syntax; unknown
 * holes are left untouched. After substitution the path is trimmed and
 * every space and `+` becomes `%20`.
 *
 * @copyright 2026 Bountyy Oy
 * @license Proprietary
 */

use std::collections::BTreeMap;

use crate::poc::PocRule;
use crate::reverse::Reverse;
use crate::set::SetValue;

/// Substitute every binding into the rule's templatable fields, returning
/// the concrete rule to probe with. Idempotent for a fixed binding set.
pub fn substitute_rule(rule: &PocRule, bindings: &BTreeMap<String, SetValue>) -> PocRule {
    let mut out = rule.clone();
    for (key, value) in bindings {
        match value {
            SetValue::Reverse(rev) => substitute_reverse(&mut out, key, rev),
            other => apply(&mut out, &hole(key), &other.format()),
        }
    }
    out.path = out.path.trim().to_string();
    out.path = out.path.replace(' ', "%20").replace('+', "%20");
    out
}

/// A reverse binding exposes dotted sub-keys for its fields; the bare key
/// renders as the probe URL.
fn substitute_reverse(rule: &mut PocRule, key: &str, rev: &Reverse) {
    apply(rule, &hole(&format!("{key}.url")), &rev.url);
    apply(rule, &hole(&format!("{key}.domain")), &rev.domain);
    apply(rule, &hole(&format!("{key}.flag")), &rev.flag);
    apply(rule, &hole(key), &rev.url);
}

fn hole(key: &str) -> String {
    format!("{{{{{key}}}}}")
}

fn apply(rule: &mut PocRule, hole: &str, value: &str) {
    rule.path = rule.path.replace(hole, value);
    rule.body = rule.body.replace(hole, value);
    for header_value in rule.headers.values_mut() {
        *header_value = header_value.replace(hole, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, SetValue)]) -> BTreeMap<String, SetValue> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn rule(path: &str, body: &str) -> PocRule {
        let mut headers = BTreeMap::new();
        headers.insert("x-probe".to_string(), "{{flag}}".to_string());
        PocRule {
            method: "GET".to_string(),
            path: path.to_string(),
            body: body.to_string(),
            headers,
            ..Default::default()
        }
    }

    #[test]
    fn test_substitutes_all_fields() {
        let b = bindings(&[
            ("flag", SetValue::Str("k3x9".into())),
            ("num", SetValue::Int(42)),
        ]);
        let out = substitute_rule(&rule("/echo?x={{flag}}&n={{num}}", "v={{flag}}"), &b);
        assert_eq!(out.path, "/echo?x=k3x9&n=42");
        assert_eq!(out.body, "v=k3x9");
        assert_eq!(out.headers["x-probe"], "k3x9");
    }

    #[test]
    fn test_unknown_holes_are_left() {
        let out = substitute_rule(&rule("/a/{{missing}}", ""), &BTreeMap::new());
        assert_eq!(out.path, "/a/{{missing}}");
    }

    #[test]
    fn test_idempotent() {
        let b = bindings(&[("flag", SetValue::Str("zzz".into()))]);
        let once = substitute_rule(&rule("  /p?q={{flag}} ", ""), &b);
        let twice = substitute_rule(&once, &b);
        assert_eq!(once.path, twice.path);
        assert_eq!(once.body, twice.body);
        assert_eq!(once.headers, twice.headers);
        assert!(!once.path.contains("{{flag}}"));
    }

    #[test]
    fn test_path_normalisation() {
        let b = bindings(&[("payload", SetValue::Str("1 or 1=1".into()))]);
        let out = substitute_rule(&rule("  /q?id={{payload}}+x ", ""), &b);
        assert_eq!(out.path, "/q?id=1%20or%201=1%20x");
        assert!(!out.path.contains(' '));
        assert!(!out.path.contains('+'));
    }

    #[test]
    fn test_reverse_dotted_keys() {
        let rev = Reverse {
            flag: "Ab3xY9Qz".into(),
            url: "http://Ab3xY9Qz.callback.example".into(),
            domain: "Ab3xY9Qz.callback.example".into(),
            is_domain_name_server: false,
        };
        let b = bindings(&[("r", SetValue::Reverse(rev))]);
        let probe = PocRule {
            path: "/inject?x={{r.url}}&d={{r.domain}}&f={{r.flag}}&raw={{r}}".to_string(),
            ..Default::default()
        };
        let out = substitute_rule(&probe, &b);
        assert_eq!(
            out.path,
            "/inject?x=http://Ab3xY9Qz.callback.example&d=Ab3xY9Qz.callback.example&f=Ab3xY9Qz&raw=http://Ab3xY9Qz.callback.example"
        );
    }

    #[test]
    fn test_body_is_not_trimmed() {
        let out = substitute_rule(&rule("/p", " keep-edges "), &BTreeMap::new());
        assert_eq!(out.body, " keep-edges ");
    }
}
