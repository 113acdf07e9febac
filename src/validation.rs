// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 表单校验模块
//!
//! 只支持三条规则：`required`、`email`、`min:N`。规则字符串以 `|` 分隔，
//! 按从左到右的顺序执行，同一字段遇到第一条失败的规则即停止，每个字段最多记录一条错误。
//!
//! 除 `required` 外的规则在值缺失（`null`）时直接跳过。

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use serde_json::Value;

/// 字段名到第一条错误信息的映射，为空表示校验通过
pub type ValidationErrors = BTreeMap<String, String>;

lazy_static! {
    static ref EMAIL_PATTERN: Regex = Regex::new(
        r"^[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+(\.[A-Za-z0-9!#$%&'*+/=?^_`{|}~-]+)*@[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?(\.[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .unwrap();
}

/// 单条已解析的规则
#[derive(Debug, Clone, PartialEq, Eq)]
enum Rule {
    Required,
    Email,
    Min(usize),
}

impl Rule {
    /// 解析单个规则记号，无法识别时返回 `None`
    fn parse(token: &str) -> Option<Rule> {
        let token = token.trim();
        match token.split_once(':') {
            Some(("min", n)) => n.trim().parse().ok().map(Rule::Min),
            Some(_) => None,
            None => match token {
                "required" => Some(Rule::Required),
                "email" => Some(Rule::Email),
                _ => None,
            },
        }
    }

    /// 对值执行规则，失败时返回错误信息
    fn check(&self, field: &str, value: &Value) -> Option<String> {
        match self {
            Rule::Required => {
                if is_empty(value) {
                    return Some(format!("The {} field is required.", field));
                }
            }
            Rule::Email => {
                if !value.is_null() && !is_email(&to_text(value)) {
                    return Some(format!("The {} must be a valid email address.", field));
                }
            }
            Rule::Min(n) => {
                if !value.is_null() && to_text(value).chars().count() < *n {
                    return Some(format!("The {} must be at least {} characters.", field, n));
                }
            }
        }
        None
    }
}

/// 按规则校验字段。
///
/// `lookup` 负责按字段名取出原始（未转义）的输入值，缺失时返回 `Value::Null`。
pub fn validate<F>(rules: &[(&str, &str)], lookup: F) -> ValidationErrors
where
    F: Fn(&str) -> Value,
{
    let mut errors = ValidationErrors::new();
    for (field, rule_string) in rules {
        let value = lookup(field);
        for token in rule_string.split('|').filter(|t| !t.trim().is_empty()) {
            let rule = match Rule::parse(token) {
                Some(rule) => rule,
                None => {
                    warn!("字段{}的校验规则无法识别，已忽略：{}", field, token);
                    continue;
                }
            };
            if let Some(message) = rule.check(field, &value) {
                errors.insert(field.to_string(), message);
                break;
            }
        }
    }
    errors
}

/// "空值"判断：`null`、空字符串、`"0"`、数字 0、`false`、空数组与空对象
pub fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
    }
}

/// 将任意值转换为文本，用于长度与格式检查
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn is_email(text: &str) -> bool {
    match text.rsplit_once('@') {
        Some((local, _)) if local.len() > 64 => false,
        Some(_) => text.len() <= 254 && EMAIL_PATTERN.is_match(text),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn lookup_in(data: Value) -> impl Fn(&str) -> Value {
        move |key: &str| data.get(key).cloned().unwrap_or(Value::Null)
    }

    #[test]
    fn test_required_stops_before_email() {
        let errors = validate(&[("email", "required|email")], lookup_in(json!({"email": ""})));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors["email"], "The email field is required.");
    }

    #[test]
    fn test_email_rule() {
        let errors = validate(&[("email", "required|email")], lookup_in(json!({"email": "bad@"})));
        assert_eq!(errors["email"], "The email must be a valid email address.");

        let errors = validate(
            &[("email", "required|email")],
            lookup_in(json!({"email": "user@example.com"})),
        );
        assert!(errors.is_empty());
    }

    #[test]
    fn test_min_rule_counts_characters() {
        let rules = [("name", "min:3")];
        assert!(validate(&rules, lookup_in(json!({"name": "张三丰"}))).is_empty());
        let errors = validate(&rules, lookup_in(json!({"name": "ab"})));
        assert_eq!(errors["name"], "The name must be at least 3 characters.");
    }

    #[test]
    fn test_min_rule_coerces_numbers() {
        let errors = validate(&[("pin", "min:4")], lookup_in(json!({"pin": 123})));
        assert!(errors.contains_key("pin"));
        assert!(validate(&[("pin", "min:4")], lookup_in(json!({"pin": 1234}))).is_empty());
    }

    #[test]
    fn test_optional_rules_skip_absent_values() {
        let errors = validate(&[("email", "email|min:5")], lookup_in(json!({})));
        assert!(errors.is_empty());
    }

    #[test]
    fn test_unknown_and_malformed_rules_are_ignored() {
        let errors = validate(&[("name", "unique|min:x|required")], lookup_in(json!({})));
        assert_eq!(errors["name"], "The name field is required.");
    }

    #[test]
    fn test_one_error_per_field_across_fields() {
        let errors = validate(
            &[("email", "required|email"), ("password", "required|min:8")],
            lookup_in(json!({"email": "x", "password": "short"})),
        );
        assert_eq!(errors.len(), 2);
        assert!(errors["email"].contains("valid email"));
        assert!(errors["password"].contains("at least 8"));
    }

    #[test]
    fn test_is_empty_semantics() {
        for value in [json!(null), json!(""), json!("0"), json!(0), json!(0.0), json!(false), json!([]), json!({})] {
            assert!(is_empty(&value), "{} should be empty", value);
        }
        for value in [json!(" "), json!("a"), json!(1), json!(true), json!([0]), json!({"a": 1})] {
            assert!(!is_empty(&value), "{} should not be empty", value);
        }
    }

    #[test]
    fn test_is_email() {
        assert!(is_email("first.last+tag@sub.example.org"));
        assert!(!is_email("no-at-sign.example.com"));
        assert!(!is_email(".lead@example.com"));
        assert!(!is_email("double..dot@example.com"));
        assert!(!is_email("user@localhost"));
        assert!(!is_email("user@-bad.com"));
    }
}
