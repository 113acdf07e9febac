// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod property_tests {
    //! # 请求对象属性测试
    //!
    //! 使用随机生成的输入检查与具体取值无关的约定：默认值回退、合并覆盖、转义与校验规则。

    use std::collections::HashMap;

    use proptest::prelude::*;
    use serde_json::{json, Value};
    use webrequest::{ParamMap, RequestFacade};

    fn query_of(keys: &[String]) -> ParamMap {
        keys.iter().map(|k| (k.clone(), json!("present"))).collect()
    }

    proptest! {
        /// 查询参数中不存在的键总是返回默认值
        #[test]
        fn absent_query_key_returns_default(
            keys in prop::collection::vec("[a-z]{1,8}", 0..8),
            probe in "[A-Z]{1,8}",
            default in any::<i64>(),
        ) {
            let request = RequestFacade::builder().query(query_of(&keys)).build();
            prop_assert_eq!(request.get(&probe, default), json!(default));
            prop_assert_eq!(request.input(&probe, default, false), json!(default));
        }

        /// 合并结果包含所有来源的键
        #[test]
        fn all_contains_every_key(
            query_keys in prop::collection::vec("[a-z]{1,6}", 0..6),
            form_keys in prop::collection::vec("[a-z]{1,6}", 0..6),
        ) {
            let form: ParamMap = form_keys.iter().map(|k| (k.clone(), json!("form"))).collect();
            let request = RequestFacade::builder()
                .query(query_of(&query_keys))
                .form(form)
                .build();
            let merged = request.all();
            for key in &query_keys {
                prop_assert!(merged.contains_key(key));
            }
            for key in &form_keys {
                prop_assert_eq!(&merged[key], &json!("form"));
            }
        }

        /// 不含 `<>&"'` 的字符串经过转义后保持不变
        #[test]
        fn sanitize_is_identity_on_plain_text(text in "[a-zA-Z0-9 _.,-]{0,32}") {
            let form: ParamMap = [("v".to_string(), Value::String(text.clone()))].into_iter().collect();
            let request = RequestFacade::builder().form(form).build();
            prop_assert_eq!(request.input("v", Value::Null, true), Value::String(text));
        }

        /// `min:N` 与字符数一致
        #[test]
        fn min_rule_matches_char_count(text in "\\PC{0,20}", n in 0usize..25) {
            let form: ParamMap = [("v".to_string(), Value::String(text.clone()))].into_iter().collect();
            let request = RequestFacade::builder().form(form).build();
            let rule = format!("min:{}", n);
            let errors = request.validate(&[("v", rule.as_str())]);
            prop_assert_eq!(errors.contains_key("v"), text.chars().count() < n);
        }

        /// 请求头查找与名称大小写无关
        #[test]
        fn header_lookup_ignores_case(name in "[A-Za-z]{1,10}(-[A-Za-z]{1,10}){0,2}", value in "[a-z0-9]{1,16}") {
            let key = format!("HTTP_{}", name.to_uppercase().replace('-', "_"));
            let mut server = HashMap::new();
            server.insert(key, value.clone());
            let request = RequestFacade::builder().server(server).build();
            prop_assert_eq!(request.header(&name.to_lowercase(), ""), value.as_str());
            prop_assert_eq!(request.header(&name.to_uppercase(), ""), value.as_str());
        }
    }
}
