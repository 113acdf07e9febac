// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

#[cfg(test)]
mod csrf_tests {
    //! # CSRF 防护测试
    //!
    //! 覆盖令牌的生成、存储与校验：
    //! 1. 安全方法跳过校验，且不访问会话。
    //! 2. 令牌可以来自请求头或表单字段，比较在常数时间内完成。
    //! 3. 缺失或不匹配的令牌返回对应的安全类错误。

    use std::collections::HashMap;

    use mockall::{mock, predicate::*};
    use serde_json::{json, Value};
    use webrequest::{
        param::{CSRF_SESSION_KEY, CSRF_TOKEN_BYTES},
        Exception, MemorySession, ParamMap, RequestFacade, SessionStore,
    };

    mock! {
        pub Session {}

        impl SessionStore for Session {
            fn get(&self, key: &str) -> Option<String>;
            fn set(&mut self, key: &str, value: String);
        }
    }

    fn request(method: &str, headers: &[(&str, &str)], form: Value) -> RequestFacade {
        let mut server: HashMap<String, String> = headers
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        server.insert("REQUEST_METHOD".to_string(), method.to_string());
        let form: ParamMap = match form {
            Value::Object(map) => map,
            _ => ParamMap::new(),
        };
        RequestFacade::builder().server(server).form(form).build()
    }

    #[test]
    fn test_generate_stores_token_in_session() {
        let mut session = MockSession::new();
        session
            .expect_set()
            .with(eq(CSRF_SESSION_KEY), function(|v: &String| v.len() == CSRF_TOKEN_BYTES * 2))
            .times(1)
            .return_const(());

        let token = request("GET", &[], json!({})).generate_csrf_token(&mut session);
        assert_eq!(token.len(), 64);
    }

    #[test]
    fn test_safe_methods_skip_session() {
        let mut session = MockSession::new();
        session.expect_get().never();

        for method in ["GET", "HEAD", "OPTIONS"] {
            assert_eq!(request(method, &[], json!({})).validate_csrf(&session), Ok(()));
        }
    }

    #[test]
    fn test_header_token_is_accepted() {
        let mut session = MemorySession::new();
        let token = request("GET", &[], json!({})).generate_csrf_token(&mut session);

        let post = request("POST", &[("HTTP_X_CSRF_TOKEN", token.as_str())], json!({}));
        assert_eq!(post.validate_csrf(&session), Ok(()));
    }

    #[test]
    fn test_form_token_is_accepted() {
        let mut session = MockSession::new();
        session
            .expect_get()
            .with(eq(CSRF_SESSION_KEY))
            .return_const(Some("a".repeat(64)));

        let post = request("DELETE", &[], json!({"_token": "a".repeat(64)}));
        assert_eq!(post.validate_csrf(&session), Ok(()));
    }

    #[test]
    fn test_mismatch_is_an_error() {
        let mut session = MemorySession::new();
        request("GET", &[], json!({})).generate_csrf_token(&mut session);

        let forged = "0".repeat(64);
        let post = request("POST", &[("HTTP_X_CSRF_TOKEN", forged.as_str())], json!({}));
        let result = post.validate_csrf(&session);
        assert_eq!(result, Err(Exception::CsrfTokenMismatch));
        assert!(result.unwrap_err().is_security());
    }

    #[test]
    fn test_missing_token_is_an_error() {
        let mut session = MemorySession::new();
        request("GET", &[], json!({})).generate_csrf_token(&mut session);
        assert_eq!(
            request("PUT", &[], json!({})).validate_csrf(&session),
            Err(Exception::CsrfTokenMissing)
        );

        // 会话中没有令牌时同样拒绝
        let empty = MemorySession::new();
        let post = request("POST", &[], json!({"_token": "anything"}));
        assert_eq!(post.validate_csrf(&empty), Err(Exception::CsrfTokenMissing));
    }

    #[test]
    fn test_tunneled_safe_method_still_needs_token() {
        let session = MemorySession::new();
        let tunneled = request("POST", &[], json!({"_method": "GET"}));
        assert!(tunneled.is_get());
        assert_eq!(tunneled.validate_csrf(&session), Err(Exception::CsrfTokenMissing));

        let tunneled_delete = request("POST", &[], json!({"_method": "DELETE"}));
        assert_eq!(
            tunneled_delete.validate_csrf(&session),
            Err(Exception::CsrfTokenMissing)
        );
    }

    #[test]
    fn test_regenerated_token_replaces_old_one() {
        let mut session = MemorySession::new();
        let request = request("GET", &[], json!({}));
        let first = request.generate_csrf_token(&mut session);
        let second = request.generate_csrf_token(&mut session);
        assert_ne!(first, second);
        assert_eq!(session.get(CSRF_SESSION_KEY), Some(second));
    }
}
