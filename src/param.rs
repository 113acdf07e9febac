// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 协议参数与常量模块
//!
//! 该模块定义了请求对象遵循的 HTTP 协议相关常量和数据结构，包括：
//! - 服务器元数据（CGI 风格）中使用的键名。
//! - 方法覆盖、CSRF 令牌、文件上传等约定的字段名。
//! - HTTP 方法与版本的强类型枚举。

use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;

/// 服务器名称标识，写入 `SERVER_SOFTWARE` 以及演示服务的响应头
pub const SERVER_NAME: &str = "shaneyale-webrequest";

/// HTTP 协议规定的换行符（Carriage Return Line Feed）
pub const CRLF: &str = "\r\n";

/// 服务器元数据中请求头条目的前缀，例如 `HTTP_USER_AGENT`
pub const HTTP_HEADER_PREFIX: &str = "HTTP_";

/// 用于在 POST 请求中隧道传递真实方法的请求头
pub const METHOD_OVERRIDE_HEADER: &str = "X-HTTP-Method-Override";

/// 用于在 POST 表单中隧道传递真实方法的字段
pub const METHOD_OVERRIDE_FIELD: &str = "_method";

/// 会话中保存 CSRF 令牌的保留键
pub const CSRF_SESSION_KEY: &str = "_csrf_token";

/// 携带 CSRF 令牌的请求头
pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

/// 携带 CSRF 令牌的表单字段
pub const CSRF_FIELD: &str = "_token";

/// CSRF 令牌的随机字节数（256 位）
pub const CSRF_TOKEN_BYTES: usize = 32;

/// 上传成功时的错误码
pub const UPLOAD_ERR_OK: u8 = 0;

/// 查询字符串与表单键名允许的最大方括号嵌套层数，超出的参数被丢弃
pub const MAX_INPUT_NESTING: usize = 64;

lazy_static! {
    /// 豁免 CSRF 校验的安全方法。
    pub static ref SAFE_METHODS: Vec<HttpMethod> = {
        vec![HttpMethod::Get, HttpMethod::Head, HttpMethod::Options]
    };
}

lazy_static! {
    /// 演示服务用到的状态码与原因短语映射表。
    ///
    /// 参考标准：[RFC 9110: HTTP Semantics](https://www.rfc-editor.org/rfc/rfc9110.html)。
    pub static ref STATUS_CODES: HashMap<u16, &'static str> = {
        let mut map = HashMap::new();
        map.insert(200, "OK");
        map.insert(400, "Bad Request");
        map.insert(403, "Forbidden");
        map.insert(413, "Content Too Large");
        map.insert(500, "Internal Server Error");
        map
    };
}

/// 支持的 HTTP 协议版本
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// HTTP/1.0 版本
    V1_0,
    /// HTTP/1.1 版本
    V1_1,
}

/// HTTP 请求方法
///
/// 未知方法保留其大写形式，方法判断始终基于规范的大写名称进行比较。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Head,
    Options,
    Post,
    Put,
    Delete,
    Patch,
    Other(String),
}

impl HttpMethod {
    /// 方法的规范大写名称
    pub fn as_str(&self) -> &str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Other(name) => name,
        }
    }

    /// 是否属于 CSRF 豁免的安全方法
    pub fn is_safe(&self) -> bool {
        SAFE_METHODS.contains(self)
    }
}

impl From<&str> for HttpMethod {
    /// 大小写不敏感地解析方法名
    fn from(name: &str) -> Self {
        let upper = name.trim().to_uppercase();
        match upper.as_str() {
            "GET" => HttpMethod::Get,
            "HEAD" => HttpMethod::Head,
            "OPTIONS" => HttpMethod::Options,
            "POST" => HttpMethod::Post,
            "PUT" => HttpMethod::Put,
            "DELETE" => HttpMethod::Delete,
            "PATCH" => HttpMethod::Patch,
            _ => HttpMethod::Other(upper),
        }
    }
}

impl fmt::Display for HttpVersion {
    /// 将枚举格式化为 `SERVER_PROTOCOL` 中的版本字符串
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            HttpVersion::V1_0 => write!(f, "HTTP/1.0"),
            HttpVersion::V1_1 => write!(f, "HTTP/1.1"),
        }
    }
}

impl fmt::Display for HttpMethod {
    /// 将枚举格式化为 HTTP 标准大写方法名
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
