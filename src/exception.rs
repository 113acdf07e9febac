// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # Exception 模块
//!
//! 该模块定义了请求对象在构建与使用过程中可能抛出的各类异常情况。
//!
//! ## 设计意图
//! - **错误分类**：涵盖了原始报文解析错误、配置加载错误以及 CSRF 安全校验错误。
//! - **致命与可恢复**：键缺失、JSON 解析失败、表单校验失败都不会以 `Exception` 的形式出现，
//!   只有需要中止当前请求的情况才会返回该类型。
//! - **用户友好**：通过实现 `std::fmt::Display`，确保错误信息可以被安全地记录到日志或返回给客户端。

use std::fmt;

/// 请求处理过程中发生的异常类型。
///
/// 该枚举通常作为 `Result` 的 `Err` 部分返回，用于指示处理失败的具体原因。
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Exception {
    /// 客户端发送的请求头无法解析为合法的 UTF-8 字符串。
    RequestIsNotUtf8,
    /// 请求行不是 `METHOD URI VERSION` 的形式。
    MalformedRequestLine,
    /// 客户端使用了不支持的 HTTP 协议版本（仅支持 HTTP/1.0 与 HTTP/1.1）。
    UnsupportedHttpVersion,
    /// 配置文件无法打开或读取。
    ConfigUnreadable,
    /// 非安全方法的请求中没有携带 CSRF 令牌，或会话中没有已签发的令牌。
    CsrfTokenMissing,
    /// 请求携带的 CSRF 令牌与会话中保存的令牌不一致。
    CsrfTokenMismatch,
    /// URL 参数只能由路由器注入一次，重复注入被视为违反不可变约定。
    UrlParamsAlreadySet,
}

use Exception::*;

impl Exception {
    /// 是否属于安全类异常。上层通常将其转换为 `403 Forbidden`。
    pub fn is_security(&self) -> bool {
        matches!(self, CsrfTokenMissing | CsrfTokenMismatch)
    }
}

impl fmt::Display for Exception {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestIsNotUtf8 => write!(f, "Request head can't be parsed in UTF-8"),
            MalformedRequestLine => write!(f, "Malformed request line"),
            UnsupportedHttpVersion => write!(f, "Unsupported HTTP version"),
            ConfigUnreadable => write!(f, "Couldn't read config file"),
            CsrfTokenMissing => write!(f, "CSRF token missing"),
            CsrfTokenMismatch => write!(f, "CSRF token mismatch"),
            UrlParamsAlreadySet => write!(f, "URL parameters can only be set once"),
        }
    }
}

impl std::error::Error for Exception {}
