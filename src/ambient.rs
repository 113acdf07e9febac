// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 原始请求解析模块
//!
//! 该模块扮演"宿主运行时"的角色：将 TCP 流中读取的原始字节解析为请求对象所需的各个数据源：
//! 1. 请求行（Request-Line）解析为 CGI 风格的服务器元数据（`REQUEST_METHOD`、`REQUEST_URI` 等）。
//! 2. 请求头写入 `HTTP_*` 条目。
//! 3. 查询字符串与 `application/x-www-form-urlencoded` 表单解析为参数表，支持 `a[]=1`、`user[name]=x` 形式的嵌套。
//! 4. `Cookie` 请求头解析为 Cookie 表。
//!
//! 不处理 multipart 表单，上传文件表始终为空，需要上传功能的宿主应自行填充。

use std::{collections::HashMap, net::SocketAddr};

use bytes::Bytes;
use log::{debug, error, warn};
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};

use crate::{exception::Exception, param::*, request::ParamMap, upload::UploadEntry};

/// 一次请求的全部原始数据源
#[derive(Debug, Clone, Default)]
pub struct Ambient {
    pub query: ParamMap,
    pub form: ParamMap,
    pub server: HashMap<String, String>,
    pub cookies: HashMap<String, String>,
    pub files: HashMap<String, UploadEntry>,
    pub body: Bytes,
}

impl Ambient {
    /// 从原始字节缓冲区尝试构建 `Ambient` 实例。
    ///
    /// # 逻辑步骤
    /// 1. 按空行切分请求头与请求体，请求头必须是合法的 UTF-8。
    /// 2. 解析请求行：提取方法、URI 和协议版本。
    /// 3. 迭代解析标头，写入服务器元数据。
    /// 4. 解析查询字符串、表单与 Cookie。
    ///
    /// # 参数
    /// * `buffer` - 从网络 Socket 读取的原始数据。
    /// * `peer` - 对端地址，用于填充 `REMOTE_ADDR`。
    /// * `id` - 全局请求 ID，用于在多线程环境下追踪日志。
    pub fn try_from(buffer: &[u8], peer: Option<SocketAddr>, id: u128) -> Result<Self, Exception> {
        let (head, body) = split_head(buffer);
        let head = match std::str::from_utf8(head) {
            Ok(string) => string,
            Err(_) => {
                error!("[ID{}]无法解析HTTP请求头", id);
                return Err(Exception::RequestIsNotUtf8);
            }
        };

        let mut lines = head.split(CRLF);
        let request_line = lines.next().unwrap_or_default();
        let parts: Vec<&str> = request_line.split(' ').filter(|p| !p.is_empty()).collect();
        if parts.len() != 3 {
            error!("[ID{}]HTTP请求行格式不正确：{}", id, request_line);
            return Err(Exception::MalformedRequestLine);
        }

        let method = HttpMethod::from(parts[0]);
        let version = match parts[2].to_uppercase().as_str() {
            "HTTP/1.0" => HttpVersion::V1_0,
            "HTTP/1.1" => HttpVersion::V1_1,
            other => {
                error!("[ID{}]不支持的HTTP协议版本：{}", id, other);
                return Err(Exception::UnsupportedHttpVersion);
            }
        };
        let uri = parts[1].to_string();
        let query_string = uri.split_once('?').map(|(_, q)| q).unwrap_or_default();

        let mut server = HashMap::new();
        server.insert("REQUEST_METHOD".to_string(), method.to_string());
        server.insert("REQUEST_URI".to_string(), uri.clone());
        server.insert("QUERY_STRING".to_string(), query_string.to_string());
        server.insert("SERVER_PROTOCOL".to_string(), version.to_string());
        server.insert("SERVER_SOFTWARE".to_string(), SERVER_NAME.to_string());
        if let Some(addr) = peer {
            server.insert("REMOTE_ADDR".to_string(), addr.ip().to_string());
            server.insert("REMOTE_PORT".to_string(), addr.port().to_string());
        }

        for line in lines {
            let (name, value) = match line.split_once(':') {
                Some((n, v)) => (n.trim(), v.trim()),
                None => continue,
            };
            if name.is_empty() {
                continue;
            }
            let key = server_key(name);
            server
                .entry(key)
                .and_modify(|existing: &mut String| {
                    existing.push_str(", ");
                    existing.push_str(value);
                })
                .or_insert_with(|| value.to_string());
        }

        let server_name = server
            .get("HTTP_HOST")
            .map(|host| host.rsplit_once(':').map(|(h, _)| h).unwrap_or(host).to_string());
        if let Some(name) = server_name {
            server.insert("SERVER_NAME".to_string(), name);
        }

        let cookies = server
            .get("HTTP_COOKIE")
            .map(|c| parse_cookies(c))
            .unwrap_or_default();

        let is_form = server
            .get("CONTENT_TYPE")
            .map(|t| t.to_lowercase().starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);
        let form = if is_form {
            parse_query_string(&String::from_utf8_lossy(body))
        } else {
            ParamMap::new()
        };

        debug!(
            "[ID{}]请求解析完成：{} {}，请求体{}字节",
            id,
            method,
            uri,
            body.len()
        );

        Ok(Self {
            query: parse_query_string(query_string),
            form,
            server,
            cookies,
            files: HashMap::new(),
            body: Bytes::copy_from_slice(body),
        })
    }
}

/// 按第一个空行切分请求头与请求体；没有空行时整个缓冲区都视为请求头
fn split_head(buffer: &[u8]) -> (&[u8], &[u8]) {
    match buffer.windows(4).position(|w| w == b"\r\n\r\n") {
        Some(pos) => (&buffer[..pos], &buffer[pos + 4..]),
        None => (buffer, &buffer[buffer.len()..]),
    }
}

/// 请求头名称在服务器元数据中的键名
fn server_key(name: &str) -> String {
    let upper = name.to_uppercase().replace('-', "_");
    match upper.as_str() {
        "CONTENT_TYPE" | "CONTENT_LENGTH" => upper,
        _ => format!("{}{}", HTTP_HEADER_PREFIX, upper),
    }
}

/// 百分号解码，`+` 视为空格
fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    percent_decode_str(&s).decode_utf8_lossy().into_owned()
}

/// 解析查询字符串或 urlencoded 表单，支持方括号嵌套
pub fn parse_query_string(query: &str) -> ParamMap {
    let mut params = ParamMap::new();
    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (key, value) = match pair.split_once('=') {
            Some((k, v)) => (decode(k), decode(v)),
            None => (decode(pair), String::new()),
        };
        let (base, path) = split_brackets(&key);
        if base.is_empty() {
            continue;
        }
        if path.len() > MAX_INPUT_NESTING {
            warn!("参数{}的嵌套层数超过{}，已丢弃", base, MAX_INPUT_NESTING);
            continue;
        }
        insert_nested(&mut params, base, &path, Value::String(value));
    }
    params
}

/// 将 `user[address][city]` 拆分为 `user` 与 `["address", "city"]`
///
/// 最多收集 `MAX_INPUT_NESTING + 1` 段，调用方据此判断是否超限
fn split_brackets(key: &str) -> (&str, Vec<&str>) {
    let open = match key.find('[') {
        Some(pos) if key.ends_with(']') => pos,
        _ => return (key, Vec::new()),
    };
    let base = &key[..open];
    let inner = &key[open + 1..key.len() - 1];
    (base, inner.split("][").take(MAX_INPUT_NESTING + 1).collect())
}

fn insert_nested(map: &mut Map<String, Value>, key: &str, path: &[&str], value: Value) {
    let (next, rest) = match path.split_first() {
        Some(split) => split,
        None => {
            map.insert(key.to_string(), value);
            return;
        }
    };

    let slot = map
        .entry(key.to_string())
        .or_insert_with(|| Value::Object(Map::new()));
    // 已有的数组按下标展开后继续追加，同名标量被覆盖
    *slot = match std::mem::take(slot) {
        Value::Object(inner) => Value::Object(inner),
        Value::Array(items) => Value::Object(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        ),
        _ => Value::Object(Map::new()),
    };
    if let Value::Object(inner) = slot {
        let child = if next.is_empty() {
            inner.len().to_string()
        } else {
            next.to_string()
        };
        insert_nested(inner, &child, rest, value);
    }
    *slot = into_list_if_sequential(std::mem::take(slot));
}

/// 键恰好为 `0..n` 的对象转换为数组，与 `a[]=x` 的语义保持一致
fn into_list_if_sequential(value: Value) -> Value {
    let map = match value {
        Value::Object(map) => map,
        other => return other,
    };
    let sequential = (0..map.len()).all(|i| map.contains_key(&i.to_string()));
    if !sequential || map.is_empty() {
        return Value::Object(map);
    }
    let mut entries: Vec<(usize, Value)> = map
        .into_iter()
        .filter_map(|(k, v)| k.parse::<usize>().ok().map(|i| (i, v)))
        .collect();
    entries.sort_by_key(|(i, _)| *i);
    Value::Array(entries.into_iter().map(|(_, v)| v).collect())
}

/// 解析 `Cookie` 请求头
pub fn parse_cookies(cookie_header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();
    for cookie in cookie_header.split(';') {
        let (name, value) = match cookie.trim().split_once('=') {
            Some((n, v)) => (n.trim(), v.trim()),
            None => continue,
        };
        if !name.is_empty() {
            cookies.insert(
                name.to_string(),
                percent_decode_str(value).decode_utf8_lossy().into_owned(),
            );
        }
    }
    cookies
}
