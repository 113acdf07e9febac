// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # HTTP 请求对象模块
//!
//! `RequestFacade` 是一次入站请求的只读视图，在请求开始时由宿主框架构建一次，
//! 请求结束时销毁。它包装五个数据源（查询参数、表单参数、服务器元数据、Cookie、上传文件），
//! 并在第一次访问时惰性计算以下视图，之后始终返回缓存：
//! 1. 请求头表（优先使用注入的原生请求头，否则从 `HTTP_*` 元数据合成）。
//! 2. 原始请求体（输入流只读取一次）。
//! 3. JSON 请求体（仅当 `Content-Type` 表明是 JSON 时解析）。
//! 4. `Accept` 列表。
//!
//! 除 [`RequestFacade::set_url_params`] 外没有任何写入接口。
//! 该对象持有 `Cell`/`OnceCell`，不能在线程之间共享。

use std::{
    cell::Cell,
    collections::HashMap,
    fmt,
    io::{Cursor, Read},
    net::IpAddr,
};

use bytes::Bytes;
use log::{debug, error, warn};
use once_cell::unsync::OnceCell;
use serde_json::{Map, Value};

use crate::{
    ambient::Ambient,
    csrf,
    exception::Exception,
    param::*,
    session::SessionStore,
    upload::{FileUpload, UploadEntry},
    util::{canonical_header_name, escape_html, is_public_ip, normalize_header_name},
    validation::{self, ValidationErrors},
};

/// 查询参数、表单参数与 JSON 请求体共用的参数表
pub type ParamMap = Map<String, Value>;

/// 按优先级排列的客户端地址来源
const CLIENT_IP_SOURCES: [&str; 3] = ["HTTP_CLIENT_IP", "HTTP_X_FORWARDED_FOR", "REMOTE_ADDR"];

/// 惰性生成的请求头表，查找大小写不敏感
#[derive(Debug, Default)]
struct HeaderTable {
    /// 规范名称与值，保持来源顺序
    entries: Vec<(String, String)>,
    /// 规范化名称 -> `entries` 下标
    index: HashMap<String, usize>,
}

impl HeaderTable {
    fn push(&mut self, name: String, value: String) {
        let key = normalize_header_name(&name);
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 = value,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((name, value));
            }
        }
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.index
            .get(&normalize_header_name(name))
            .map(|&i| self.entries[i].1.as_str())
    }
}

/// 一次 HTTP 请求的只读门面
pub struct RequestFacade {
    id: u128,
    query: ParamMap,
    form: ParamMap,
    server: HashMap<String, String>,
    cookies: HashMap<String, String>,
    files: HashMap<String, UploadEntry>,
    native_headers: Option<Vec<(String, String)>>,
    body_source: Cell<Option<Box<dyn Read>>>,
    url_params: Option<HashMap<String, String>>,

    headers: OnceCell<HeaderTable>,
    body: OnceCell<Bytes>,
    json: OnceCell<Value>,
    accept: OnceCell<Vec<String>>,
}

/// `RequestFacade` 的构建器，未设置的数据源均为空
#[derive(Default)]
pub struct RequestBuilder {
    id: u128,
    query: ParamMap,
    form: ParamMap,
    server: HashMap<String, String>,
    cookies: HashMap<String, String>,
    files: HashMap<String, UploadEntry>,
    headers: Option<Vec<(String, String)>>,
    body: Option<Box<dyn Read>>,
}

impl RequestBuilder {
    /// 请求 ID，仅用于日志
    pub fn id(mut self, id: u128) -> Self {
        self.id = id;
        self
    }

    pub fn query(mut self, query: ParamMap) -> Self {
        self.query = query;
        self
    }

    pub fn form(mut self, form: ParamMap) -> Self {
        self.form = form;
        self
    }

    pub fn server(mut self, server: HashMap<String, String>) -> Self {
        self.server = server;
        self
    }

    pub fn cookies(mut self, cookies: HashMap<String, String>) -> Self {
        self.cookies = cookies;
        self
    }

    pub fn files(mut self, files: HashMap<String, UploadEntry>) -> Self {
        self.files = files;
        self
    }

    /// 宿主运行时提供的原生请求头列表。设置后不再从服务器元数据合成请求头。
    pub fn headers(mut self, headers: Vec<(String, String)>) -> Self {
        self.headers = Some(headers);
        self
    }

    /// 只能读取一次的请求体输入流
    pub fn body<R: Read + 'static>(mut self, reader: R) -> Self {
        self.body = Some(Box::new(reader));
        self
    }

    /// 以内存中的字节作为请求体
    pub fn body_bytes(self, bytes: impl Into<Bytes>) -> Self {
        self.body(Cursor::new(bytes.into()))
    }

    pub fn build(self) -> RequestFacade {
        RequestFacade {
            id: self.id,
            query: self.query,
            form: self.form,
            server: self.server,
            cookies: self.cookies,
            files: self.files,
            native_headers: self.headers,
            body_source: Cell::new(self.body),
            url_params: None,
            headers: OnceCell::new(),
            body: OnceCell::new(),
            json: OnceCell::new(),
            accept: OnceCell::new(),
        }
    }
}

impl RequestFacade {
    pub fn builder() -> RequestBuilder {
        RequestBuilder::default()
    }

    /// 由原始请求解析结果构建
    pub fn from_ambient(ambient: Ambient, id: u128) -> Self {
        Self::builder()
            .id(id)
            .query(ambient.query)
            .form(ambient.form)
            .server(ambient.server)
            .cookies(ambient.cookies)
            .files(ambient.files)
            .body_bytes(ambient.body)
            .build()
    }

    pub fn id(&self) -> u128 {
        self.id
    }
}

// --- 数据源访问器 ---

impl RequestFacade {
    /// 查询参数
    pub fn get(&self, key: &str, default: impl Into<Value>) -> Value {
        lookup(&self.query, key, default)
    }

    /// 表单参数
    pub fn post(&self, key: &str, default: impl Into<Value>) -> Value {
        lookup(&self.form, key, default)
    }

    pub fn cookie<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.cookies.get(key).map(String::as_str).unwrap_or(default)
    }

    /// 服务器元数据，例如 `REQUEST_METHOD`、`REMOTE_ADDR`
    pub fn server<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.server.get(key).map(String::as_str).unwrap_or(default)
    }

    /// 全部查询参数
    pub fn query_params(&self) -> &ParamMap {
        &self.query
    }

    /// 获取请求头，名称大小写不敏感（`content-type`、`Content-Type`、`CONTENT_TYPE` 等价）
    pub fn header<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.header_table().get(name).unwrap_or(default)
    }

    /// 全部请求头（规范名称, 值）
    pub fn headers(&self) -> &[(String, String)] {
        &self.header_table().entries
    }

    fn header_table(&self) -> &HeaderTable {
        self.headers.get_or_init(|| {
            let mut table = HeaderTable::default();
            match &self.native_headers {
                Some(native) => {
                    for (name, value) in native {
                        table.push(name.clone(), value.clone());
                    }
                }
                None => {
                    let mut keys: Vec<&String> = self.server.keys().collect();
                    keys.sort();
                    for key in keys {
                        let name = match key.strip_prefix(HTTP_HEADER_PREFIX) {
                            Some(rest) if !rest.is_empty() => rest,
                            _ if key == "CONTENT_TYPE" || key == "CONTENT_LENGTH" => key.as_str(),
                            _ => continue,
                        };
                        table.push(canonical_header_name(name), self.server[key].clone());
                    }
                }
            }
            debug!("[ID{}]请求头表已生成，共{}项", self.id, table.entries.len());
            table
        })
    }

    /// 原始请求体。输入流只在第一次调用时读取，之后返回缓存。
    ///
    /// 读取失败时记录错误并视为空请求体。
    pub fn body(&self) -> &Bytes {
        self.body.get_or_init(|| {
            let mut source = match self.body_source.take() {
                Some(source) => source,
                None => return Bytes::new(),
            };
            let mut buffer = Vec::new();
            match source.read_to_end(&mut buffer) {
                Ok(n) => {
                    debug!("[ID{}]请求体读取完成，共{}字节", self.id, n);
                    Bytes::from(buffer)
                }
                Err(e) => {
                    error!("[ID{}]读取请求体失败: {}", self.id, e);
                    Bytes::new()
                }
            }
        })
    }

    /// 解析后的 JSON 请求体。非 JSON 请求返回 `None`，解析失败时为空对象。
    fn json_body(&self) -> Option<&Value> {
        if !self.is_json() {
            return None;
        }
        Some(self.json.get_or_init(|| {
            match serde_json::from_slice::<Value>(self.body()) {
                Ok(value) => value,
                Err(e) => {
                    warn!("[ID{}]JSON请求体解析失败，按空对象处理：{}", self.id, e);
                    Value::Object(Map::new())
                }
            }
        }))
    }

    /// JSON 请求体中的字段
    pub fn json(&self, key: &str, default: impl Into<Value>) -> Value {
        match self.json_body().and_then(|body| body.get(key)) {
            Some(value) => value.clone(),
            None => default.into(),
        }
    }

    /// 按来源优先级取输入值：表单参数优先；JSON 请求其次取 JSON 请求体，否则取查询参数。
    ///
    /// `sanitize` 为真时递归转义其中的字符串。
    pub fn input(&self, key: &str, default: impl Into<Value>, sanitize: bool) -> Value {
        let found = match self.form.get(key) {
            Some(value) => Some(value),
            None => match self.json_body() {
                Some(body) => body.get(key),
                None => self.query.get(key),
            },
        };
        let value = match found {
            Some(value) => value.clone(),
            None => default.into(),
        };
        if sanitize {
            escape_html(value)
        } else {
            value
        }
    }

    /// 合并查询参数、表单参数与 JSON 请求体，后者覆盖前者
    pub fn all(&self) -> ParamMap {
        let mut merged = self.query.clone();
        merged.extend(self.form.iter().map(|(k, v)| (k.clone(), v.clone())));
        if let Some(Value::Object(body)) = self.json_body() {
            merged.extend(body.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        merged
    }

    /// 上传文件。多文件字段返回按文件排列的序列。
    pub fn file(&self, key: &str) -> Option<FileUpload> {
        self.files.get(key).map(UploadEntry::normalize)
    }

    /// 上传文件存在且没有错误。零字节的成功上传同样计入。
    pub fn has_file(&self, key: &str) -> bool {
        self.file(key).map_or(false, |upload| upload.is_ok())
    }
}

// --- 方法与内容判断 ---

impl RequestFacade {
    /// 请求方法。POST 请求允许通过请求头或 `_method` 表单字段覆盖。
    pub fn method(&self) -> HttpMethod {
        let method = self.transport_method();
        if method != HttpMethod::Post {
            return method;
        }

        let header = self.header(METHOD_OVERRIDE_HEADER, "");
        if !header.trim().is_empty() {
            return HttpMethod::from(header);
        }
        match self.form.get(METHOD_OVERRIDE_FIELD) {
            Some(Value::String(field)) if !field.trim().is_empty() => HttpMethod::from(field.as_str()),
            _ => method,
        }
    }

    /// 传输层的请求方法，不考虑覆盖
    fn transport_method(&self) -> HttpMethod {
        match self.server.get("REQUEST_METHOD") {
            Some(m) if !m.trim().is_empty() => HttpMethod::from(m.as_str()),
            _ => HttpMethod::Get,
        }
    }

    pub fn is_get(&self) -> bool {
        self.method() == HttpMethod::Get
    }

    pub fn is_post(&self) -> bool {
        self.method() == HttpMethod::Post
    }

    pub fn is_put(&self) -> bool {
        self.method() == HttpMethod::Put
    }

    pub fn is_delete(&self) -> bool {
        self.method() == HttpMethod::Delete
    }

    pub fn is_patch(&self) -> bool {
        self.method() == HttpMethod::Patch
    }

    pub fn is_head(&self) -> bool {
        self.method() == HttpMethod::Head
    }

    pub fn is_options(&self) -> bool {
        self.method() == HttpMethod::Options
    }

    /// `Content-Type` 中包含 `application/json`（大小写不敏感，允许携带参数）
    pub fn is_json(&self) -> bool {
        self.header("Content-Type", "")
            .to_lowercase()
            .contains("application/json")
    }

    /// `Accept` 中存在与 `content_type` 完全相同的项或 `*/*`
    pub fn accepts(&self, content_type: &str) -> bool {
        self.accept
            .get_or_init(|| {
                self.header("Accept", "")
                    .split(',')
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .iter()
            .any(|t| t == content_type || t == "*/*")
    }

    pub fn is_secure(&self) -> bool {
        let https = self.server("HTTPS", "");
        (!https.is_empty() && !https.eq_ignore_ascii_case("off")) || self.server("SERVER_PORT", "") == "443"
    }

    pub fn is_xhr(&self) -> bool {
        self.header("X-Requested-With", "")
            .eq_ignore_ascii_case("XMLHttpRequest")
    }
}

// --- 派生信息 ---

impl RequestFacade {
    /// 客户端地址。
    ///
    /// 依次尝试 `Client-IP` 请求头、`X-Forwarded-For` 中的每一项、传输层对端地址，
    /// 返回第一个合法且不属于私有或保留网段的地址。
    ///
    /// 注意：前两项由客户端提供，没有可信反向代理清洗时可以被伪造。
    pub fn ip(&self) -> Option<IpAddr> {
        CLIENT_IP_SOURCES
            .iter()
            .filter_map(|key| self.server.get(*key))
            .flat_map(|value| value.split(','))
            .filter_map(|candidate| candidate.trim().parse::<IpAddr>().ok())
            .find(is_public_ip)
    }

    /// 请求 URI（包含查询字符串）
    pub fn uri(&self) -> &str {
        self.server("REQUEST_URI", "/")
    }

    /// 请求路径（不含查询字符串）
    pub fn path(&self) -> &str {
        let uri = self.uri();
        uri.split_once('?').map(|(path, _)| path).unwrap_or(uri)
    }

    /// 协议 + 主机 + 路径
    pub fn url(&self) -> String {
        let scheme = if self.is_secure() { "https" } else { "http" };
        let host = match self.header("Host", "") {
            "" => self.server("SERVER_NAME", "localhost"),
            host => host,
        };
        format!("{}://{}{}", scheme, host, self.path())
    }
}

// --- URL 参数 ---

impl RequestFacade {
    /// 由路由器注入路径参数，只允许注入一次
    pub fn set_url_params(&mut self, params: HashMap<String, String>) -> Result<(), Exception> {
        if self.url_params.is_some() {
            warn!("[ID{}]URL参数被重复注入", self.id);
            return Err(Exception::UrlParamsAlreadySet);
        }
        self.url_params = Some(params);
        Ok(())
    }

    pub fn param<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.url_params
            .as_ref()
            .and_then(|params| params.get(key))
            .map(String::as_str)
            .unwrap_or(default)
    }
}

// --- 校验与 CSRF ---

impl RequestFacade {
    /// 按规则校验原始输入，返回每个字段的第一条错误
    pub fn validate(&self, rules: &[(&str, &str)]) -> ValidationErrors {
        let errors = validation::validate(rules, |field| self.input(field, Value::Null, false));
        if !errors.is_empty() {
            debug!("[ID{}]表单校验未通过：{:?}", self.id, errors.keys().collect::<Vec<_>>());
        }
        errors
    }

    /// 生成新的 CSRF 令牌并写入会话
    pub fn generate_csrf_token(&self, session: &mut dyn SessionStore) -> String {
        let token = csrf::generate_token();
        session.set(CSRF_SESSION_KEY, token.clone());
        token
    }

    /// 校验 CSRF 令牌。安全方法直接通过，其余方法的令牌缺失或不匹配都会返回错误。
    ///
    /// 是否豁免以传输层方法为准，通过 `_method` 伪装成 GET 的 POST 请求仍然需要令牌。
    pub fn validate_csrf(&self, session: &dyn SessionStore) -> Result<(), Exception> {
        let method = self.method();
        if method.is_safe() && self.transport_method().is_safe() {
            return Ok(());
        }

        let provided = match self.header(CSRF_HEADER, "") {
            "" => match self.form.get(CSRF_FIELD) {
                Some(Value::String(token)) => token.as_str(),
                _ => "",
            },
            token => token,
        };
        let expected = session.get(CSRF_SESSION_KEY).unwrap_or_default();

        if provided.is_empty() || expected.is_empty() {
            warn!("[ID{}]{}请求缺少CSRF令牌", self.id, method);
            return Err(Exception::CsrfTokenMissing);
        }
        if !csrf::tokens_match(&expected, provided) {
            warn!("[ID{}]{}请求的CSRF令牌不匹配", self.id, method);
            return Err(Exception::CsrfTokenMismatch);
        }
        Ok(())
    }
}

impl fmt::Debug for RequestFacade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFacade")
            .field("id", &self.id)
            .field("method", &self.server("REQUEST_METHOD", ""))
            .field("uri", &self.uri())
            .field("query", &self.query)
            .field("form", &self.form)
            .field("cookies", &self.cookies.len())
            .field("files", &self.files.len())
            .finish()
    }
}

fn lookup(map: &ParamMap, key: &str, default: impl Into<Value>) -> Value {
    match map.get(key) {
        Some(value) => value.clone(),
        None => default.into(),
    }
}
