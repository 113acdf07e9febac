use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use serde_json::Value;

/// 转义 `& " ' < >`，单引号输出为 `&#039;`
pub fn escape_html_str(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// 递归转义值中的所有字符串，其余标量原样返回
pub fn escape_html(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(escape_html_str(&s)),
        Value::Array(items) => Value::Array(items.into_iter().map(escape_html).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, escape_html(v)))
                .collect(),
        ),
        other => other,
    }
}

/// 请求头名称的查找键：大写，`-` 替换为 `_`
pub fn normalize_header_name(name: &str) -> String {
    name.trim().to_uppercase().replace('-', "_")
}

/// `USER_AGENT` -> `User-Agent`
pub fn canonical_header_name(key: &str) -> String {
    key.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_lowercase();
            let mut chars = lower.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("-")
}

/// 地址是否可作为公网客户端地址（不属于私有或保留网段）
pub fn is_public_ip(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_public_v4(v4),
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => is_public_v4(&v4),
            None => is_public_v6(v6),
        },
    }
}

fn is_public_v4(ip: &Ipv4Addr) -> bool {
    let octets = ip.octets();
    !(ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_documentation()
        || ip.is_multicast()
        || octets[0] == 0
        || octets[0] >= 240)
}

fn is_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    let second = ip.segments()[1];
    !(ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fc00::/7 唯一本地地址
        || (first & 0xfe00) == 0xfc00
        // fe80::/10 链路本地地址
        || (first & 0xffc0) == 0xfe80
        // 2001:db8::/32 文档地址
        || (first == 0x2001 && second == 0x0db8))
}
