// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! CSRF 令牌的生成与比较。
//!
//! 令牌由操作系统的密码学安全随机源生成 256 位随机数，以小写十六进制编码；
//! 比较使用常数时间算法，运行时间与两个令牌第一处不同的位置无关。

use std::fmt::Write;

use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::param::CSRF_TOKEN_BYTES;

/// 生成新的十六进制令牌（64 个字符）
pub fn generate_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    encode_hex(&bytes)
}

/// 常数时间比较两个令牌。长度不同直接判定为不相等。
pub fn tokens_match(expected: &str, provided: &str) -> bool {
    expected.as_bytes().ct_eq(provided.as_bytes()).into()
}

fn encode_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // 写入 String 不会失败
        let _ = write!(out, "{:02x}", b);
    }
    out
}
