// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! # 请求回显服务
//!
//! 基于 Tokio 运行时的演示宿主：对每个连接读取原始 HTTP 请求，构建 `RequestFacade`，
//! 并以 JSON 形式返回请求对象看到的内容。用于在真实客户端下检查请求解析结果。
//! - 工作线程数由配置文件决定
//! - 单个请求的大小与读取超时受配置限制
//! - Ctrl-C 触发停机

use std::{
    net::{Ipv4Addr, SocketAddr, SocketAddrV4},
    sync::Arc,
    time::{Duration, Instant},
};

use log::{debug, error, info, warn};
use serde_json::json;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    runtime::Builder,
};

use webrequest::{
    param::{SERVER_NAME, STATUS_CODES},
    Ambient, Config, RequestFacade,
};

/// # 程序入口点
///
/// 初始化日志、加载配置、构建运行时并启动监听循环。
fn main() {
    // 1. 初始化日志系统：通过外部 YAML 配置级别与输出目的地
    if let Err(e) = log4rs::init_file("config/log4rs.yaml", Default::default()) {
        eprintln!("无法初始化日志系统：{}", e);
        return;
    }

    // 2. 环境配置加载
    let config = match Config::from_toml("config/development.toml") {
        Ok(config) => config,
        Err(e) => {
            warn!("{}，使用默认配置", e);
            Config::new()
        }
    };
    info!("配置文件已载入");

    // 3. 根据配置分配工作线程数
    let runtime = match Builder::new_multi_thread()
        .worker_threads(config.worker_threads().max(1))
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("无法构建异步运行时：{}", e);
            return;
        }
    };

    runtime.block_on(serve(Arc::new(config)));
}

async fn serve(config: Arc<Config>) {
    let address = match config.local() {
        true => Ipv4Addr::new(127, 0, 0, 1),
        false => Ipv4Addr::new(0, 0, 0, 0),
    };
    let socket = SocketAddrV4::new(address, config.port());

    let listener = match TcpListener::bind(socket).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("无法绑定端口：{}，错误：{}", config.port(), e);
            return;
        }
    };
    info!("服务端将在{}上监听Socket连接", socket);

    let mut id: u128 = 0;
    loop {
        let (mut stream, addr) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    error!("接受连接失败：{}", e);
                    continue;
                }
            },
            _ = tokio::signal::ctrl_c() => {
                info!("接收到停机信号，正在退出...");
                break;
            }
        };
        debug!("[ID{}]新的连接：{}", id, addr);

        let config = Arc::clone(&config);
        tokio::spawn(async move {
            handle_connection(&mut stream, addr, id, &config).await;
        });
        id += 1;
    }
}

/// # 连接处理器
///
/// 读取请求、构建请求对象并写回回显结果。请求对象不能跨越 `.await`，
/// 因此其构建与使用都在同步函数 [`describe`] 中完成。
async fn handle_connection(stream: &mut TcpStream, addr: SocketAddr, id: u128, config: &Config) {
    let start_time = Instant::now();
    let timeout = Duration::from_millis(config.read_timeout_ms());

    let (status, body) = match tokio::time::timeout(timeout, read_request(stream, config.max_request_size())).await {
        Ok(Ok(Some(buffer))) => describe(&buffer, addr, id),
        Ok(Ok(None)) => (413, json!({"error": "request too large"}).to_string()),
        Ok(Err(e)) => {
            error!("[ID{}]读取TCPStream时遇到错误: {}", id, e);
            return;
        }
        Err(_) => {
            warn!("[ID{}]读取请求超时", id);
            return;
        }
    };

    let response = format!(
        "HTTP/1.1 {} {}\r\nServer: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        STATUS_CODES.get(&status).copied().unwrap_or(""),
        SERVER_NAME,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        error!("[ID{}]发送响应失败: {}", id, e);
        return;
    }
    let _ = stream.flush().await;
    info!("[ID{}] {} {}, 用时{}ms", id, addr, status, start_time.elapsed().as_millis());
}

/// 读取完整请求：请求头，以及 `Content-Length` 指定长度的请求体。
///
/// 超过 `limit` 时返回 `Ok(None)`。
async fn read_request(stream: &mut TcpStream, limit: usize) -> std::io::Result<Option<Vec<u8>>> {
    let mut buffer = Vec::with_capacity(1024);
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(Some(buffer));
        }
        buffer.extend_from_slice(&chunk[..n]);
        if buffer.len() > limit {
            return Ok(None);
        }
        if let Some(expected) = expected_length(&buffer) {
            if expected > limit {
                return Ok(None);
            }
            if buffer.len() >= expected {
                return Ok(Some(buffer));
            }
        }
    }
}

/// 请求头已经完整时，返回整个请求应有的长度，溢出时取 `usize::MAX`
fn expected_length(buffer: &[u8]) -> Option<usize> {
    let head_end = buffer.windows(4).position(|w| w == b"\r\n\r\n")? + 4;
    let head = String::from_utf8_lossy(&buffer[..head_end]);
    let content_length = head
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    Some(head_end.saturating_add(content_length))
}

/// 构建请求对象并生成回显内容
fn describe(buffer: &[u8], addr: SocketAddr, id: u128) -> (u16, String) {
    let ambient = match Ambient::try_from(buffer, Some(addr), id) {
        Ok(ambient) => ambient,
        Err(e) => return (400, json!({"error": e.to_string()}).to_string()),
    };
    let request = RequestFacade::from_ambient(ambient, id);

    let headers: serde_json::Map<String, serde_json::Value> = request
        .headers()
        .iter()
        .map(|(name, value)| (name.clone(), json!(value)))
        .collect();
    let summary = json!({
        "id": id.to_string(),
        "method": request.method().to_string(),
        "uri": request.uri(),
        "url": request.url(),
        "ip": request.ip().map(|ip| ip.to_string()),
        "is_json": request.is_json(),
        "is_xhr": request.is_xhr(),
        "is_secure": request.is_secure(),
        "accepts_json": request.accepts("application/json"),
        "headers": headers,
        "input": request.all(),
    });
    (200, summary.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expected_length() {
        assert_eq!(expected_length(b"GET / HTTP/1.1\r\nHost: a"), None);
        assert_eq!(expected_length(b"GET / HTTP/1.1\r\n\r\n"), Some(18));
        assert_eq!(
            expected_length(b"POST / HTTP/1.1\r\ncontent-length: 5\r\n\r\nhello"),
            Some(43)
        );
    }

    /// 超大的 `Content-Length` 不会溢出，而是超过任何请求大小上限
    #[test]
    fn test_expected_length_saturates() {
        let raw = format!("POST / HTTP/1.1\r\nContent-Length: {}\r\n\r\n", usize::MAX);
        assert_eq!(expected_length(raw.as_bytes()), Some(usize::MAX));
    }
}
