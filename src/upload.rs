// Copyright (c) 2026 shaneyale (shaneyale86@gmail.com)
// All rights reserved.

//! 上传文件描述符。
//!
//! 宿主运行时在构造请求对象之前完成上传处理，这里只保存其元数据。
//! 同一字段下的多文件上传以"按属性分列"的形式给出（每个属性一个列表），
//! 由 [`UploadEntry::normalize`] 转换为按文件排列的描述符序列。

use serde_derive::Serialize;

use crate::param::UPLOAD_ERR_OK;

/// 没有文件被上传
const UPLOAD_ERR_NO_FILE: u8 = 4;

/// 单个上传文件的元数据
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadedFile {
    /// 客户端提供的原始文件名
    pub name: String,
    /// 客户端声明的 MIME 类型
    pub mime_type: String,
    /// 临时存储路径
    pub tmp_name: String,
    /// 上传错误码，`0` 表示成功
    pub error: u8,
    /// 文件大小（字节）
    pub size: u64,
}

impl UploadedFile {
    pub fn is_ok(&self) -> bool {
        self.error == UPLOAD_ERR_OK
    }
}

/// 宿主运行时给出的原始上传条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEntry {
    Single(UploadedFile),
    /// 多文件字段：各属性列表按文件下标对齐
    Multiple {
        name: Vec<String>,
        mime_type: Vec<String>,
        tmp_name: Vec<String>,
        error: Vec<u8>,
        size: Vec<u64>,
    },
}

/// 规范化之后的上传结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileUpload {
    Single(UploadedFile),
    Multiple(Vec<UploadedFile>),
}

impl UploadEntry {
    /// 将原始条目转换为按文件排列的形式。
    ///
    /// 分列长度不一致时以 `name` 列为准，缺失的属性取空值，缺失的错误码记为 `UPLOAD_ERR_NO_FILE`。
    pub fn normalize(&self) -> FileUpload {
        match self {
            UploadEntry::Single(file) => FileUpload::Single(file.clone()),
            UploadEntry::Multiple {
                name,
                mime_type,
                tmp_name,
                error,
                size,
            } => {
                let files = name
                    .iter()
                    .enumerate()
                    .map(|(i, n)| UploadedFile {
                        name: n.clone(),
                        mime_type: mime_type.get(i).cloned().unwrap_or_default(),
                        tmp_name: tmp_name.get(i).cloned().unwrap_or_default(),
                        error: error.get(i).copied().unwrap_or(UPLOAD_ERR_NO_FILE),
                        size: size.get(i).copied().unwrap_or(0),
                    })
                    .collect();
                FileUpload::Multiple(files)
            }
        }
    }
}

impl FileUpload {
    /// 至少包含一个文件，且全部上传成功
    pub fn is_ok(&self) -> bool {
        match self {
            FileUpload::Single(file) => file.is_ok(),
            FileUpload::Multiple(files) => !files.is_empty() && files.iter().all(|f| f.is_ok()),
        }
    }

    /// 按顺序返回全部文件
    pub fn files(&self) -> Vec<&UploadedFile> {
        match self {
            FileUpload::Single(file) => vec![file],
            FileUpload::Multiple(files) => files.iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, error: u8, size: u64) -> UploadedFile {
        UploadedFile {
            name: name.to_string(),
            mime_type: "text/plain".to_string(),
            tmp_name: format!("/tmp/{}", name),
            error,
            size,
        }
    }

    #[test]
    fn test_single_entry_normalizes_to_single() {
        let entry = UploadEntry::Single(file("a.txt", 0, 10));
        assert_eq!(entry.normalize(), FileUpload::Single(file("a.txt", 0, 10)));
    }

    #[test]
    fn test_columnar_entry_normalizes_in_order() {
        let entry = UploadEntry::Multiple {
            name: vec!["a.txt".into(), "b.txt".into()],
            mime_type: vec!["text/plain".into(), "text/plain".into()],
            tmp_name: vec!["/tmp/a.txt".into(), "/tmp/b.txt".into()],
            error: vec![0, 0],
            size: vec![1, 2],
        };
        match entry.normalize() {
            FileUpload::Multiple(files) => {
                assert_eq!(files, vec![file("a.txt", 0, 1), file("b.txt", 0, 2)]);
            }
            other => panic!("expected multiple files, got {:?}", other),
        }
    }

    #[test]
    fn test_short_error_column_is_not_ok() {
        let entry = UploadEntry::Multiple {
            name: vec!["a.txt".into(), "b.txt".into()],
            mime_type: vec![],
            tmp_name: vec![],
            error: vec![0],
            size: vec![],
        };
        assert!(!entry.normalize().is_ok());
    }

    #[test]
    fn test_zero_byte_upload_is_ok() {
        assert!(FileUpload::Single(file("empty.txt", 0, 0)).is_ok());
        assert!(!FileUpload::Single(file("big.bin", 1, 0)).is_ok());
        assert!(!FileUpload::Multiple(vec![]).is_ok());
    }
}
