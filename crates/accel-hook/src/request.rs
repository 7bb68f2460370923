//! Request body protocol: `key1=value1;key2=value2;...`.
//!
//! There is no escaping. A segment is accepted only when it splits on `=` into
//! exactly two parts, so values can contain neither `;` nor `=`. Rejected
//! segments are reported back to the caller and logged as warnings; empty
//! segments (from a trailing or doubled `;`) are skipped quietly.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::{Error, Result};

pub const KEY_TYPE: &str = "type";
pub const KEY_FILE: &str = "file";
pub const KEY_BUCKET: &str = "bucket";
pub const KEY_ACCESS_KEY_ID: &str = "accessKeyId";
pub const KEY_ACCESS_KEY_SECRET: &str = "accessKeySecret";
pub const KEY_ENDPOINT: &str = "endpoint";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ParsedBody {
    pub params: BTreeMap<String, String>,
    pub rejected: Vec<String>,
}

pub fn parse_body(body: &str) -> ParsedBody {
    let mut out = ParsedBody::default();
    for segment in body.split(';') {
        if segment.is_empty() {
            continue;
        }
        let parts: Vec<&str> = segment.split('=').collect();
        if let [key, value] = parts.as_slice() {
            out.params.insert((*key).to_string(), (*value).to_string());
        } else {
            tracing::warn!(segment = %segment, "ignoring malformed request segment");
            out.rejected.push(segment.to_string());
        }
    }
    out
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Dump,
    Other(String),
}

impl Operation {
    fn parse(raw: &str) -> Self {
        match raw {
            "dump" => Self::Dump,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Typed view of the recognised request keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccelRequest {
    pub op: Option<Operation>,
    pub file: Option<String>,
    pub bucket: Option<String>,
    pub access_key_id: Option<String>,
    pub access_key_secret: Option<String>,
    pub endpoint: Option<String>,
}

impl AccelRequest {
    pub fn from_params(params: &BTreeMap<String, String>) -> Self {
        let get = |k: &str| params.get(k).cloned();
        Self {
            op: params.get(KEY_TYPE).map(|t| Operation::parse(t)),
            file: get(KEY_FILE),
            bucket: get(KEY_BUCKET),
            access_key_id: get(KEY_ACCESS_KEY_ID),
            access_key_secret: get(KEY_ACCESS_KEY_SECRET),
            endpoint: get(KEY_ENDPOINT),
        }
    }

    pub fn parse(body: &str) -> (Self, Vec<String>) {
        let parsed = parse_body(body);
        (Self::from_params(&parsed.params), parsed.rejected)
    }

    pub fn wants_dump(&self) -> bool {
        matches!(self.op, Some(Operation::Dump))
    }

    /// `file` when present and non-empty.
    pub fn archive_target(&self) -> Option<&str> {
        self.file.as_deref().filter(|f| !f.is_empty())
    }

    pub fn require<'a>(field: &'a Option<String>, key: &str) -> Result<&'a str> {
        field
            .as_deref()
            .ok_or_else(|| Error::MissingParam(key.to_string()))
    }
}
