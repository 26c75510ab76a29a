// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Conversion of a [`LogRecord`] into a Loki push payload.
//!
//! Push body format (https://grafana.com/docs/loki/latest/reference/loki-http-api/#ingest-logs):
//! ```json
//! {
//!   "streams": [
//!     {
//!       "stream": { "label": "value" },
//!       "values": [ [ "<unix epoch in nanoseconds>", "<log line>" ] ]
//!     }
//!   ]
//! }
//! ```
//! Every record becomes exactly one stream carrying exactly one value pair.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::record::LogRecord;

pub const APP_NAME_LABEL: &str = "_appname";
pub const IP_LABEL: &str = "_ip";
pub const LEVEL_LABEL: &str = "_level";
pub const CALLER_LABEL: &str = "_caller";

const RESERVED_LABELS: [&str; 4] = [APP_NAME_LABEL, IP_LABEL, LEVEL_LABEL, CALLER_LABEL];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionBatch {
    pub streams: Vec<Stream>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stream {
    pub stream: BTreeMap<String, String>,
    pub values: Vec<[String; 2]>,
}

/// Result of [`transform`]: the payload plus the metadata keys whose values could not be
/// rendered as a label.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub batch: IngestionBatch,
    pub rejected_labels: Vec<String>,
}

impl IngestionBatch {
    pub fn to_json(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// Renders one metadata value as a label value.
pub type LabelEncoder = fn(&Value) -> Result<String, serde_json::Error>;

pub fn transform(record: &LogRecord) -> Transformed {
    transform_with(record, label_value)
}

/// Like [`transform`], with `encode` rendering the metadata values. A key whose value fails to
/// encode is left out of the labels and reported in `rejected_labels`.
pub fn transform_with(record: &LogRecord, encode: LabelEncoder) -> Transformed {
    let mut labels = BTreeMap::new();
    labels.insert(APP_NAME_LABEL.to_string(), record.app_name.clone());
    labels.insert(IP_LABEL.to_string(), record.ip.clone());
    labels.insert(LEVEL_LABEL.to_string(), record.level.clone());
    labels.insert(CALLER_LABEL.to_string(), record.caller.clone());

    let mut rejected_labels = Vec::new();
    for (key, value) in &record.metadata {
        if key.is_empty() || RESERVED_LABELS.contains(&key.as_str()) {
            continue;
        }
        match encode(value) {
            Ok(rendered) => {
                labels.insert(key.clone(), rendered);
            }
            Err(_) => rejected_labels.push(key.clone()),
        }
    }
    rejected_labels.sort();

    Transformed {
        batch: IngestionBatch {
            streams: vec![Stream {
                stream: labels,
                values: vec![[record.timestamp.to_string(), record.msg.clone()]],
            }],
        },
        rejected_labels,
    }
}

/// Strings are used verbatim, anything else is JSON encoded.
pub fn label_value(value: &Value) -> Result<String, serde_json::Error> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => encode_label(other),
    }
}

pub fn encode_label<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}
