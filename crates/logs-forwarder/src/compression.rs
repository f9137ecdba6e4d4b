// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Optional payload compression applied to encoded batches.

use std::io::{self, Write};

use flate2::write::GzEncoder;
use zstd::stream::write::Encoder;

/// Default zstd level when compression is requested without a level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Payloads are sent as plain JSON.
    #[default]
    None,
    /// gzip with the default compression level.
    Gzip,
    /// zstd with the given compression level.
    Zstd(i32),
}

impl Compression {
    /// Parses the compression names accepted in configuration
    /// (`none`, `gzip`, `zstd`, `zstd:<level>`).
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim().to_lowercase();
        match value.as_str() {
            "" | "none" | "false" => Some(Compression::None),
            "gzip" | "true" => Some(Compression::Gzip),
            "zstd" => Some(Compression::Zstd(DEFAULT_ZSTD_LEVEL)),
            other => other
                .strip_prefix("zstd:")
                .and_then(|level| level.parse::<i32>().ok())
                .map(Compression::Zstd),
        }
    }

    /// Value of the `Content-Encoding` header matching this compression.
    #[must_use]
    pub fn content_encoding(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some("gzip"),
            Compression::Zstd(_) => Some("zstd"),
        }
    }

    pub fn compress(&self, data: Vec<u8>) -> io::Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data),
            Compression::Gzip => {
                let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(&data)?;
                encoder.finish()
            }
            Compression::Zstd(level) => {
                let mut encoder = Encoder::new(Vec::new(), *level)?;
                encoder.write_all(&data)?;
                encoder.finish()
            }
        }
    }
}
