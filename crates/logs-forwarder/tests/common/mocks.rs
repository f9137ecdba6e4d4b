// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Transport double recording what the forwarder delivers

use logs_forwarder::errors::TransportError;
use logs_forwarder::transport::Transport;
use std::sync::Mutex;

/// Accepts every payload and keeps the decoded JSON in delivery order
#[derive(Default)]
pub struct RecordingTransport {
    payloads: Mutex<Vec<serde_json::Value>>,
}

impl RecordingTransport {
    /// Messages of every delivered batch, in delivery order
    pub fn batches(&self) -> Vec<Vec<String>> {
        self.payloads
            .lock()
            .unwrap()
            .iter()
            .map(|payload| {
                payload
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|entry| entry["data"]["message"].as_str().unwrap().to_string())
                    .collect()
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Transport for RecordingTransport {
    async fn post(&self, body: Vec<u8>) -> Result<(), TransportError> {
        let payload = serde_json::from_slice(&body).unwrap();
        self.payloads.lock().unwrap().push(payload);
        Ok(())
    }
}
