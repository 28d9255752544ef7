//! InfluxSink - writes readings to InfluxDB over the v2 HTTP write API

use contracts::{ContractError, DataSink, PublishBatch, TagValue};
use std::collections::HashMap;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const DEFAULT_URL: &str = "http://localhost:8086";
const DEFAULT_BUCKET: &str = "ab/autogen";
const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Configuration for InfluxSink
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfluxSinkConfig {
    /// Server base URL
    pub url: String,
    /// Target bucket (`database/retention` for 1.x servers)
    pub bucket: String,
    /// API token, `user:password` on 1.x servers
    pub token: Option<String>,
    /// Request timeout
    pub timeout: Duration,
}

impl InfluxSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let timeout_ms = match params.get("timeout_ms") {
            Some(s) => s
                .parse()
                .map_err(|e| format!("invalid timeout_ms '{}': {}", s, e))?,
            None => DEFAULT_TIMEOUT_MS,
        };

        let url = params
            .get("url")
            .map(|u| u.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_URL.to_string());
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(format!("url '{}' must start with http:// or https://", url));
        }

        Ok(Self {
            url,
            bucket: params
                .get("bucket")
                .cloned()
                .unwrap_or_else(|| DEFAULT_BUCKET.to_string()),
            token: params.get("token").cloned(),
            timeout: Duration::from_millis(timeout_ms),
        })
    }

    /// Write endpoint without the query string
    pub fn write_endpoint(&self) -> String {
        format!("{}/api/v2/write", self.url)
    }
}

/// Render a batch as InfluxDB line protocol
///
/// The address part before the first `.` becomes the measurement, the rest
/// becomes the field key (`value` when the address has no `.`). Non-finite
/// floats cannot be represented and are skipped.
pub fn line_protocol(batch: &PublishBatch) -> String {
    let mut out = String::with_capacity(batch.readings.len() * 48);

    for reading in &batch.readings {
        let (measurement, field) = match reading.address.split_once('.') {
            Some((m, f)) if !f.is_empty() => (m, f),
            _ => (reading.address.as_str(), "value"),
        };

        let value = match &reading.value {
            TagValue::Bool(b) => b.to_string(),
            TagValue::Int(i) => format!("{i}i"),
            TagValue::Float(f) if f.is_finite() => f.to_string(),
            TagValue::Float(_) => continue,
            TagValue::Text(s) => format!("\"{}\"", escape(s, &['"', '\\'])),
        };

        let _ = writeln!(
            out,
            "{} {}={} {}",
            escape(measurement, &[',', ' ']),
            escape(field, &[',', '=', ' ']),
            value,
            reading.timestamp_ms
        );
    }

    out
}

fn escape(raw: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Sink that posts every batch to InfluxDB
pub struct InfluxSink {
    name: String,
    config: InfluxSinkConfig,
    client: reqwest::Client,
}

impl InfluxSink {
    /// Create a new InfluxSink
    pub fn new(name: impl Into<String>, config: InfluxSinkConfig) -> Result<Self, ContractError> {
        let name = name.into();
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))?;

        info!(
            sink = %name,
            url = %config.url,
            bucket = %config.bucket,
            "InfluxSink created"
        );

        Ok(Self {
            name,
            config,
            client,
        })
    }

    /// Create from params (for factory)
    pub fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = InfluxSinkConfig::from_params(params)
            .map_err(|e| ContractError::config_validation(format!("sinks.{name}.params"), e))?;
        Self::new(name, config)
    }

    fn write_request(&self, body: String) -> reqwest::RequestBuilder {
        let request = self
            .client
            .post(self.config.write_endpoint())
            .query(&[("bucket", self.config.bucket.as_str()), ("precision", "ms")])
            .header("Content-Type", "text/plain; charset=utf-8")
            .body(body);
        match &self.config.token {
            Some(token) => request.header("Authorization", format!("Token {}", token)),
            None => request,
        }
    }
}

impl DataSink for InfluxSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "influx_sink_write",
        skip(self, batch),
        fields(sink = %self.name, cycle_id = batch.cycle_id)
    )]
    async fn write(&mut self, batch: &PublishBatch) -> Result<(), ContractError> {
        let body = line_protocol(batch);
        if body.is_empty() {
            return Ok(());
        }

        let response = self
            .write_request(body)
            .send()
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            warn!(sink = %self.name, status = %status, "InfluxDB rejected write");
            return Err(ContractError::sink_write(
                &self.name,
                format!("HTTP {}: {}", status, detail.trim()),
            ));
        }

        debug!(sink = %self.name, readings = batch.readings.len(), "Written");
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, "InfluxSink closed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{PayloadChannel, TagReading};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn batch(readings: Vec<(&str, TagValue)>) -> PublishBatch {
        PublishBatch {
            channel: PayloadChannel::Changed,
            cycle_id: 1,
            timestamp_ms: 1_000,
            readings: readings
                .into_iter()
                .map(|(address, value)| TagReading {
                    address: address.into(),
                    value,
                    timestamp_ms: 1_000,
                })
                .collect(),
        }
    }

    #[test]
    fn test_line_protocol_values() {
        let text = line_protocol(&batch(vec![
            ("Motor1.Speed", TagValue::Float(12.5)),
            ("Motor1.Count", TagValue::Int(7)),
            ("Running", TagValue::Bool(true)),
            ("Recipe.Name", TagValue::Text("mix \"A\"".to_string())),
        ]));

        assert_eq!(
            text,
            "Motor1 Speed=12.5 1000\n\
             Motor1 Count=7i 1000\n\
             Running value=true 1000\n\
             Recipe Name=\"mix \\\"A\\\"\" 1000\n"
        );
    }

    #[test]
    fn test_line_protocol_escaping() {
        let text = line_protocol(&batch(vec![("Line 1.a=b,c", TagValue::Int(1))]));
        assert_eq!(text, "Line\\ 1 a\\=b\\,c=1i 1000\n");
    }

    #[test]
    fn test_nested_address_keeps_rest_as_field() {
        let text = line_protocol(&batch(vec![("Tank.Level.Raw", TagValue::Int(3))]));
        assert_eq!(text, "Tank Level.Raw=3i 1000\n");
    }

    #[test]
    fn test_non_finite_skipped() {
        let text = line_protocol(&batch(vec![
            ("A", TagValue::Float(f64::NAN)),
            ("B", TagValue::Float(f64::INFINITY)),
        ]));
        assert!(text.is_empty());
    }

    #[test]
    fn test_config_defaults() {
        let config = InfluxSinkConfig::from_params(&HashMap::new()).unwrap();
        assert_eq!(config.url, DEFAULT_URL);
        assert_eq!(config.bucket, "ab/autogen");
        assert_eq!(config.token, None);

        let sink = InfluxSink::new("influx", config).unwrap();
        let request = sink.write_request(String::new()).build().unwrap();
        assert_eq!(
            request.url().as_str(),
            "http://localhost:8086/api/v2/write?bucket=ab%2Fautogen&precision=ms"
        );
        assert!(request.headers().get("Authorization").is_none());
    }

    #[test]
    fn test_config_rejects_bad_url() {
        let params = HashMap::from([("url".to_string(), "localhost:8086".to_string())]);
        assert!(InfluxSinkConfig::from_params(&params).is_err());
    }

    /// Accept one HTTP request and answer with `status_line`
    async fn serve_once(listener: TcpListener, status_line: &'static str) -> String {
        let (mut stream, _) = listener.accept().await.unwrap();
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];

        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf).to_string();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let length = text[..header_end]
                    .lines()
                    .find_map(|l| {
                        l.to_ascii_lowercase()
                            .strip_prefix("content-length:")
                            .map(|v| v.trim().parse::<usize>().unwrap())
                    })
                    .unwrap_or(0);
                if buf.len() >= header_end + 4 + length {
                    break;
                }
            }
            if n == 0 {
                break;
            }
        }

        let response = format!("{}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n", status_line);
        stream.write_all(response.as_bytes()).await.unwrap();
        String::from_utf8_lossy(&buf).to_string()
    }

    fn sink_for(listener: &TcpListener) -> InfluxSink {
        let params = HashMap::from([
            (
                "url".to_string(),
                format!("http://{}", listener.local_addr().unwrap()),
            ),
            ("token".to_string(), "user:password".to_string()),
        ]);
        InfluxSink::from_params("influx", &params).unwrap()
    }

    #[tokio::test]
    async fn test_write_posts_line_protocol() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut sink = sink_for(&listener);
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 204 No Content"));

        sink.write(&batch(vec![("Motor1.Speed", TagValue::Int(5))]))
            .await
            .unwrap();

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/v2/write?bucket=ab%2Fautogen&precision=ms"));
        assert!(request.contains("Token user:password"));
        assert!(request.ends_with("Motor1 Speed=5i 1000\n"));
    }

    #[tokio::test]
    async fn test_rejected_write_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut sink = sink_for(&listener);
        let server = tokio::spawn(serve_once(listener, "HTTP/1.1 401 Unauthorized"));

        let result = sink
            .write(&batch(vec![("Motor1.Speed", TagValue::Int(5))]))
            .await;
        assert!(matches!(result, Err(ContractError::SinkWrite { .. })));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_empty_batch_skips_request() {
        let params = HashMap::from([("url".to_string(), "http://127.0.0.1:1".to_string())]);
        let mut sink = InfluxSink::from_params("influx", &params).unwrap();
        sink.write(&batch(vec![])).await.unwrap();
    }
}
