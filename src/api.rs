use anyhow::{Context, Result};
use bytes::Bytes;

use crate::config::{Config, Coordinate, Offsets, RadarParams};
use crate::error::TrackerError;
use crate::models::RadarResponse;

/// Rectangular query region around the configured center.
///
/// Offsets are flat degree deltas, so the box only makes sense for small
/// regions; it gets visibly distorted far from the equator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    pub fn around(center: Coordinate, offsets: Offsets) -> Self {
        Self {
            north: center.latitude + offsets.latitude,
            south: center.latitude - offsets.latitude,
            east: center.longitude + offsets.longitude,
            west: center.longitude - offsets.longitude,
        }
    }
}

/// Full radar request URL for a bounding box
pub fn radar_url(bbox: &BoundingBox, params: &RadarParams) -> String {
    format!(
        "{}?north={:.6}&west={:.6}&south={:.6}&east={:.6}&results={}&duration={}&frames={}",
        params.base_url,
        bbox.north,
        bbox.west,
        bbox.south,
        bbox.east,
        params.results,
        params.duration,
        params.frames,
    )
}

/// Anything that can produce one radar snapshot per call
pub trait RadarSource {
    async fn fetch(&self) -> Result<RadarResponse, TrackerError>;
}

/// HTTP client for the radar endpoint
pub struct RadarClient {
    client: reqwest::Client,
    url: String,
}

impl RadarClient {
    /// Create a client for the configured bounding box. The URL is fixed for the client's lifetime.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .context("Failed to create HTTP client")?;

        let bbox = BoundingBox::around(config.center, config.offsets);
        Ok(Self {
            client,
            url: radar_url(&bbox, &config.radar),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch the raw response body
    pub async fn fetch_body(&self) -> Result<Bytes, TrackerError> {
        tracing::debug!(url = %self.url, "Fetching radar movements");

        let response = self.client.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(TrackerError::Status(response.status()));
        }

        let bytes = response.bytes().await?;

        tracing::debug!(bytes = bytes.len(), "Received data from API");
        Ok(bytes)
    }
}

/// Decode a radar response body
pub fn parse_response(data: &[u8]) -> Result<RadarResponse, TrackerError> {
    let response: RadarResponse = serde_json::from_slice(data)?;
    tracing::debug!(movements = response.movements.len(), "Decoded radar response");
    Ok(response)
}

impl RadarSource for RadarClient {
    async fn fetch(&self) -> Result<RadarResponse, TrackerError> {
        let data = self.fetch_body().await?;
        parse_response(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve exactly one canned HTTP response on a local port
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await.unwrap();
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
        });

        format!("http://{}/radar", addr)
    }

    fn config_for(base_url: String) -> Config {
        let mut cfg = Config::default();
        cfg.radar.base_url = base_url;
        cfg.radar.timeout_secs = 2;
        cfg
    }

    #[test]
    fn bbox_is_center_plus_minus_offset() {
        let cfg = Config::default();
        let bbox = BoundingBox::around(cfg.center, cfg.offsets);
        assert!(bbox.north > bbox.south);
        assert!(bbox.east > bbox.west);
        assert_eq!(format!("{:.6}", bbox.north), "52.557309");
        assert_eq!(format!("{:.6}", bbox.south), "52.503255");
        assert_eq!(format!("{:.6}", bbox.east), "13.406856");
        assert_eq!(format!("{:.6}", bbox.west), "13.318002");
    }

    #[test]
    fn bbox_holds_for_other_centers() {
        for (lat, lon) in [(0.0, 0.0), (-33.9, 151.2), (64.1, -21.9), (89.0, 179.9)] {
            let bbox = BoundingBox::around(
                Coordinate {
                    latitude: lat,
                    longitude: lon,
                },
                Offsets {
                    latitude: 0.01,
                    longitude: 0.02,
                },
            );
            assert!(bbox.north > bbox.south);
            assert!(bbox.east > bbox.west);
            assert_eq!(format!("{:.6}", bbox.north), format!("{:.6}", lat + 0.01));
            assert_eq!(format!("{:.6}", bbox.west), format!("{:.6}", lon - 0.02));
        }
    }

    #[test]
    fn url_carries_all_parameters() {
        let cfg = Config::default();
        let bbox = BoundingBox::around(cfg.center, cfg.offsets);
        assert_eq!(
            radar_url(&bbox, &cfg.radar),
            "https://v6.bvg.transport.rest/radar?north=52.557309&west=13.318002&south=52.503255&east=13.406856&results=256&duration=60&frames=3"
        );
    }

    #[test]
    fn parse_rejects_non_json() {
        let err = parse_response(b"<html>busy</html>").unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn fetch_decodes_movements() {
        let base = serve_once(
            "200 OK",
            r#"{"movements":[{"tripId":"t1","line":{"product":"bus","name":"142"}}]}"#,
        )
        .await;
        let client = RadarClient::new(&config_for(base.clone())).unwrap();
        assert!(client.url().starts_with(&base));

        let response = client.fetch().await.unwrap();
        assert_eq!(response.movements.len(), 1);
        assert_eq!(response.movements[0].trip_id.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn fetch_reports_error_status() {
        let base = serve_once("503 Service Unavailable", "{}").await;
        let client = RadarClient::new(&config_for(base)).unwrap();

        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, TrackerError::Status(s) if s.as_u16() == 503));
        assert_eq!(err.kind(), "network");
    }

    #[tokio::test]
    async fn fetch_reports_non_json_body() {
        let base = serve_once("200 OK", "not json").await;
        let client = RadarClient::new(&config_for(base)).unwrap();

        let err = client.fetch().await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[tokio::test]
    async fn fetch_reports_connection_failure() {
        // Bind then drop to get a port with nothing listening on it
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = RadarClient::new(&config_for(format!("http://{}/radar", addr))).unwrap();
        let err = client.fetch().await.unwrap_err();
        assert!(matches!(err, TrackerError::Network(_)));
    }
}
