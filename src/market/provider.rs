//! Provider contract: the one seam between the scanner and the outside
//! world.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::{Bar, PatternError, Result};

/// Upstream failure taxonomy. Every variant is considered transient and
/// retryable by the client; a provider that knows a failure is permanent
/// should return an empty batch instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("throttled by upstream")]
    Throttled,
}

/// Source of raw OHLCV history.
///
/// One call serves the whole symbol batch; implementations own auth,
/// transport and payload decoding. Symbols the upstream has no data for
/// are simply absent from the returned map.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn fetch_batch(
        &self,
        symbols: &[String],
        timeframe: Timeframe,
        lookback: Lookback,
        limit: usize,
    ) -> std::result::Result<HashMap<String, Vec<Bar>>, ProviderError>;
}

// ============================================================
// VOCABULARY
// ============================================================

/// Bar interval granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1wk")]
    W1,
    #[serde(rename = "1mo")]
    Mo1,
}

impl Timeframe {
    pub const ALL: [Timeframe; 8] = [
        Timeframe::M1,
        Timeframe::M5,
        Timeframe::M15,
        Timeframe::M30,
        Timeframe::H1,
        Timeframe::D1,
        Timeframe::W1,
        Timeframe::Mo1,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1wk",
            Timeframe::Mo1 => "1mo",
        }
    }

    /// Parse an interval id. Unknown ids are a checked error.
    pub fn from_id(id: &str) -> Result<Self> {
        Timeframe::ALL
            .into_iter()
            .find(|t| t.as_str() == id)
            .ok_or_else(|| PatternError::UnknownTimeframe(id.to_string()))
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// History depth of a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Lookback {
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "5d")]
    D5,
    #[serde(rename = "1mo")]
    Mo1,
    #[serde(rename = "3mo")]
    Mo3,
    #[serde(rename = "6mo")]
    Mo6,
    #[serde(rename = "1y")]
    Y1,
    #[serde(rename = "2y")]
    Y2,
}

impl Lookback {
    pub const ALL: [Lookback; 7] = [
        Lookback::D1,
        Lookback::D5,
        Lookback::Mo1,
        Lookback::Mo3,
        Lookback::Mo6,
        Lookback::Y1,
        Lookback::Y2,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Lookback::D1 => "1d",
            Lookback::D5 => "5d",
            Lookback::Mo1 => "1mo",
            Lookback::Mo3 => "3mo",
            Lookback::Mo6 => "6mo",
            Lookback::Y1 => "1y",
            Lookback::Y2 => "2y",
        }
    }

    /// Calendar days of history this lookback covers.
    pub fn days(self) -> usize {
        match self {
            Lookback::D1 => 1,
            Lookback::D5 => 5,
            Lookback::Mo1 => 30,
            Lookback::Mo3 => 90,
            Lookback::Mo6 => 180,
            Lookback::Y1 => 365,
            Lookback::Y2 => 730,
        }
    }

    /// Parse a lookback id. Unknown ids are a checked error.
    pub fn from_id(id: &str) -> Result<Self> {
        Lookback::ALL
            .into_iter()
            .find(|l| l.as_str() == id)
            .ok_or_else(|| PatternError::UnknownLookback(id.to_string()))
    }
}

impl std::fmt::Display for Lookback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Row budget for one upstream request: roughly the number of bars the
/// timeframe produces over the lookback, with a small buffer for daily and
/// coarser intervals, capped at the provider page size of 1000.
pub fn row_limit(timeframe: Timeframe, lookback: Lookback) -> usize {
    let days = lookback.days();
    let rows = match timeframe {
        Timeframe::D1 => days + 5,
        Timeframe::W1 => days / 7 + 2,
        Timeframe::Mo1 => days / 30 + 2,
        Timeframe::H1 => days * 24,
        Timeframe::M30 => days * 48,
        Timeframe::M15 => days * 96,
        Timeframe::M5 => days * 288,
        Timeframe::M1 => 1000,
    };
    rows.min(1000)
}

// ============================================================
// TESTS
// ============================================================
