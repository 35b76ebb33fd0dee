//! CSV file adapters: OHLCV bars and sentiment series.

use crate::domain::error::{SentiquantError, SentimentError};
use crate::domain::ohlcv::Bar;
use crate::domain::sentiment::SentimentPoint;
use crate::ports::price_port::PriceSource;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const SENTIMENT_HEADER: [&str; 6] = [
    "bucket_start",
    "sentiment_score",
    "positive_ratio",
    "negative_ratio",
    "neutral_ratio",
    "item_count",
];

/// Reads `{dir}/{SYMBOL}_{timeframe}.csv`, with `/` in the symbol replaced
/// by `-` (`BTC/USDT` at `1d` is `BTC-USDT_1d.csv`).
pub struct CsvPriceSource {
    base_path: PathBuf,
}

impl CsvPriceSource {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    pub fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        self.base_path
            .join(format!("{}_{}.csv", symbol.replace('/', "-"), timeframe))
    }
}

impl PriceSource for CsvPriceSource {
    fn fetch_bars(&self, symbol: &str, timeframe: &str) -> Result<Vec<Bar>, SentiquantError> {
        let path = self.csv_path(symbol, timeframe);
        let fail = |reason: String| SentiquantError::PriceSource {
            symbol: symbol.to_string(),
            reason,
        };
        let content = fs::read_to_string(&path)
            .map_err(|e| fail(format!("failed to read {}: {}", path.display(), e)))?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for (row, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| fail(format!("CSV parse error: {}", e)))?;
            let bar = parse_bar(&record).map_err(|e| fail(format!("row {}: {}", row + 1, e)))?;
            bars.push(bar);
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }
}

fn field<'r>(record: &'r csv::StringRecord, idx: usize, name: &str) -> Result<&'r str, String> {
    record
        .get(idx)
        .map(str::trim)
        .ok_or_else(|| format!("missing {} column", name))
}

fn number(record: &csv::StringRecord, idx: usize, name: &str) -> Result<f64, String> {
    field(record, idx, name)?
        .parse()
        .map_err(|e| format!("invalid {} value: {}", name, e))
}

fn parse_bar(record: &csv::StringRecord) -> Result<Bar, String> {
    let raw_ts = field(record, 0, "timestamp")?;
    let timestamp =
        parse_timestamp(raw_ts).ok_or_else(|| format!("invalid timestamp '{}'", raw_ts))?;
    Ok(Bar {
        timestamp,
        open: number(record, 1, "open")?,
        high: number(record, 2, "high")?,
        low: number(record, 3, "low")?,
        close: number(record, 4, "close")?,
        volume: number(record, 5, "volume")?,
    })
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(ts.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Parse a sentiment series. Only the bucket timestamp (`bucket_start` or
/// `timestamp`) and `sentiment_score` columns are required; missing ratio
/// and count columns read as zero.
pub fn read_sentiment_csv<R: Read>(reader: R) -> Result<Vec<SentimentPoint>, String> {
    let mut rdr = csv::Reader::from_reader(reader);
    let headers = rdr
        .headers()
        .map_err(|e| format!("CSV header error: {}", e))?
        .clone();
    let column = |names: &[&str]| {
        headers
            .iter()
            .position(|h| names.iter().any(|n| h.trim().eq_ignore_ascii_case(n)))
    };

    let ts_col = column(&["bucket_start", "timestamp"])
        .ok_or_else(|| "missing bucket_start column".to_string())?;
    let score_col =
        column(&["sentiment_score", "score"]).ok_or_else(|| "missing sentiment_score column".to_string())?;
    let pos_col = column(&["positive_ratio"]);
    let neg_col = column(&["negative_ratio"]);
    let neu_col = column(&["neutral_ratio"]);
    let count_col = column(&["item_count"]);

    let mut points = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| format!("CSV parse error: {}", e))?;
        let ratio = |col: Option<usize>| -> Result<f64, String> {
            match col.and_then(|c| record.get(c)).map(str::trim) {
                None | Some("") => Ok(0.0),
                Some(v) => v
                    .parse()
                    .map_err(|e| format!("row {}: invalid ratio '{}': {}", row + 1, v, e)),
            }
        };

        let raw_ts = record.get(ts_col).unwrap_or_default();
        let bucket_start = parse_timestamp(raw_ts)
            .ok_or_else(|| format!("row {}: invalid timestamp '{}'", row + 1, raw_ts))?;
        let raw_score = record.get(score_col).unwrap_or_default().trim();
        // Blank scores are gaps; alignment fills them.
        let sentiment_score = if raw_score.is_empty() {
            f64::NAN
        } else {
            raw_score
                .parse()
                .map_err(|e| format!("row {}: invalid score '{}': {}", row + 1, raw_score, e))?
        };
        let item_count = match count_col.and_then(|c| record.get(c)).map(str::trim) {
            None | Some("") => 0,
            Some(v) => v
                .parse()
                .map_err(|e| format!("row {}: invalid item_count '{}': {}", row + 1, v, e))?,
        };

        points.push(SentimentPoint {
            bucket_start,
            sentiment_score,
            positive_ratio: ratio(pos_col)?,
            negative_ratio: ratio(neg_col)?,
            neutral_ratio: ratio(neu_col)?,
            item_count,
        });
    }

    points.sort_by_key(|p| p.bucket_start);
    Ok(points)
}

pub fn write_sentiment_csv<W: Write>(writer: W, points: &[SentimentPoint]) -> Result<(), String> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(SENTIMENT_HEADER)
        .map_err(|e| format!("CSV write error: {}", e))?;
    for p in points {
        wtr.write_record([
            p.bucket_start.to_rfc3339_opts(SecondsFormat::Secs, true),
            p.sentiment_score.to_string(),
            p.positive_ratio.to_string(),
            p.negative_ratio.to_string(),
            p.neutral_ratio.to_string(),
            p.item_count.to_string(),
        ])
        .map_err(|e| format!("CSV write error: {}", e))?;
    }
    wtr.flush().map_err(|e| format!("CSV write error: {}", e))
}

/// Load an explicit sentiment file supplied by the user.
pub fn load_sentiment_file(path: &Path) -> Result<Vec<SentimentPoint>, SentimentError> {
    let file = fs::File::open(path).map_err(|e| SentimentError::File {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    read_sentiment_csv(file).map_err(|reason| SentimentError::File {
        path: path.display().to_string(),
        reason,
    })
}
