//! History query assembly and summarization
//!
//! A history request resolves its time window through the [`TimeResolver`],
//! issues a single ranged `getHistory` query and turns the raw samples into
//! display points plus a numeric summary.

use crate::client::{IoBrokerClient, RestCall};
use crate::error::{IoBrokerError, Result};
use crate::time::{relative_millis, TimeResolver, HOUR_MS};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// Default window length when no start is given
pub const DEFAULT_WINDOW_MS: i64 = 2 * HOUR_MS;

/// Aggregation applied by the history adapter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Min,
    Max,
    Avg,
    Sum,
    Count,
    #[default]
    Onchange,
    None,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Onchange => "onchange",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options of a history query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryOptions {
    /// Start time: "now", ISO date, relative offset ("2h", "7d") or epoch ms.
    /// Defaults to two hours before `end`.
    #[serde(default, deserialize_with = "time_expression")]
    #[schemars(with = "Option<String>")]
    pub start: Option<String>,

    /// End time, same formats as `start`. Defaults to "now".
    #[serde(default, deserialize_with = "time_expression")]
    #[schemars(with = "Option<String>")]
    pub end: Option<String>,

    /// Number of values to return
    #[serde(default)]
    pub count: Option<u32>,

    /// Aggregation method, default "onchange"
    #[serde(default)]
    pub aggregate: Option<Aggregation>,

    /// Aggregation interval: milliseconds or a duration such as "30m", "1h", "1d"
    #[serde(default, deserialize_with = "step_millis")]
    #[schemars(with = "Option<Step>")]
    pub step: Option<u64>,

    /// Include the state id in every sample
    #[serde(default)]
    pub add_id: Option<bool>,

    /// Maximum number of entries
    #[serde(default)]
    pub limit: Option<u32>,

    /// Round numeric values to this many decimals
    #[serde(default)]
    pub round: Option<u32>,

    /// Skip null values, default true
    #[serde(default)]
    pub ignore_null: Option<bool>,

    /// Return the newest entries first when limiting
    #[serde(default)]
    pub return_newest_entries: Option<bool>,
}

/// Accept time expressions given as strings or bare numbers
fn time_expression<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!(
            "expected a time expression, got {other}"
        ))),
    }
}

/// Wire forms of the aggregation interval
#[derive(Debug, Clone, PartialEq, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum Step {
    /// Milliseconds
    Millis(u64),
    /// `<n><m|h|d|w>` or a numeric string
    Duration(String),
}

impl Step {
    pub fn to_millis(&self) -> Option<u64> {
        match self {
            Self::Millis(ms) => Some(*ms),
            Self::Duration(expr) => {
                let expr = expr.trim();
                expr.parse::<u64>().ok().or_else(|| {
                    relative_millis(expr).and_then(|ms| u64::try_from(ms).ok())
                })
            }
        }
    }
}

fn step_millis<'de, D>(deserializer: D) -> std::result::Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Step>::deserialize(deserializer)? {
        None => Ok(None),
        Some(step) => step.to_millis().map(Some).ok_or_else(|| {
            serde::de::Error::custom(format!(
                "invalid step {step:?}, expected milliseconds or a duration like \"30m\", \"1h\", \"1d\""
            ))
        }),
    }
}

/// Resolved absolute query window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: i64,
    pub end: i64,
}

impl TimeWindow {
    pub fn duration_ms(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

/// One formatted sample
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub display_time: String,
    pub value: Value,
}

/// Numeric summary over a result
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistorySummary {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
}

impl HistorySummary {
    /// Summarize the numeric values among `values`
    ///
    /// Non-numeric samples are ignored. An empty set reports zeros, the mean
    /// is rounded to two decimals.
    pub fn from_values<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a Value>,
    {
        let numbers: Vec<f64> = values.into_iter().filter_map(Value::as_f64).collect();
        if numbers.is_empty() {
            return Self {
                count: 0,
                min: 0.0,
                max: 0.0,
                avg: 0.0,
            };
        }

        let min = numbers.iter().copied().fold(f64::INFINITY, f64::min);
        let max = numbers.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let avg = numbers.iter().sum::<f64>() / numbers.len() as f64;

        Self {
            count: numbers.len(),
            min,
            max,
            avg: (avg * 100.0).round() / 100.0,
        }
    }
}

/// Summarized history of one state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResult {
    pub state_id: String,
    pub timezone: String,
    #[serde(rename = "period")]
    pub period_label: String,
    pub window: TimeWindow,
    #[serde(rename = "data")]
    pub points: Vec<HistoryPoint>,
    pub summary: HistorySummary,
}

/// Builds and runs history queries
#[derive(Debug, Clone)]
pub struct HistoryAggregator {
    client: Arc<dyn IoBrokerClient>,
    resolver: TimeResolver,
}

impl HistoryAggregator {
    pub fn new(client: Arc<dyn IoBrokerClient>, resolver: TimeResolver) -> Self {
        Self { client, resolver }
    }

    pub fn resolver(&self) -> &TimeResolver {
        &self.resolver
    }

    /// Resolve the query window, clamping an inverted one to `start = end`
    pub fn resolve_window(&self, options: &HistoryOptions) -> Result<TimeWindow> {
        let end = self
            .resolver
            .resolve_or(options.end.as_deref(), self.resolver.now())?;
        let start = match options.start.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(expr) => self.resolver.resolve(expr)?,
            None => end.checked_sub(DEFAULT_WINDOW_MS).ok_or_else(|| {
                IoBrokerError::invalid_time(options.end.as_deref().unwrap_or_default())
            })?,
        };

        if start > end {
            warn!(
                "History window start {} lies after end {}, clamping start to end",
                start, end
            );
            return Ok(TimeWindow { start: end, end });
        }

        Ok(TimeWindow { start, end })
    }

    /// The ranged `getHistory` call for `state_id`
    pub fn history_call(state_id: &str, window: TimeWindow, options: &HistoryOptions) -> RestCall {
        let mut call = RestCall::resource("getHistory", state_id)
            .with_query("start", window.start.to_string())
            .with_query("end", window.end.to_string())
            .with_query(
                "aggregate",
                options.aggregate.unwrap_or_default().as_str(),
            )
            .with_query(
                "ignoreNull",
                options.ignore_null.unwrap_or(true).to_string(),
            );

        let optional = [
            ("count", options.count.map(|v| v.to_string())),
            ("step", options.step.map(|v| v.to_string())),
            ("limit", options.limit.map(|v| v.to_string())),
            ("round", options.round.map(|v| v.to_string())),
            (
                "returnNewestEntries",
                options.return_newest_entries.map(|v| v.to_string()),
            ),
            ("addId", options.add_id.map(|v| v.to_string())),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                call = call.with_query(key, value);
            }
        }
        call
    }

    /// Query and summarize the history of `state_id`
    pub async fn query(&self, state_id: &str, options: &HistoryOptions) -> Result<HistoryResult> {
        let state_id = state_id.trim();
        if state_id.is_empty() {
            return Err(IoBrokerError::invalid_parameters(
                "state id must not be empty",
            ));
        }

        let window = self.resolve_window(options)?;
        let call = Self::history_call(state_id, window, options);
        debug!(
            "History query for {} over {} ms",
            state_id,
            window.duration_ms()
        );

        let failed = |source: IoBrokerError| IoBrokerError::HistoryQueryFailed {
            state_id: state_id.to_string(),
            start: window.start,
            end: window.end,
            source: Box::new(source),
        };

        let body = self.client.execute(&call).await.map_err(failed)?;
        let samples = extract_samples(body).map_err(failed)?;

        let points = samples
            .iter()
            .map(|sample| HistoryPoint {
                display_time: sample
                    .get("ts")
                    .and_then(Value::as_f64)
                    .map(|ts| self.resolver.format_local(ts as i64))
                    .unwrap_or_default(),
                value: sample.get("val").cloned().unwrap_or(Value::Null),
            })
            .collect::<Vec<_>>();
        let summary = HistorySummary::from_values(points.iter().map(|p| &p.value));

        Ok(HistoryResult {
            state_id: state_id.to_string(),
            timezone: self.resolver.timezone(),
            period_label: format!(
                "{} to {}",
                self.resolver.format_local(window.start),
                self.resolver.format_local(window.end)
            ),
            window,
            points,
            summary,
        })
    }
}

/// Samples from a bare array, a `{"result": [...]}` envelope or an empty body
fn extract_samples(body: Value) -> Result<Vec<Value>> {
    match body {
        Value::Null => Ok(Vec::new()),
        Value::Array(samples) => Ok(samples),
        Value::Object(mut map) => match map.remove("result") {
            Some(Value::Array(samples)) => Ok(samples),
            Some(Value::Null) | None if map.is_empty() => Ok(Vec::new()),
            _ => Err(IoBrokerError::protocol(
                "history response is neither a sample array nor a result envelope",
            )),
        },
        other => Err(IoBrokerError::protocol(format!(
            "unexpected history response: {other}"
        ))),
    }
}
