//! Module payloads.
//!
//! The revision and hash-chain core only ever sees [`Payload`], an opaque
//! JSON object. Shape checks happen once, at the boundary, by parsing the
//! object into the [`ModulePayload`] variant selected by the record's
//! [`ModuleType`]. A payload that fails to parse or validate is rejected whole.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TypeError;

/// Governance module a record belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    Minutes,
    Distribution,
    Dispute,
    Insurance,
    Compensation,
}

impl ModuleType {
    pub const ALL: [ModuleType; 5] = [
        Self::Minutes,
        Self::Distribution,
        Self::Dispute,
        Self::Insurance,
        Self::Compensation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minutes => "minutes",
            Self::Distribution => "distribution",
            Self::Dispute => "dispute",
            Self::Insurance => "insurance",
            Self::Compensation => "compensation",
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModuleType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TypeError::UnknownVariant {
                kind: "module type",
                value: s.to_string(),
            })
    }
}

/// Opaque, pre-validated record content stored inside a revision.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(BTreeMap<String, Value>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value, which must be an object.
    pub fn from_value(value: Value) -> Result<Self, TypeError> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            other => Err(TypeError::Serialization(format!(
                "payload must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn from_json_str(raw: &str) -> Result<Self, TypeError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|e| TypeError::Serialization(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<Map<_, _>>())
    }

    pub fn as_map(&self) -> &BTreeMap<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<BTreeMap<String, Value>> for Payload {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    pub text: String,
    #[serde(default)]
    pub outcome: Option<MotionOutcome>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotionOutcome {
    Carried,
    Failed,
    Tabled,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinutesPayload {
    pub title: String,
    #[serde(default)]
    pub meeting_date: Option<NaiveDate>,
    #[serde(default)]
    pub attendees: Vec<String>,
    #[serde(default)]
    pub motions: Vec<Motion>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPayload {
    pub title: String,
    #[serde(default)]
    pub beneficiary: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub distribution_date: Option<NaiveDate>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Mediation,
    Litigation,
    Resolved,
    Closed,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputePayload {
    pub title: String,
    #[serde(default)]
    pub parties: Vec<String>,
    #[serde(default)]
    pub status: Option<DisputeStatus>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsurancePayload {
    pub title: String,
    #[serde(default)]
    pub carrier: Option<String>,
    #[serde(default)]
    pub policy_number: Option<String>,
    #[serde(default)]
    pub coverage_cents: Option<i64>,
    #[serde(default)]
    pub expires_on: Option<NaiveDate>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationPayload {
    pub title: String,
    #[serde(default)]
    pub recipient: Option<String>,
    #[serde(default)]
    pub amount_cents: Option<i64>,
    #[serde(default)]
    pub period: Option<String>,
}

/// Strongly-typed view of a payload, keyed by module.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModulePayload {
    Minutes(MinutesPayload),
    Distribution(DistributionPayload),
    Dispute(DisputePayload),
    Insurance(InsurancePayload),
    Compensation(CompensationPayload),
}

impl ModulePayload {
    /// Parse and validate an opaque payload against a module's schema.
    pub fn parse(module: ModuleType, payload: &Payload) -> Result<Self, TypeError> {
        let parsed = match module {
            ModuleType::Minutes => Self::Minutes(decode(module, payload)?),
            ModuleType::Distribution => Self::Distribution(decode(module, payload)?),
            ModuleType::Dispute => Self::Dispute(decode(module, payload)?),
            ModuleType::Insurance => Self::Insurance(decode(module, payload)?),
            ModuleType::Compensation => Self::Compensation(decode(module, payload)?),
        };
        parsed.validate()?;
        Ok(parsed)
    }

    pub fn module_type(&self) -> ModuleType {
        match self {
            Self::Minutes(_) => ModuleType::Minutes,
            Self::Distribution(_) => ModuleType::Distribution,
            Self::Dispute(_) => ModuleType::Dispute,
            Self::Insurance(_) => ModuleType::Insurance,
            Self::Compensation(_) => ModuleType::Compensation,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Minutes(p) => &p.title,
            Self::Distribution(p) => &p.title,
            Self::Dispute(p) => &p.title,
            Self::Insurance(p) => &p.title,
            Self::Compensation(p) => &p.title,
        }
    }

    /// Serialize back into the opaque form stored in a revision.
    pub fn to_payload(&self) -> Result<Payload, TypeError> {
        let value = match self {
            Self::Minutes(p) => serde_json::to_value(p),
            Self::Distribution(p) => serde_json::to_value(p),
            Self::Dispute(p) => serde_json::to_value(p),
            Self::Insurance(p) => serde_json::to_value(p),
            Self::Compensation(p) => serde_json::to_value(p),
        }
        .map_err(|e| TypeError::Serialization(e.to_string()))?;
        Payload::from_value(value)
    }

    fn validate(&self) -> Result<(), TypeError> {
        let module = self.module_type();
        if self.title().trim().is_empty() {
            return Err(invalid(module, "title must not be empty"));
        }
        match self {
            Self::Minutes(p) => {
                if p.motions.iter().any(|m| m.text.trim().is_empty()) {
                    return Err(invalid(module, "motion text must not be empty"));
                }
            }
            Self::Distribution(p) => {
                non_negative(module, "amount_cents", p.amount_cents)?;
                if let Some(currency) = &p.currency {
                    if currency.len() != 3 || !currency.bytes().all(|b| b.is_ascii_uppercase()) {
                        return Err(invalid(module, "currency must be a three-letter ISO code"));
                    }
                }
            }
            Self::Dispute(p) => {
                if p.parties.iter().any(|party| party.trim().is_empty()) {
                    return Err(invalid(module, "party names must not be empty"));
                }
            }
            Self::Insurance(p) => {
                non_negative(module, "coverage_cents", p.coverage_cents)?;
            }
            Self::Compensation(p) => {
                non_negative(module, "amount_cents", p.amount_cents)?;
            }
        }
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(module: ModuleType, payload: &Payload) -> Result<T, TypeError> {
    serde_json::from_value(payload.to_value()).map_err(|e| invalid(module, &e.to_string()))
}

fn non_negative(module: ModuleType, field: &str, value: Option<i64>) -> Result<(), TypeError> {
    match value {
        Some(v) if v < 0 => Err(invalid(module, &format!("{field} must not be negative"))),
        _ => Ok(()),
    }
}

fn invalid(module: ModuleType, reason: &str) -> TypeError {
    TypeError::Validation {
        module: module.to_string(),
        reason: reason.to_string(),
    }
}
