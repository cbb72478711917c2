use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Image quality tier requested by the client.
///
/// The external intake keyword `high` maps to `Spotlight`; `low` and
/// `medium` map to themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageType {
    Low,
    Medium,
    Spotlight,
}

impl ImageType {
    /// Parse the tier keyword used by the intake gateway.
    pub fn from_request_keyword(keyword: &str) -> Result<Self, DomainError> {
        match keyword.to_lowercase().as_str() {
            "low" => Ok(ImageType::Low),
            "medium" => Ok(ImageType::Medium),
            "high" => Ok(ImageType::Spotlight),
            other => Err(DomainError::InvalidOrder(format!(
                "unknown image type: {other}"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ImageType::Low => "low",
            ImageType::Medium => "medium",
            ImageType::Spotlight => "spotlight",
        }
    }
}

impl fmt::Display for ImageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImageType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(ImageType::Low),
            "medium" => Ok(ImageType::Medium),
            "spotlight" => Ok(ImageType::Spotlight),
            other => Err(DomainError::InvalidOrder(format!(
                "unknown order type: {other}"
            ))),
        }
    }
}

/// Unit of the revisit frequency. Closed set, validated at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrequencyUnit {
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl FrequencyUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrequencyUnit::Minutes => "minutes",
            FrequencyUnit::Hours => "hours",
            FrequencyUnit::Days => "days",
            FrequencyUnit::Weeks => "weeks",
        }
    }
}

impl fmt::Display for FrequencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FrequencyUnit {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minutes" => Ok(FrequencyUnit::Minutes),
            "hours" => Ok(FrequencyUnit::Hours),
            "days" => Ok(FrequencyUnit::Days),
            "weeks" => Ok(FrequencyUnit::Weeks),
            other => Err(DomainError::InvalidRecurrence(format!(
                "unrecognized revisit frequency unit: {other}"
            ))),
        }
    }
}

/// Revisit frequency: amount of `unit` between consecutive visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevisitFrequency {
    pub amount: u32,
    pub unit: FrequencyUnit,
}

impl RevisitFrequency {
    /// Concrete interval between visit k and visit k+1.
    pub fn interval(&self) -> Duration {
        let amount = i64::from(self.amount);
        match self.unit {
            FrequencyUnit::Minutes => Duration::minutes(amount),
            FrequencyUnit::Hours => Duration::hours(amount),
            FrequencyUnit::Days => Duration::days(amount),
            FrequencyUnit::Weeks => Duration::weeks(amount),
        }
    }
}

/// Recurrence parameters of an order.
///
/// Invariant (enforced at intake): `frequency` is present iff `repeat`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recurrence {
    pub repeat: bool,
    pub revisit_count: u32,
    pub frequency: Option<RevisitFrequency>,
}

impl Recurrence {
    pub fn none() -> Self {
        Self {
            repeat: false,
            revisit_count: 0,
            frequency: None,
        }
    }
}

/// Client-submitted image order. Immutable after creation; every derived
/// schedule request references it by id.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub order_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub priority: i32,
    pub image_type: ImageType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub delivery_deadline: DateTime<Utc>,
    pub recurrence: Recurrence,
    pub created_at: Option<DateTime<Utc>>,
}

/// Input for creating a new order at intake.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateOrderInput {
    pub latitude: f64,
    pub longitude: f64,
    pub priority: i32,
    pub image_type: ImageType,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub delivery_deadline: DateTime<Utc>,
    pub recurrence: Recurrence,
}

/// Input for listing orders with gateway-style pagination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOrdersInput {
    pub page: u32,
    pub per_page: u32,
    pub all: bool,
}

impl Default for ListOrdersInput {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
            all: false,
        }
    }
}

/// Input for listing the schedule requests derived from one order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOrderRequestsInput {
    pub order_id: String,
    pub page: u32,
    pub per_page: u32,
    pub all: bool,
    pub order_types: Option<Vec<ImageType>>,
}

/// Current status of a schedule request. Closed set; `Scheduled` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Scheduled,
    Rejected,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Scheduled | RequestStatus::Rejected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Scheduled => "scheduled",
            RequestStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(RequestStatus::Pending),
            "scheduled" => Ok(RequestStatus::Scheduled),
            "rejected" => Ok(RequestStatus::Rejected),
            other => Err(DomainError::InvalidOrder(format!(
                "unknown request status: {other}"
            ))),
        }
    }
}

/// Classified reason code recorded alongside the free-text status reason,
/// used by aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    Matched,
    NoOpportunity,
    Conflict,
    Expired,
}

impl ReasonCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReasonCode::Matched => "matched",
            ReasonCode::NoOpportunity => "no_opportunity",
            ReasonCode::Conflict => "conflict",
            ReasonCode::Expired => "expired",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReasonCode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "matched" => Ok(ReasonCode::Matched),
            "no_opportunity" => Ok(ReasonCode::NoOpportunity),
            "conflict" => Ok(ReasonCode::Conflict),
            "expired" => Ok(ReasonCode::Expired),
            other => Err(DomainError::InvalidOrder(format!(
                "unknown reason code: {other}"
            ))),
        }
    }
}

/// One concrete, time-windowed unit of work derived from an order.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequest {
    pub request_id: String,
    pub order_id: String,
    pub order_type: ImageType,
    pub visit_index: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub status: RequestStatus,
    pub status_reason: Option<String>,
    pub reason_code: Option<ReasonCode>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Draft produced by recurrence expansion, before persistence assigns
/// timestamps. `(order_id, visit_index)` is the dedup key for idempotent
/// creation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRequestDraft {
    pub request_id: String,
    pub order_id: String,
    pub order_type: ImageType,
    pub visit_index: u32,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
}

/// Outcome of inserting a draft: either a new row was created or the
/// dedup key already existed (duplicate delivery).
#[derive(Debug, Clone, PartialEq)]
pub enum RequestInsert {
    Created(ScheduleRequest),
    AlreadyExists(ScheduleRequest),
}

impl RequestInsert {
    pub fn into_request(self) -> ScheduleRequest {
        match self {
            RequestInsert::Created(r) | RequestInsert::AlreadyExists(r) => r,
        }
    }
}

/// Reference to a concrete capture/contact opportunity reported by the
/// matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpportunityRef {
    pub opportunity_id: String,
    pub asset_name: String,
    pub ground_station: Option<String>,
}

/// Result of an opportunity match attempt for one schedule request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MatchOutcome {
    Matched(OpportunityRef),
    NoOpportunity,
    Conflict,
    Expired,
}

impl MatchOutcome {
    /// Terminal status this outcome drives the request to.
    pub fn target_status(&self) -> RequestStatus {
        match self {
            MatchOutcome::Matched(_) => RequestStatus::Scheduled,
            _ => RequestStatus::Rejected,
        }
    }

    pub fn reason_code(&self) -> ReasonCode {
        match self {
            MatchOutcome::Matched(_) => ReasonCode::Matched,
            MatchOutcome::NoOpportunity => ReasonCode::NoOpportunity,
            MatchOutcome::Conflict => ReasonCode::Conflict,
            MatchOutcome::Expired => ReasonCode::Expired,
        }
    }

    /// Default human-readable reason when the reporter did not supply one.
    pub fn default_reason(&self) -> String {
        match self {
            MatchOutcome::Matched(opportunity) => opportunity.opportunity_id.clone(),
            MatchOutcome::NoOpportunity => {
                "no capture opportunity within request window".to_string()
            }
            MatchOutcome::Conflict => "opportunity conflicts with an existing booking".to_string(),
            MatchOutcome::Expired => "request window elapsed before a match".to_string(),
        }
    }
}

/// Status report carried on the request status topic from matcher-side
/// services back to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchReport {
    pub request_id: String,
    pub order_id: String,
    pub outcome: MatchOutcome,
    pub reason: Option<String>,
}

/// Input for applying a match outcome to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyMatchInput {
    pub request_id: String,
    pub outcome: MatchOutcome,
    pub reason: Option<String>,
}

/// Result of a state-machine transition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// The request moved from pending to the terminal status.
    Applied(ScheduleRequest),
    /// The request already carried the same terminal status; duplicate
    /// delivery, nothing to do.
    AlreadyApplied(ScheduleRequest),
}

impl Transition {
    pub fn request(&self) -> &ScheduleRequest {
        match self {
            Transition::Applied(r) | Transition::AlreadyApplied(r) => r,
        }
    }
}

/// Input for the repository-level conditional status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionStatusInput {
    pub request_id: String,
    pub new_status: RequestStatus,
    pub status_reason: String,
    pub reason_code: ReasonCode,
}

/// Outcome of the conditional update: applied, or the row was no longer
/// pending (current row returned for inspection).
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionOutcome {
    Applied(ScheduleRequest),
    NotPending(ScheduleRequest),
}

/// A booked capture or contact event, recorded when a request is
/// scheduled. Feeds the per-asset / per-groundstation report sections.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledEvent {
    pub event_id: String,
    pub request_id: String,
    pub asset_name: String,
    pub ground_station: Option<String>,
    pub event_type: ImageType,
    pub created_at: Option<DateTime<Utc>>,
}
