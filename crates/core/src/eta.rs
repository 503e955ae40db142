//! Pickup time estimation.
//!
//! The estimate is the sum of three parts:
//!
//! ```text
//! traffic = ceil(distance_m / 1000 * 3)     ~20 km/h effective speed
//! service = average_service_time            the customer's own order
//! wait    = backlog * average_service_time  orders ahead in the queue
//! pickup  = now + traffic + service + wait
//! ```
//!
//! `now` is always an argument. The estimator never reads a clock, so the
//! same inputs always give the same estimate and the instant used is kept on
//! the result for auditing.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// Travel minutes per kilometre under traffic.
pub const TRAFFIC_MINUTES_PER_KM: f64 = 3.0;

/// Errors that can occur when estimating a pickup time.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EtaError {
    /// Distance is NaN or infinite.
    #[error("distance must be a finite number")]
    NonFiniteDistance,
    /// Distance is below zero.
    #[error("distance must not be negative (got {0})")]
    NegativeDistance(f64),
    /// Service time is zero or negative.
    #[error("average service time must be positive (got {0})")]
    NonPositiveServiceTime(i32),
    /// The estimate does not fit in a timestamp.
    #[error("estimate is out of range")]
    OutOfRange,
}

/// Result of [`estimate_pickup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtaEstimate {
    /// Travel time to the shop.
    pub traffic_minutes: i64,
    /// Time to prepare the customer's own order.
    pub service_minutes: i64,
    /// Time spent behind the current backlog.
    pub wait_minutes: i64,
    /// `traffic + service + wait`.
    pub total_minutes: i64,
    /// The instant the estimate was computed for.
    pub computed_at: DateTime<Utc>,
    /// `computed_at + total_minutes`.
    pub pickup_time: DateTime<Utc>,
}

/// Travel minutes for a distance, rounded up to the next whole minute.
///
/// # Errors
///
/// Returns an error if the distance is negative, not finite, or too large.
pub fn traffic_minutes(distance_meters: f64) -> Result<i64, EtaError> {
    if !distance_meters.is_finite() {
        return Err(EtaError::NonFiniteDistance);
    }
    if distance_meters < 0.0 {
        return Err(EtaError::NegativeDistance(distance_meters));
    }

    let minutes = (distance_meters / 1000.0 * TRAFFIC_MINUTES_PER_KM).ceil();
    if minutes >= MAX_TRAFFIC_MINUTES {
        return Err(EtaError::OutOfRange);
    }
    #[allow(clippy::cast_possible_truncation)] // bounded above
    let minutes = minutes as i64;
    Ok(minutes)
}

/// Upper bound on travel minutes; about a million years.
const MAX_TRAFFIC_MINUTES: f64 = 525_600_000_000.0;

/// Estimate when a customer can pick up their order.
///
/// # Errors
///
/// Returns an error if `distance_meters` is negative or not finite, if
/// `average_service_time_minutes` is not positive, or if the resulting
/// timestamp overflows.
///
/// # Examples
///
/// ```
/// use chrono::{TimeDelta, Utc};
/// use pickup_core::estimate_pickup;
///
/// let now = Utc::now();
/// let eta = estimate_pickup(2000.0, 10, 2, now).unwrap();
/// assert_eq!(eta.traffic_minutes, 6);
/// assert_eq!(eta.wait_minutes, 20);
/// assert_eq!(eta.total_minutes, 36);
/// assert_eq!(eta.pickup_time - now, TimeDelta::minutes(36));
/// ```
pub fn estimate_pickup(
    distance_meters: f64,
    average_service_time_minutes: i32,
    backlog_count: u64,
    now: DateTime<Utc>,
) -> Result<EtaEstimate, EtaError> {
    if average_service_time_minutes <= 0 {
        return Err(EtaError::NonPositiveServiceTime(
            average_service_time_minutes,
        ));
    }

    let traffic = traffic_minutes(distance_meters)?;
    let service = i64::from(average_service_time_minutes);
    let wait = i64::try_from(backlog_count)
        .ok()
        .and_then(|backlog| backlog.checked_mul(service))
        .ok_or(EtaError::OutOfRange)?;
    let total = traffic
        .checked_add(service)
        .and_then(|t| t.checked_add(wait))
        .ok_or(EtaError::OutOfRange)?;

    let pickup_time = TimeDelta::try_minutes(total)
        .and_then(|delta| now.checked_add_signed(delta))
        .ok_or(EtaError::OutOfRange)?;

    Ok(EtaEstimate {
        traffic_minutes: traffic,
        service_minutes: service,
        wait_minutes: wait,
        total_minutes: total,
        computed_at: now,
        pickup_time,
    })
}
