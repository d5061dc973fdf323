#![allow(missing_docs)] // proc macros dont play nicely with docstrings

//! # metrics
//!
//! counters for the fetch & update coordinators
use lazy_static::lazy_static;
use prometheus::{
    HistogramVec, IntCounter, IntCounterVec, IntGauge, register_histogram_vec,
    register_int_counter_vec, register_int_gauge,
};
use prometheus_static_metric::make_static_metric;

make_static_metric! {
    pub label_enum FetchEvent {
        started,
        deduplicated,
        skipped,
        created,
        failed,
    }
    pub struct FetchStats: IntCounter {
        "event" => FetchEvent
    }
    pub label_enum SubmitEvent {
        accepted,
        rejected,
        invalid,
        saved,
        failed,
        timed_out,
    }
    pub struct SubmitStats: IntCounter {
        "event" => SubmitEvent
    }
}

lazy_static! {
    pub static ref FETCH_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "fetch_event_counts",
        "Fetch coordinator event counts",
        &["event"]
    )
    .unwrap();
    pub static ref SUBMIT_COUNT_VEC: IntCounterVec = register_int_counter_vec!(
        "submit_event_counts",
        "Update coordinator event counts",
        &["event"]
    )
    .unwrap();

    /// fetch coordinator events (started, deduplicated, skipped, ..)
    pub static ref FETCH_COUNT: FetchStats = FetchStats::from(&FETCH_COUNT_VEC);

    /// update coordinator events (accepted, rejected, saved, ..)
    pub static ref SUBMIT_COUNT: SubmitStats = SubmitStats::from(&SUBMIT_COUNT_VEC);

    /// # of fetches currently waiting on the store
    pub static ref IN_FLIGHT_FETCHES: IntGauge =
        register_int_gauge!("in_flight_fetches", "count of store reads currently outstanding").unwrap();

    /// # of writes currently holding a submission lock
    pub static ref HELD_LOCKS: IntGauge =
        register_int_gauge!("held_submit_locks", "count of submission locks currently held").unwrap();

    /// histogram of store write times
    pub static ref WRITE_DURATION: HistogramVec = register_histogram_vec!(
        "write_duration",
        "store write duration (seconds), labelled by outcome",
        &["outcome"]
    )
    .unwrap();
}
