//! Upstream dispatch: clearance credentials, retries, response normalization,
//! and request correlation.

pub mod bypass;
pub mod correlation;
pub mod dispatcher;
pub mod response;
pub mod retry;
