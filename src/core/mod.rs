//! Core building blocks: download parameters, option filtering, local paths,
//! the download report, resource download orchestration and the BIDS
//! conversion. These are consumed by the high-level `api` module.
pub mod bids;
pub mod download;
pub mod filter;
pub mod params;
pub mod paths;
pub mod report;
