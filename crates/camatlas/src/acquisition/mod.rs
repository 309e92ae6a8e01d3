//! Field acquisition from a parsed listing page.
//!
//! - `structured`: JSON-LD parsing and traversal
//! - `streams`: embed / content / thumbnail URL harvesting
//! - `location`: country / city from breadcrumbs and URL shape

pub mod location;
pub mod streams;
pub mod structured;
