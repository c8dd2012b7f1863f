//! Feed reconciler for the Amherst Adult Hockey League.
//!
//! Three independently maintained sources describe the same league: an ICS
//! calendar feed, an HTML scoreboard/box-score site, and an HTML roster page.
//! This crate parses each into typed per-source records, reconciles them into
//! canonical game and player entities with stable cross-source identifiers,
//! and classifies the result into bounded recent/upcoming display lists.
//!
//! All parsers take text in and return records out; network fetching lives in
//! [`site`] alone so everything else stays testable from fixtures.

pub mod calendar;
pub mod classify;
pub mod corrections;
pub mod error;
pub mod export;
pub mod identity;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod roster;
pub mod scoreboard;
pub mod site;
