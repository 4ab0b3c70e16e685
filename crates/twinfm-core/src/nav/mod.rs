//! Navigation logic.
//!
//! [`navigator::PathNavigator`] is the per-pane location state machine;
//! [`history::History`] holds its back/forward stacks.

pub mod history;
pub mod navigator;
