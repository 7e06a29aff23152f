//! Property tests for expansion and scoring.

mod expansion_props;
mod normalize_props;
