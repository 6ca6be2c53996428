/// Poll intervals, deadlines and upgrade-mechanism contract literals.
pub(crate) mod constants;

/// Contains the error handling tooling.
pub mod error;

/// Contains the poll-with-interval-and-deadline primitive.
pub(crate) mod poll;

/// Contains version string normalization.
pub(crate) mod version;
