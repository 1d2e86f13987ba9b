//! Reaction-based rating of tracked content items.

pub mod egress;
pub mod intake;
pub mod ledger;

pub use egress::{HttpRatingSink, RatingSink};
pub use intake::{rating_from_reaction, ReactionEvent, ReactionIntake, ReactionOutcome};
pub use ledger::{RatingEntry, RatingEvent, RatingLedger, SubmitOutcome};
