mod seeded;
mod yahoo;

pub use seeded::SeededFetcher;
pub use yahoo::{CrumbSession, YahooFetcher};
