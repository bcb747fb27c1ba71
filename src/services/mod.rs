pub mod accounts;
pub mod geo;
pub mod jwt;
pub mod lifecycle;
pub mod matching;
pub mod reviews;
pub mod scoring;
pub mod sentiment;
pub mod tasks;

pub use accounts::AccountService;
pub use jwt::JwtService;
pub use matching::{MatchLimits, MatchingService};
pub use reviews::ReviewService;
pub use tasks::TaskService;
