pub mod model;
pub mod ops;

pub use model::TenderAccount;
pub use model::TenderStatus;
pub use ops::AccountError;
pub use ops::drain;
pub use ops::record_score;
pub use ops::spend;
