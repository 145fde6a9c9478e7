pub mod category;
pub mod summary;
pub mod transaction;
pub mod user;

pub use category::Category;
pub use summary::{CategorySummary, MonthlyHistory, MonthlyItem, TransactionSummary};
pub use transaction::{CreateTransaction, Transaction, TransactionFilter, TransactionType};
pub use user::{AuthState, AuthUser};
