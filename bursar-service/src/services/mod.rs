pub mod error;
pub mod jwt;
pub mod memory;
pub mod metrics;
pub mod mongo;
pub mod paymongo;
pub mod reconciliation;
pub mod reports;
pub mod repository;

pub use error::AppError;
pub use jwt::{AccessTokenClaims, JwtService};
pub use memory::MemoryStore;
pub use mongo::MongoStore;
pub use paymongo::{PayMongoClient, PayMongoError, WebhookEvent};
pub use reconciliation::{EventOutcome, PaymentLinkDetails, Reconciler};
pub use reports::{monthly_trend, MonthlyTrendPoint};
pub use repository::{PaymentResolution, RecordStore, StatusSummary};
