pub mod invoice;
pub mod payment;
pub mod student;
pub mod user;

pub use invoice::{compute_total, Invoice, InvoiceResponse, InvoiceStatus, LineItem};
pub use payment::{Payment, PaymentResponse, PaymentStatus};
pub use student::{Student, StudentResponse};
pub use user::{User, UserResponse};
