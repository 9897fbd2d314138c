//! Repository handlers: data access for each entity, scoped by tenant.
//!
//! Every query that touches tenant-owned data filters by `user_id`; a
//! repository method can never observe or mutate another tenant's rows.

pub mod client_records;
pub mod settings;
pub mod subscriptions;
pub mod users;

pub use client_records::ClientRecords;
pub use settings::Settings;
pub use subscriptions::Subscriptions;
pub use users::Users;
