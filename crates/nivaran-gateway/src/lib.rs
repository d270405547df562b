//! Backend gateway: the narrow interface the client talks to, plus an
//! embedded implementation over SQLite and local disk.

pub mod auth;
pub mod backend;
pub mod convert;
pub mod dispatcher;
pub mod error;
pub mod local;
pub mod storage;
pub mod subscription;

pub use backend::{
    AuthGateway, ChatGateway, DonationGateway, FeedEvent, Gateway, InsertCallback, ObjectStore, PostGateway,
    ProfileGateway, SignUpOutcome,
};
pub use error::{GatewayError, GatewayResult};
pub use local::{Backend, BackendOptions, LocalGateway};
pub use subscription::Subscription;
