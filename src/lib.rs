/// Broker settings and application configuration loading.
pub mod config;
/// Error types: subscription termination reasons, publish and config errors.
pub mod error;
/// Logging setup (formats, filters).
pub mod logging;
/// Pub/Sub: Registry, Broker, Subscription.
pub mod pubsub;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

/// config
pub use config::{BrokerConfig, Settings};
/// Operation errors.
pub use error::{ConfigError, PublishError, SubscriptionError, TryRecvError};
/// logging
pub use logging::{init_logging, LogFormat, LoggingConfig};
/// Pub/Sub API.
pub use pubsub::{
    BroadcastReport, Broker, BrokerHandle, BrokerStats, BrokerStatsSnapshot, Filter, Inbox,
    PendingSubscription, Registry, Requester, SubscriberId, Subscription, SubscriptionEvent,
    SubscriptionRequest, Termination, DEFAULT_BUFFER_SIZE,
};
