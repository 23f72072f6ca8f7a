pub mod config;
pub mod pubsub;

// Публичный экспорт всех типов ошибок из вложенных модулей,
// чтобы упростить доступ к ним из внешнего кода.
pub use self::config::ConfigError;
pub use self::pubsub::{PublishError, SubscriptionError, TryRecvError};
