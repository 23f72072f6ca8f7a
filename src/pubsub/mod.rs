//! Типизированный in-process Publish–Subscribe.
//!
//! - `broker`: актор, единолично владеющий реестром, и его хэндл.
//! - `registry`: реестр подписок (регистрация, рассылка, удаление,
//!   закрытие).
//! - `request`: конверт запроса на подписку и клиентская очередь запросов.
//! - `subscriber` (приватные детали): запись подписчика и его id.
//! - `subscription`: клиентский хэндл с потоком значений и каналом
//!   завершения.
//! - `stats`: счётчики брокера.

pub mod broker;
pub mod registry;
pub mod request;
pub mod stats;
pub mod subscriber;
pub mod subscription;

pub use broker::*;
pub use registry::*;
pub use request::*;
pub use stats::*;
pub use subscriber::{Filter, SubscriberId};
pub use subscription::*;
