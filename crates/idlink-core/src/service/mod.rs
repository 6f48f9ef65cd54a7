pub mod links;
pub mod notifier;
pub mod router;
pub mod http;
