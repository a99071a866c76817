pub mod evaluator;
pub mod webhook;

pub use evaluator::{check_bid_opportunity, check_price_crash, evaluate, Alert, AlertKind};
pub use webhook::{Delivery, WebhookNotifier};
