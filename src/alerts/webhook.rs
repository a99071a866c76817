use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::alerts::{Alert, AlertKind};
use crate::error::Result;
use crate::types::{format_coins, BidExpiry, PriceRecord};

/// Discord-style webhook body.
#[derive(Debug, Serialize)]
struct WebhookMessage<'a> {
    content: &'a str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Endpoint answered 204 No Content.
    Sent,
    /// No webhook configured.
    Skipped,
    /// Endpoint answered with anything other than 204.
    Rejected { status: u16, body: String },
}

pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }

    /// Post one alert. Transport failures are errors; HTTP-level refusals are a `Delivery`.
    pub async fn deliver(&self, alert: &Alert, record: &PriceRecord) -> Result<Delivery> {
        let Some(url) = self.url.as_deref() else {
            return Ok(Delivery::Skipped);
        };

        let content = format_message(alert, record);
        let resp = self
            .client
            .post(url)
            .json(&WebhookMessage { content: &content })
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Delivery::Sent);
        }
        let body = resp.text().await.unwrap_or_default();
        Ok(Delivery::Rejected { status: status.as_u16(), body })
    }

    /// Post one alert, logging the outcome. Never fails.
    pub async fn notify(&self, alert: &Alert, record: &PriceRecord) {
        match self.deliver(alert, record).await {
            Ok(Delivery::Sent) => info!(
                event = "ALERT_SENT",
                kind = %alert.kind,
                item_id = record.item_id,
                "{} alert for {} delivered",
                alert.kind,
                record.name,
            ),
            Ok(Delivery::Skipped) => warn!(
                kind = %alert.kind,
                item_id = record.item_id,
                "No WEBHOOK_URL configured, {} alert for {} not sent",
                alert.kind,
                record.name,
            ),
            Ok(Delivery::Rejected { status, body }) => error!(
                kind = %alert.kind,
                item_id = record.item_id,
                "Webhook rejected {} alert (status {status}): {body}",
                alert.kind,
            ),
            Err(e) => error!(
                kind = %alert.kind,
                item_id = record.item_id,
                "Webhook delivery failed: {e}"
            ),
        }
    }
}

/// Build the message text posted for an alert.
pub fn format_message(alert: &Alert, r: &PriceRecord) -> String {
    let price = r.current_price.coins().map_or_else(|| r.current_price.to_string(), format_coins);
    match alert.kind {
        AlertKind::PriceCrash => {
            let average = r.average_bin.map_or_else(|| "N/A".to_string(), format_coins);
            format!(
                "🔔 **BIN price alert!**\n\
                 {} is now available for **{price} coins**!\n\
                 **{:.1}% off!**\n\
                 25%+ below average BIN ({average} coins)\n\
                 Time: {}",
                r.name,
                alert.discount_pct,
                r.fetch_time(),
            )
        }
        AlertKind::BidOpportunity => {
            let bid = r
                .lowest_bid
                .as_ref()
                .map_or_else(|| "N/A".to_string(), |b| format_coins(b.amount));
            let expires = r
                .bid_expiry()
                .map_or_else(|| "N/A".to_string(), BidExpiry::countdown);
            format!(
                "🎯 **⏰ Last-minute bid opportunity!**\n\
                 {}\n\
                 Lowest bid: **{bid} coins**\n\
                 BIN price: **{price} coins**\n\
                 Bid {:.1}% below BIN! Expires in: {expires}\n\
                 Time: {}",
                r.name,
                alert.discount_pct,
                r.fetch_time(),
            )
        }
    }
}
