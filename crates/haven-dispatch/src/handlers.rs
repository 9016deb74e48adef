//! Execution handlers and the channel registry.
//!
//! A handler turns one dispatched decision into one real-world action on an
//! external rail and returns an opaque confirmation token in that rail's
//! scheme: `WO-` work orders, `PKG-` reroute tracking ids, `BIL-` billing
//! notice ids, `ESC-` escalation alert ids.

use crate::{DispatchOrder, HandlerError, HandlerReceipt};
use async_trait::async_trait;
use haven_types::Category;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Channel names, one per external rail.
pub const ESCALATION_CHANNEL: &str = "escalation_alert";
pub const MAINTENANCE_CHANNEL: &str = "maintenance_dispatch";
pub const PACKAGE_CHANNEL: &str = "package_reroute";
pub const BILLING_CHANNEL: &str = "billing_notice";

/// Pluggable execution handler for one channel.
#[async_trait]
pub trait ExecutionHandler: Send + Sync {
    fn channel(&self) -> &'static str;

    async fn execute(&self, order: &DispatchOrder) -> Result<HandlerReceipt, HandlerError>;
}

/// Registry of execution handlers keyed by channel name.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn ExecutionHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry with the four built-in handlers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(EscalationAlertHandler));
        registry.register(Arc::new(MaintenanceDispatchHandler));
        registry.register(Arc::new(PackageRerouteHandler));
        registry.register(Arc::new(BillingNoticeHandler));
        registry
    }

    pub fn register(&mut self, handler: Arc<dyn ExecutionHandler>) {
        self.handlers
            .insert(handler.channel().to_string(), handler);
    }

    pub fn get(&self, channel: &str) -> Option<Arc<dyn ExecutionHandler>> {
        self.handlers.get(channel).cloned()
    }

    pub fn has(&self, channel: &str) -> bool {
        self.handlers.contains_key(channel)
    }
}

/// The channel a category executes on, when it has one.
///
/// `General` is classifiable but not dispatchable; it reaches execution only
/// through the escalation path.
pub fn channel_for(category: Category) -> Option<&'static str> {
    match category {
        Category::Maintenance => Some(MAINTENANCE_CHANNEL),
        Category::Package => Some(PACKAGE_CHANNEL),
        Category::Billing => Some(BILLING_CHANNEL),
        Category::General => None,
    }
}

fn token(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::new_v4().simple())
}

/// Raises a human alert for escalated requests.
pub struct EscalationAlertHandler;

#[async_trait]
impl ExecutionHandler for EscalationAlertHandler {
    fn channel(&self) -> &'static str {
        ESCALATION_CHANNEL
    }

    async fn execute(&self, order: &DispatchOrder) -> Result<HandlerReceipt, HandlerError> {
        tracing::info!(
            request_id = %order.request_id,
            action = %order.action,
            "raising escalation alert"
        );
        Ok(HandlerReceipt::new(self.channel(), token("ESC")))
    }
}

/// Opens a maintenance work order.
pub struct MaintenanceDispatchHandler;

#[async_trait]
impl ExecutionHandler for MaintenanceDispatchHandler {
    fn channel(&self) -> &'static str {
        MAINTENANCE_CHANNEL
    }

    async fn execute(&self, order: &DispatchOrder) -> Result<HandlerReceipt, HandlerError> {
        tracing::info!(
            request_id = %order.request_id,
            action = %order.action,
            "opening maintenance work order"
        );
        Ok(HandlerReceipt::new(self.channel(), token("WO")))
    }
}

/// Reroutes a package delivery.
pub struct PackageRerouteHandler;

#[async_trait]
impl ExecutionHandler for PackageRerouteHandler {
    fn channel(&self) -> &'static str {
        PACKAGE_CHANNEL
    }

    async fn execute(&self, order: &DispatchOrder) -> Result<HandlerReceipt, HandlerError> {
        tracing::info!(
            request_id = %order.request_id,
            action = %order.action,
            "rerouting package"
        );
        Ok(HandlerReceipt::new(self.channel(), token("PKG")))
    }
}

/// Sends a billing notice.
pub struct BillingNoticeHandler;

#[async_trait]
impl ExecutionHandler for BillingNoticeHandler {
    fn channel(&self) -> &'static str {
        BILLING_CHANNEL
    }

    async fn execute(&self, order: &DispatchOrder) -> Result<HandlerReceipt, HandlerError> {
        tracing::info!(
            request_id = %order.request_id,
            action = %order.action,
            "sending billing notice"
        );
        Ok(HandlerReceipt::new(self.channel(), token("BIL")))
    }
}
