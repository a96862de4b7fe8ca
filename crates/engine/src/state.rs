//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::boxtal::rates::RateService;
use crate::boxtal::{BoxtalClient, CarrierGateway};
use crate::cache::CacheService;
use crate::config::EngineConfig;
use crate::db::{
    CatalogRepository, CustomerRepository, OrderRepository, PgCatalogRepository,
    PgCustomerRepository, PgOrderRepository,
};
use crate::error::AppError;
use crate::services::{
    EmailSink, FulfillmentService, Notifier, RecurringBillingService, ScheduleSyncService,
};
use crate::stripe::{PaymentGateway, StripeClient};

/// Application state shared across all handlers. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: EngineConfig,
    pool: PgPool,
    boxtal: BoxtalClient,
    cache: CacheService,
    rates: RateService,
    fulfillment: FulfillmentService,
    recurring: RecurringBillingService,
    schedule_sync: ScheduleSyncService,
}

impl AppState {
    /// Wire up clients, repositories, and services.
    ///
    /// Must be called within a tokio runtime (the notification worker is
    /// spawned here).
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP sink cannot be configured.
    pub fn new(config: EngineConfig, pool: PgPool) -> Result<Self, AppError> {
        let stripe = StripeClient::new(&config.stripe);
        let boxtal = BoxtalClient::new(&config.boxtal);
        let cache = CacheService::in_memory();

        let email = EmailSink::new(&config.email).map_err(|e| AppError::Internal(e.to_string()))?;
        let notifier = Notifier::spawn(Arc::new(email));

        let orders: Arc<dyn OrderRepository> = Arc::new(PgOrderRepository::new(pool.clone()));
        let customers: Arc<dyn CustomerRepository> =
            Arc::new(PgCustomerRepository::new(pool.clone()));
        let catalog: Arc<dyn CatalogRepository> = Arc::new(PgCatalogRepository::new(pool.clone()));
        let carrier: Arc<dyn CarrierGateway> = Arc::new(boxtal.clone());
        let payments: Arc<dyn PaymentGateway> = Arc::new(stripe);

        let fulfillment = FulfillmentService::new(
            orders.clone(),
            carrier,
            payments.clone(),
            notifier.clone(),
        );
        let recurring = RecurringBillingService::new(
            customers.clone(),
            catalog,
            orders,
            fulfillment.clone(),
            notifier,
        );
        let schedule_sync = ScheduleSyncService::new(
            customers,
            payments,
            config.stripe.subscription_price.clone(),
            config.stripe.skip_coupon.clone(),
        );
        let rates = RateService::new(pool.clone(), cache.clone());

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                boxtal,
                cache,
                rates,
                fulfillment,
                recurring,
                schedule_sync,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    #[must_use]
    pub fn boxtal(&self) -> &BoxtalClient {
        &self.inner.boxtal
    }

    #[must_use]
    pub fn cache(&self) -> &CacheService {
        &self.inner.cache
    }

    #[must_use]
    pub fn rates(&self) -> &RateService {
        &self.inner.rates
    }

    #[must_use]
    pub fn fulfillment(&self) -> &FulfillmentService {
        &self.inner.fulfillment
    }

    #[must_use]
    pub fn recurring(&self) -> &RecurringBillingService {
        &self.inner.recurring
    }

    #[must_use]
    pub fn schedule_sync(&self) -> &ScheduleSyncService {
        &self.inner.schedule_sync
    }
}
