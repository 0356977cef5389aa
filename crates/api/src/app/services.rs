//! Infrastructure wiring: event store, bus, dispatcher, read models and the
//! payment gateway, shared by every handler behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::info;

use storefront_auth::Hs256Jwt;
use storefront_core::{Aggregate, AggregateId, DomainError};
use storefront_events::{EventEnvelope, InMemoryEventBus};
use storefront_infra::{
    AppConfig, CommandDispatcher, DispatchError, PaymentRequest, ProjectionError, ReadModels,
    event_store::{EventStore, StoredEvent},
    external::PaymentGateway,
    workers::{ProjectionWorker, WorkerHandle},
};
use storefront_products::{PaymentReference, PaymentStatus};

pub type Store = Arc<dyn EventStore>;
pub type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;
pub type Dispatcher = CommandDispatcher<Store, Bus>;

/// Request-path switches taken from the process configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApiSettings {
    pub allow_privileged_signup: bool,
    pub paystack_callback_url: Option<String>,
}

impl From<&AppConfig> for ApiSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            allow_privileged_signup: config.allow_privileged_signup,
            paystack_callback_url: config.paystack_callback_url.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ServicesError {
    #[error("failed to rebuild read models: {0}")]
    Rebuild(#[from] ProjectionError),

    #[error("failed to start projection worker: {0}")]
    Worker(#[from] std::io::Error),
}

pub struct AppServices {
    dispatcher: Dispatcher,
    read_models: Arc<ReadModels>,
    gateway: Arc<dyn PaymentGateway>,
    jwt: Hs256Jwt,
    settings: ApiSettings,
}

impl AppServices {
    /// Wire the services over `store` and start the projection worker.
    ///
    /// Read models are rebuilt from the full log before the worker
    /// subscribes, so a restart over a persistent store serves the same
    /// views. Dropping the returned services disconnects the bus and lets
    /// the worker exit; `WorkerHandle::shutdown` joins it.
    pub async fn build(
        store: Store,
        gateway: Arc<dyn PaymentGateway>,
        jwt_secret: &str,
        settings: ApiSettings,
    ) -> Result<(Arc<Self>, WorkerHandle), ServicesError> {
        let read_models = Arc::new(ReadModels::new());
        let replayed = read_models.rebuild(store.as_ref()).await?;

        let bus: Bus = Arc::new(InMemoryEventBus::new());
        let worker = {
            let read_models = read_models.clone();
            ProjectionWorker::spawn("storefront.projections", &bus, move |envelope: EventEnvelope<JsonValue>| {
                read_models.apply_envelope(&envelope)
            })?
        };

        info!(replayed, "services ready");

        let services = Arc::new(Self {
            dispatcher: CommandDispatcher::new(store, bus),
            read_models,
            gateway,
            jwt: Hs256Jwt::new(jwt_secret),
            settings,
        });
        Ok((services, worker))
    }

    pub fn read_models(&self) -> &ReadModels {
        &self.read_models
    }

    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.gateway.as_ref()
    }

    pub fn jwt(&self) -> &Hs256Jwt {
        &self.jwt
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Dispatch a command and fold the committed events into the read
    /// models before returning, so the caller's next read observes them.
    pub async fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Vec<StoredEvent>, DispatchError>
    where
        A: Aggregate<Error = DomainError>,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        let committed = self
            .dispatcher
            .dispatch(aggregate_id, aggregate_type, command, make_aggregate)
            .await?;
        self.read_models.apply_committed(&committed);
        Ok(committed)
    }

    /// Rehydrate an aggregate straight from its stream.
    pub async fn load<A>(
        &self,
        aggregate_id: AggregateId,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        self.dispatcher.load(aggregate_id, make_aggregate).await
    }

    pub async fn record_payment(&self, request: PaymentRequest) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed = storefront_infra::record_payment(&self.dispatcher, request).await?;
        self.read_models.apply_committed(&committed);
        Ok(committed)
    }

    pub async fn reconcile_payment(
        &self,
        reference: &PaymentReference,
        status: PaymentStatus,
        occurred_at: DateTime<Utc>,
    ) -> Result<Vec<StoredEvent>, DispatchError> {
        let committed =
            storefront_infra::reconcile_payment(&self.dispatcher, reference, status, occurred_at).await?;
        self.read_models.apply_committed(&committed);
        Ok(committed)
    }
}
