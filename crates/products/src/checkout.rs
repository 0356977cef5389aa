//! Payment intents: one stream per checkout reference.
//!
//! The stream id is derived from the reference, so opening the same
//! reference twice collides on stream creation. The intent remembers which
//! products the checkout touched so that verification can fan out to them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError, UserId};
use storefront_events::Event;

use crate::payment::{PaymentReference, PaymentStatus};
use crate::product::ProductId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    id: AggregateId,
    reference: Option<PaymentReference>,
    user_id: Option<UserId>,
    amount: u64,
    product_ids: Vec<ProductId>,
    status: PaymentStatus,
    opened_at: Option<DateTime<Utc>>,
    settled_at: Option<DateTime<Utc>>,
    version: u64,
    created: bool,
}

impl PaymentIntent {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "products.payment_intent";

    pub fn empty(id: AggregateId) -> Self {
        Self {
            id,
            reference: None,
            user_id: None,
            amount: 0,
            product_ids: Vec::new(),
            status: PaymentStatus::Pending,
            opened_at: None,
            settled_at: None,
            version: 0,
            created: false,
        }
    }

    /// Stream id for a reference.
    pub fn id_for(reference: &PaymentReference) -> AggregateId {
        AggregateId::derived("payment", reference.as_str())
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn reference(&self) -> Option<&PaymentReference> {
        self.reference.as_ref()
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn product_ids(&self) -> &[ProductId] {
        &self.product_ids
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn opened_at(&self) -> Option<DateTime<Utc>> {
        self.opened_at
    }

    pub fn settled_at(&self) -> Option<DateTime<Utc>> {
        self.settled_at
    }
}

impl AggregateRoot for PaymentIntent {
    type Id = AggregateId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenPaymentIntent {
    pub reference: PaymentReference,
    pub user_id: UserId,
    pub amount: u64,
    pub product_ids: Vec<ProductId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlePaymentIntent {
    pub reference: PaymentReference,
    pub status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentIntentCommand {
    Open(OpenPaymentIntent),
    Settle(SettlePaymentIntent),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentOpened {
    pub intent_id: AggregateId,
    pub reference: PaymentReference,
    pub user_id: UserId,
    pub amount: u64,
    pub product_ids: Vec<ProductId>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntentSettled {
    pub intent_id: AggregateId,
    pub reference: PaymentReference,
    pub previous_status: PaymentStatus,
    pub status: PaymentStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentIntentEvent {
    Opened(PaymentIntentOpened),
    Settled(PaymentIntentSettled),
}

impl Event for PaymentIntentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentIntentEvent::Opened(_) => "products.payment_intent.opened",
            PaymentIntentEvent::Settled(_) => "products.payment_intent.settled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentIntentEvent::Opened(e) => e.occurred_at,
            PaymentIntentEvent::Settled(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentIntent {
    type Command = PaymentIntentCommand;
    type Event = PaymentIntentEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentIntentEvent::Opened(e) => {
                self.id = e.intent_id;
                self.reference = Some(e.reference.clone());
                self.user_id = Some(e.user_id);
                self.amount = e.amount;
                self.product_ids = e.product_ids.clone();
                self.status = PaymentStatus::Pending;
                self.opened_at = Some(e.occurred_at);
                self.created = true;
            }
            PaymentIntentEvent::Settled(e) => {
                self.status = e.status;
                self.settled_at = Some(e.occurred_at);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentIntentCommand::Open(cmd) => {
                if self.created {
                    return Err(DomainError::conflict("payment reference already in use"));
                }
                if cmd.product_ids.is_empty() {
                    return Err(DomainError::validation("cart is empty"));
                }
                if PaymentIntent::id_for(&cmd.reference) != self.id {
                    return Err(DomainError::invariant("intent id does not match reference"));
                }

                Ok(vec![PaymentIntentEvent::Opened(PaymentIntentOpened {
                    intent_id: self.id,
                    reference: cmd.reference.clone(),
                    user_id: cmd.user_id,
                    amount: cmd.amount,
                    product_ids: cmd.product_ids.clone(),
                    occurred_at: cmd.occurred_at,
                })])
            }
            PaymentIntentCommand::Settle(cmd) => {
                if !self.created {
                    return Err(DomainError::not_found("payment reference"));
                }
                if self.status == cmd.status {
                    return Ok(vec![]);
                }

                Ok(vec![PaymentIntentEvent::Settled(PaymentIntentSettled {
                    intent_id: self.id,
                    reference: cmd.reference.clone(),
                    previous_status: self.status,
                    status: cmd.status,
                    occurred_at: cmd.occurred_at,
                })])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn open_cmd(reference: &PaymentReference) -> PaymentIntentCommand {
        PaymentIntentCommand::Open(OpenPaymentIntent {
            reference: reference.clone(),
            user_id: UserId::new(),
            amount: 250,
            product_ids: vec![ProductId::new(AggregateId::new())],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn same_reference_always_maps_to_same_stream() {
        let reference = PaymentReference::parse("paystack_1_abc").unwrap();
        assert_eq!(PaymentIntent::id_for(&reference), PaymentIntent::id_for(&reference));
    }

    #[test]
    fn reopening_a_reference_is_a_conflict() {
        let reference = PaymentReference::parse("paystack_1_abc").unwrap();
        let mut intent = PaymentIntent::empty(PaymentIntent::id_for(&reference));

        execute(&mut intent, &open_cmd(&reference)).unwrap();
        let err = intent.handle(&open_cmd(&reference)).unwrap_err();

        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(intent.status(), PaymentStatus::Pending);
    }

    #[test]
    fn settle_records_status_change_once() {
        let reference = PaymentReference::parse("paystack_2_def").unwrap();
        let mut intent = PaymentIntent::empty(PaymentIntent::id_for(&reference));
        execute(&mut intent, &open_cmd(&reference)).unwrap();

        let settle = PaymentIntentCommand::Settle(SettlePaymentIntent {
            reference: reference.clone(),
            status: PaymentStatus::Success,
            occurred_at: Utc::now(),
        });
        let first = execute(&mut intent, &settle).unwrap();
        let second = execute(&mut intent, &settle).unwrap();

        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
        assert_eq!(intent.status(), PaymentStatus::Success);
        assert_eq!(intent.version(), 2);
    }

    #[test]
    fn settling_unknown_reference_is_not_found() {
        let reference = PaymentReference::parse("nope").unwrap();
        let intent = PaymentIntent::empty(PaymentIntent::id_for(&reference));
        let err = intent
            .handle(&PaymentIntentCommand::Settle(SettlePaymentIntent {
                reference,
                status: PaymentStatus::Failed,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound(_)));
    }
}
