use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateId, AggregateRoot, DomainError};
use storefront_events::Event;
use storefront_sales::OrderId;

/// Invoice identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub AggregateId);

impl InvoiceId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }

    /// The id owned by `invoice_number`. Numbers compare trimmed.
    pub fn for_number(invoice_number: &str) -> Self {
        Self(AggregateId::derived("invoice", invoice_number.trim()))
    }
}

impl core::fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl core::str::FromStr for InvoiceId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Invoice payment status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Paid,
    #[default]
    Unpaid,
    Overdue,
}

/// Aggregate root: Invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    id: InvoiceId,
    order_id: Option<OrderId>,
    invoice_number: String,
    amount: u64,
    issued_date: Option<DateTime<Utc>>,
    status: InvoiceStatus,
    version: u64,
    created: bool,
}

impl Invoice {
    /// Stream type recorded with every event of this aggregate.
    pub const AGGREGATE_TYPE: &'static str = "invoicing.invoice";

    /// Create an empty, not-yet-created aggregate instance for rehydration.
    pub fn empty(id: InvoiceId) -> Self {
        Self {
            id,
            order_id: None,
            invoice_number: String::new(),
            amount: 0,
            issued_date: None,
            status: InvoiceStatus::Unpaid,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> InvoiceId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn order_id(&self) -> Option<OrderId> {
        self.order_id
    }

    pub fn invoice_number(&self) -> &str {
        &self.invoice_number
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn issued_date(&self) -> Option<DateTime<Utc>> {
        self.issued_date
    }

    pub fn status(&self) -> InvoiceStatus {
        self.status
    }
}

impl AggregateRoot for Invoice {
    type Id = InvoiceId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: IssueInvoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueInvoice {
    pub order_id: OrderId,
    pub invoice_number: String,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateInvoiceStatus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateInvoiceStatus {
    pub invoice_id: InvoiceId,
    pub status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceCommand {
    IssueInvoice(IssueInvoice),
    UpdateStatus(UpdateInvoiceStatus),
}

/// Event: InvoiceIssued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceIssued {
    pub invoice_id: InvoiceId,
    pub order_id: OrderId,
    pub invoice_number: String,
    pub amount: u64,
    pub occurred_at: DateTime<Utc>,
}

/// Event: InvoiceStatusChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceStatusChanged {
    pub invoice_id: InvoiceId,
    pub previous_status: InvoiceStatus,
    pub status: InvoiceStatus,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceEvent {
    InvoiceIssued(InvoiceIssued),
    InvoiceStatusChanged(InvoiceStatusChanged),
}

impl Event for InvoiceEvent {
    fn event_type(&self) -> &'static str {
        match self {
            InvoiceEvent::InvoiceIssued(_) => "invoicing.invoice.issued",
            InvoiceEvent::InvoiceStatusChanged(_) => "invoicing.invoice.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            InvoiceEvent::InvoiceIssued(e) => e.occurred_at,
            InvoiceEvent::InvoiceStatusChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Invoice {
    type Command = InvoiceCommand;
    type Event = InvoiceEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            InvoiceEvent::InvoiceIssued(e) => {
                self.id = e.invoice_id;
                self.order_id = Some(e.order_id);
                self.invoice_number = e.invoice_number.clone();
                self.amount = e.amount;
                self.issued_date = Some(e.occurred_at);
                self.status = InvoiceStatus::Unpaid;
                self.created = true;
            }
            InvoiceEvent::InvoiceStatusChanged(e) => {
                self.status = e.status;
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            InvoiceCommand::IssueInvoice(cmd) => self.handle_issue(cmd),
            InvoiceCommand::UpdateStatus(cmd) => self.handle_update_status(cmd),
        }
    }
}

impl Invoice {
    fn handle_issue(&self, cmd: &IssueInvoice) -> Result<Vec<InvoiceEvent>, DomainError> {
        let number = cmd.invoice_number.trim();
        if number.is_empty() {
            return Err(DomainError::MissingFields(vec!["invoiceNumber".to_string()]));
        }
        if self.created {
            return Err(DomainError::duplicate("Invoice number already exists"));
        }
        if InvoiceId::for_number(number) != self.id {
            return Err(DomainError::invariant("invoice_id does not match invoice number"));
        }

        Ok(vec![InvoiceEvent::InvoiceIssued(InvoiceIssued {
            invoice_id: self.id,
            order_id: cmd.order_id,
            invoice_number: number.to_string(),
            amount: cmd.amount,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_update_status(
        &self,
        cmd: &UpdateInvoiceStatus,
    ) -> Result<Vec<InvoiceEvent>, DomainError> {
        if !self.created || self.id != cmd.invoice_id {
            return Err(DomainError::not_found("Invoice not found"));
        }
        if self.status == cmd.status {
            return Ok(vec![]);
        }

        Ok(vec![InvoiceEvent::InvoiceStatusChanged(InvoiceStatusChanged {
            invoice_id: self.id,
            previous_status: self.status,
            status: cmd.status,
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_events::execute;

    fn issue(number: &str) -> InvoiceCommand {
        InvoiceCommand::IssueInvoice(IssueInvoice {
            order_id: OrderId::new(AggregateId::new()),
            invoice_number: number.to_string(),
            amount: 1_500,
            occurred_at: Utc::now(),
        })
    }

    fn issued(number: &str) -> Invoice {
        let mut invoice = Invoice::empty(InvoiceId::for_number(number));
        execute(&mut invoice, &issue(number)).unwrap();
        invoice
    }

    #[test]
    fn issued_invoice_starts_unpaid() {
        let invoice = issued("INV-001");
        assert_eq!(invoice.status(), InvoiceStatus::Unpaid);
        assert_eq!(invoice.invoice_number(), "INV-001");
        assert!(invoice.issued_date().is_some());
    }

    #[test]
    fn same_number_maps_to_same_stream_and_is_rejected() {
        let invoice = issued("INV-002");
        assert_eq!(invoice.id_typed(), InvoiceId::for_number(" INV-002 "));

        let err = invoice.handle(&issue("INV-002")).unwrap_err();
        assert!(matches!(err, DomainError::Duplicate(_)));
    }

    #[test]
    fn blank_number_is_a_missing_field() {
        let invoice = Invoice::empty(InvoiceId::for_number(""));
        let err = invoice.handle(&issue("  ")).unwrap_err();
        assert!(matches!(err, DomainError::MissingFields(_)));
    }

    #[test]
    fn status_update_changes_status_once() {
        let mut invoice = issued("INV-003");
        let cmd = InvoiceCommand::UpdateStatus(UpdateInvoiceStatus {
            invoice_id: invoice.id_typed(),
            status: InvoiceStatus::Paid,
            occurred_at: Utc::now(),
        });

        assert_eq!(execute(&mut invoice, &cmd).unwrap().len(), 1);
        assert!(execute(&mut invoice, &cmd).unwrap().is_empty());
        assert_eq!(invoice.status(), InvoiceStatus::Paid);
    }

    #[test]
    fn status_update_on_unknown_invoice_is_not_found() {
        let invoice = Invoice::empty(InvoiceId::new(AggregateId::new()));
        let err = invoice
            .handle(&InvoiceCommand::UpdateStatus(UpdateInvoiceStatus {
                invoice_id: invoice.id_typed(),
                status: InvoiceStatus::Overdue,
                occurred_at: Utc::now(),
            }))
            .unwrap_err();
        assert_eq!(err, DomainError::not_found("Invoice not found"));
    }
}
