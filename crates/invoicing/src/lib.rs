//! Invoicing domain module (event-sourced).
//!
//! One invoice per invoice number; the stream id is derived from the number.

pub mod invoice;

pub use invoice::{
    Invoice, InvoiceCommand, InvoiceEvent, InvoiceId, InvoiceIssued, InvoiceStatus,
    InvoiceStatusChanged, IssueInvoice, UpdateInvoiceStatus,
};
