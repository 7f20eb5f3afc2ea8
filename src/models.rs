pub mod inventory;
pub use inventory::{Balance, ReconciliationReport, ReleaseOutcome, ReorderStatus, StockKey};
pub mod journal;
pub use journal::{DocumentRef, JournalEntry, JournalListing, JournalPage, NewJournalEntry, ReferenceType, TransactionType};
pub mod opening_stock;
pub use opening_stock::OpeningStock;
pub mod supply_chain;
pub use supply_chain::{SupplyChainSummary, TypeTotal};
pub mod requests;
pub use requests::{
    AdjustmentRequest, ConsumeRequest, ConsumptionKind, OpeningStockRequest, ReceiptSource,
    ReceiveRequest, ReverseRequest, StockRequest,
};
