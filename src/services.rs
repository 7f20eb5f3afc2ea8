pub mod inventory_service;
pub use inventory_service::InventoryService;
pub mod opening_stock_service;
pub use opening_stock_service::OpeningStockService;
pub mod supply_chain_service;
pub use supply_chain_service::SupplyChainService;
