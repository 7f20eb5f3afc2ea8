pub mod balance_repo;
pub use balance_repo::BalanceRepository;
pub mod journal_repo;
pub use journal_repo::JournalRepository;
pub mod opening_stock_repo;
pub use opening_stock_repo::OpeningStockRepository;
pub mod catalog_repo;
pub use catalog_repo::CatalogRepository;
pub mod summary_repo;
pub use summary_repo::SummaryRepository;

// Migrações embutidas no binário (pasta `migrations/` na raiz do crate)
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
