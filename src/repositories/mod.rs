pub mod account_repository;
pub mod ledger_repository;
pub mod partner_repository;
pub mod trade_repository;

pub use account_repository::AccountRepository;
pub use ledger_repository::LedgerRepository;
pub use partner_repository::PartnerRepository;
pub use trade_repository::{
    OriginalOpeningRepository, ProductionRepository, PurchaseRepository, SalesInvoiceRepository,
};
