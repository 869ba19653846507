use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::{OriginalOpening, Production, Purchase, SalesInvoice};
use crate::store::{collections, Document, DocumentStore};

macro_rules! doc_repository {
    ($name:ident, $model:ty, $collection:expr) => {
        /// Read-only repository over one header-document collection.
        pub struct $name {
            store: Arc<dyn DocumentStore>,
        }

        impl $name {
            pub fn new(store: Arc<dyn DocumentStore>) -> Self {
                Self { store }
            }

            pub async fn find_all(&self) -> Result<Vec<$model>> {
                let docs = self.store.get_all($collection).await?;
                docs.iter()
                    .map(|d| d.to_model::<$model>().map_err(AppError::from))
                    .collect()
            }

            /// Seeds documents, used by fixtures and imports.
            pub async fn insert_all(&self, models: &[$model]) -> Result<()> {
                let ceiling = self.store.max_batch_ops();
                for chunk in models.chunks(ceiling) {
                    let docs = chunk
                        .iter()
                        .map(|m| Document::from_model(m.id.clone(), m))
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    self.store.append_batch($collection, docs).await?;
                }
                Ok(())
            }
        }
    };
}

doc_repository!(PurchaseRepository, Purchase, collections::PURCHASES);
doc_repository!(SalesInvoiceRepository, SalesInvoice, collections::SALES_INVOICES);
doc_repository!(ProductionRepository, Production, collections::PRODUCTIONS);
doc_repository!(
    OriginalOpeningRepository,
    OriginalOpening,
    collections::ORIGINAL_OPENINGS
);
