/// Business logic layer for catalog-service
pub mod catalog;
pub mod images;
pub mod ingestion;

pub use catalog::CatalogService;
pub use ingestion::IngestionService;
