mod alias_repository;
mod price_repository;
mod product_repository;

pub use alias_repository::{AliasRegistry, OwnedAlias, ReassignReport, SqliteAliasRegistry};
pub use price_repository::{PriceRepository, SqlitePriceRepository};
pub use product_repository::{ProductRepository, SqliteProductRepository};

use crate::error::Result;

pub trait Repository {
    type Entity;
    type Id;

    fn find_by_id(&self, id: &Self::Id) -> Result<Option<Self::Entity>>;
    fn save(&self, entity: &Self::Entity) -> Result<()>;
    fn delete(&self, id: &Self::Id) -> Result<bool>;
}
