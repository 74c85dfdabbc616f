pub use sea_orm_migration::prelude::*;

mod m20250806_000000_bootstrap;
mod m20250806_000001_create_campaigns;
mod m20250806_000002_create_recipients;
mod m20250806_000003_create_messaging;
mod m20250806_000004_create_billing;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250806_000000_bootstrap::Migration),
            Box::new(m20250806_000001_create_campaigns::Migration),
            Box::new(m20250806_000002_create_recipients::Migration),
            Box::new(m20250806_000003_create_messaging::Migration),
            Box::new(m20250806_000004_create_billing::Migration),
        ]
    }
}
