use async_trait::async_trait;
use std::time::Duration;

use crate::observer::context::ObserverContext;
use crate::observer::error::ObserverError;
use crate::types::Operation;

/// Observer rings, executed in ascending order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ObserverRing {
    DataPreparation = 0, // Load the stored record for updates and deletes
    Validation = 1,      // Writable fields, required fields, value types, permissions
    Enrichment = 4,      // Computed fields and defaults
    Database = 5,        // SQL execution
    PostDatabase = 6,    // Follow-up work once the row is written
}

impl ObserverRing {
    pub const ALL: [ObserverRing; 5] = [
        ObserverRing::DataPreparation,
        ObserverRing::Validation,
        ObserverRing::Enrichment,
        ObserverRing::Database,
        ObserverRing::PostDatabase,
    ];

    /// Failures before the database ring abort the write
    pub fn is_pre_database(&self) -> bool {
        (*self as u8) < (ObserverRing::Database as u8)
    }
}

/// Observer metadata and applicability checks
pub trait Observer: Send + Sync {
    fn name(&self) -> &'static str;

    fn ring(&self) -> ObserverRing;

    fn applies_to_operation(&self, _op: Operation) -> bool {
        true
    }

    /// Table names this observer runs for; empty means every table
    fn tables(&self) -> &'static [&'static str] {
        &[]
    }

    fn applies_to_table(&self, table: &str) -> bool {
        let tables = self.tables();
        tables.is_empty() || tables.contains(&table)
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// Order within a ring (lower runs first)
    fn priority(&self) -> u8 {
        50
    }
}

#[async_trait]
pub trait GenericObserver: Observer {
    async fn execute(&self, ctx: &mut ObserverContext) -> Result<(), ObserverError>;
}
