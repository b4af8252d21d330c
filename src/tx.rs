use tracing::{debug, error};

use crate::{
    error::AppError,
    store::{Queries, Store, Transaction},
};

/// Owns one storage transaction for a check-then-write sequence.
///
/// Run the domain operation against [`WriteTx::queries`], then hand its
/// outcome to [`WriteTx::finish`]: `Ok` commits, `Err` rolls back. Dropping a
/// `WriteTx` without finishing it (the request was cancelled) rolls back too.
pub struct WriteTx {
    tx: Box<dyn Transaction>,
}

impl WriteTx {
    pub async fn begin(store: &dyn Store) -> Result<Self, AppError> {
        let tx = store.begin().await?;
        Ok(Self { tx })
    }

    pub fn queries(&mut self) -> &mut dyn Queries {
        self.tx.queries()
    }

    pub async fn finish<T>(self, outcome: Result<T, AppError>) -> Result<T, AppError> {
        match outcome {
            Ok(value) => match self.tx.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    error!(error = ?e, "commit failed, transaction rolled back");
                    Err(AppError::Infrastructure(e))
                }
            },
            Err(original) => match self.tx.rollback().await {
                Ok(()) => {
                    debug!(error = %original, "transaction rolled back");
                    Err(original)
                }
                Err(rollback) => {
                    error!(error = %original, rollback = ?rollback, "rollback failed");
                    Err(AppError::RollbackFailed {
                        original: Box::new(original),
                        rollback,
                    })
                }
            },
        }
    }
}
