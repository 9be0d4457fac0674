use tracing::debug;

use super::{Adapter, AdapterContext, FiaAdapter, Formula1Adapter};
use crate::{Category, RaceControlError, Result};

/// Build the adapter registered for a session-store category key.
pub fn resolve(category_key: &str, context: AdapterContext) -> Result<Box<dyn Adapter>> {
    let category = Category::from_key(category_key).ok_or_else(|| {
        RaceControlError::configuration(format!("no adapter registered for category '{category_key}'"))
    })?;
    debug!(%category, endpoint = %context.endpoint, "Resolved adapter");

    Ok(match category {
        Category::Formula1 => Box::new(Formula1Adapter::new(context)),
        Category::Formula2 | Category::Formula3 => Box::new(FiaAdapter::new(category, context)),
    })
}
