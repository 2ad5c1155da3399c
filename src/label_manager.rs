//! Resolution of the singleton label marking answered messages
use std::sync::Arc;

use crate::client::MailClient;
use crate::error::{ResponderError, Result};
use crate::models::{LabelCreation, LabelInfo};
use tracing::{debug, info, warn};

/// Ensures the responder's label exists exactly once in the account
pub struct LabelManager {
    client: Arc<dyn MailClient>,
}

impl LabelManager {
    pub fn new(client: Arc<dyn MailClient>) -> Self {
        Self { client }
    }

    /// Returns the id of the label called `name`, creating it if needed
    ///
    /// Creation is attempted first and Gmail arbitrates uniqueness, so two
    /// processes racing here both end up with the same id. Safe to call on
    /// every startup.
    ///
    /// # Errors
    /// * `LabelError` - Gmail reported a conflict but no label matches `name`
    pub async fn ensure_label(&self, name: &str) -> Result<String> {
        match self.client.create_label(name).await? {
            LabelCreation::Created(id) => {
                info!("Created label '{}' with ID: {}", name, id);
                Ok(id)
            }
            LabelCreation::AlreadyExists => {
                debug!("Label '{}' already exists, looking up its ID", name);
                let labels = self.client.list_labels().await?;

                match find_label(&labels, name) {
                    Some(label) => {
                        info!("Found existing label '{}' with ID: {}", label.name, label.id);
                        Ok(label.id.clone())
                    }
                    None => {
                        warn!(
                            "Label '{}' conflicts on create but is missing from {} listed labels",
                            name,
                            labels.len()
                        );
                        Err(ResponderError::LabelError(format!(
                            "Gmail reports label '{}' exists but it is not in the label list",
                            name
                        )))
                    }
                }
            }
        }
    }
}

/// Exact name match first; Gmail treats label names case-insensitively
fn find_label<'a>(labels: &'a [LabelInfo], name: &str) -> Option<&'a LabelInfo> {
    labels.iter().find(|l| l.name == name).or_else(|| {
        let lower = name.to_lowercase();
        labels.iter().find(|l| l.name.to_lowercase() == lower)
    })
}
