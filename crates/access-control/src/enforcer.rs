use thiserror::Error;
use tracing::debug;

use sql_guard::TableReference;

use crate::AccessContext;

/// Denial reasons. Messages enumerate only resources from the caller's own
/// authorized set; they never confirm or deny the existence of anything
/// else.
#[derive(Debug, Error)]
pub enum EnforcementError {
    #[error(
        "You do not have the `{required}` permission. Ask an administrator to grant it to your role"
    )]
    PermissionDenied { required: String },

    #[error(
        "The generated query references a table outside your authorized set. You may query: {}",
        format_authorized(authorized)
    )]
    ReferenceDenied { authorized: Vec<String> },
}

fn format_authorized(authorized: &[String]) -> String {
    if authorized.is_empty() {
        "no tables (no grants assigned)".to_string()
    } else {
        authorized.join(", ")
    }
}

/// Cross-checks a required permission and extracted table references
/// against an [`AccessContext`].
///
/// This check is unconditional: every statement passes through it before
/// reaching the analytical engine, and a single unauthorized reference
/// denies the whole statement.
pub struct AccessEnforcer;

impl AccessEnforcer {
    pub fn enforce(
        context: &AccessContext,
        required_permission: &str,
        references: &[TableReference],
    ) -> Result<(), EnforcementError> {
        if !context.has_permission(required_permission) {
            return Err(EnforcementError::PermissionDenied {
                required: required_permission.to_string(),
            });
        }

        for reference in references {
            if !context.can_access_table(&reference.dataset, &reference.table) {
                debug!(
                    subject = context.subject(),
                    %reference,
                    "Denying statement with unauthorized reference"
                );
                return Err(EnforcementError::ReferenceDenied {
                    authorized: context.authorized_tables(),
                });
            }
        }

        Ok(())
    }
}
