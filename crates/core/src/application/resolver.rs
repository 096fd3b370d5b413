use error_stack::ResultExt;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::ports::spreadsheet_service::{
    ShareGrant, SpreadsheetError, SpreadsheetHandle, SpreadsheetService,
};

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("failed to open spreadsheet '{0}'")]
    Open(String),
    #[error("failed to create spreadsheet '{0}'")]
    Create(String),
}

/// Opens the spreadsheet called `name`, creating it only when the service reports it does not
/// exist. A freshly created spreadsheet is shared with `share_to_email` as writer; a failed share
/// is logged and does not fail the resolution.
#[instrument(skip(service))]
pub async fn resolve_spreadsheet(
    service: &dyn SpreadsheetService,
    name: &str,
    share_to_email: Option<&str>,
) -> error_stack::Result<SpreadsheetHandle, ResolveError> {
    match service.open(name).await {
        Ok(spreadsheet) => {
            info!("Opened spreadsheet '{}' ({})", spreadsheet.name, spreadsheet.id);
            Ok(spreadsheet)
        }
        Err(report) if *report.current_context() == SpreadsheetError::NotFound => {
            info!("Creating new spreadsheet: {}", name);
            let spreadsheet = service
                .create(name)
                .await
                .change_context_lazy(|| ResolveError::Create(name.to_string()))?;

            if let Some(email) = share_to_email {
                match service.share(&spreadsheet, &ShareGrant::writer(email)).await {
                    Ok(()) => info!("Shared '{}' with {} as writer", name, email),
                    Err(report) => warn!("Could not share '{}' with {}: {:?}", name, email, report),
                }
            }

            Ok(spreadsheet)
        }
        Err(report) => Err(report.change_context(ResolveError::Open(name.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemorySpreadsheetService, Operation};
    use crate::ports::spreadsheet_service::{PermissionType, Role};

    #[tokio::test]
    async fn test_creates_missing_spreadsheet_and_shares_it() {
        let service = MemorySpreadsheetService::new();

        let spreadsheet = resolve_spreadsheet(&service, "Biology", Some("ta@example.com"))
            .await
            .unwrap();

        assert_eq!(spreadsheet.name, "Biology");
        assert_eq!(service.spreadsheet_count().await, 1);
        let shares = service.shares(&spreadsheet).await;
        assert_eq!(shares.len(), 1);
        assert_eq!(shares[0].email, "ta@example.com");
        assert_eq!(shares[0].permission_type, PermissionType::User);
        assert_eq!(shares[0].role, Role::Writer);
    }

    #[tokio::test]
    async fn test_resolving_twice_does_not_duplicate() {
        let service = MemorySpreadsheetService::new();

        let first = resolve_spreadsheet(&service, "Biology", None).await.unwrap();
        let second = resolve_spreadsheet(&service, "Biology", None).await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(service.spreadsheet_count().await, 1);
    }

    #[tokio::test]
    async fn test_existing_spreadsheet_is_not_shared_again() {
        let service = MemorySpreadsheetService::new();
        let created = service.create("Biology").await.unwrap();

        let opened = resolve_spreadsheet(&service, "Biology", Some("ta@example.com"))
            .await
            .unwrap();

        assert_eq!(opened.id, created.id);
        assert!(service.shares(&opened).await.is_empty());
    }

    #[tokio::test]
    async fn test_other_open_failures_propagate_without_creating() {
        let service = MemorySpreadsheetService::new();
        service
            .fail_next(Operation::Open, SpreadsheetError::PermissionDenied)
            .await;

        let err = resolve_spreadsheet(&service, "Biology", None)
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), ResolveError::Open(_)));
        assert_eq!(
            err.downcast_ref::<SpreadsheetError>(),
            Some(&SpreadsheetError::PermissionDenied)
        );
        assert_eq!(service.spreadsheet_count().await, 0);
    }

    #[tokio::test]
    async fn test_share_failure_is_not_fatal() {
        let service = MemorySpreadsheetService::new();
        service
            .fail_next(Operation::Share, SpreadsheetError::Transient)
            .await;

        let spreadsheet = resolve_spreadsheet(&service, "Biology", Some("ta@example.com"))
            .await
            .unwrap();

        assert_eq!(spreadsheet.name, "Biology");
        assert!(service.shares(&spreadsheet).await.is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_propagates() {
        let service = MemorySpreadsheetService::new();
        service
            .fail_next(Operation::Create, SpreadsheetError::PermissionDenied)
            .await;

        let err = resolve_spreadsheet(&service, "Biology", None)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), ResolveError::Create(_)));
    }
}
