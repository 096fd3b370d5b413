use error_stack::{report, ResultExt};
use google_drive3::{api::Permission, api::Scope as DriveScope, DriveHub};
use google_sheets4::{
    api::{
        AddSheetRequest, BatchUpdateSpreadsheetRequest, GridProperties, Request, Scope,
        SheetProperties, Spreadsheet, SpreadsheetProperties, ValueRange,
    },
    Sheets,
};
use std::fmt::Debug;
use tracing::instrument;

use super::{
    api_error::{drive_report, sheets_report},
    auth::{self, AuthError},
    http_client::{self, HttpsConnector},
    value_range_factory::{IntoStringGrid, ValueRangeFactory},
};
use crate::domain::sheets::{
    a1_notation::{whole_sheet, A1Notation, CellSpan, ToA1Notation},
    cell_position::CellPosition,
};
use crate::ports::spreadsheet_service::{
    NewWorksheet, ShareGrant, SpreadsheetError, SpreadsheetHandle, SpreadsheetResult,
    SpreadsheetService, WorksheetHandle,
};

const SPREADSHEET_MIME_TYPE: &str = "application/vnd.google-apps.spreadsheet";

/// [`SpreadsheetService`] backed by the Google Sheets and Drive APIs.
pub struct SpreadsheetManager {
    sheets: Sheets<HttpsConnector>,
    drive: DriveHub<HttpsConnector>,
}

impl Debug for SpreadsheetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SpreadsheetManager")
    }
}

impl SpreadsheetManager {
    #[instrument(name = "SpreadsheetManager::authorize")]
    pub async fn authorize(credentials_path: &str) -> error_stack::Result<Self, AuthError> {
        let client = http_client::http_client()
            .change_context(AuthError::HttpClient)
            .attach_printable("loading native root certificates")?;
        let authenticator = auth::auth(credentials_path, client.clone()).await?;

        Ok(SpreadsheetManager {
            sheets: Sheets::new(client.clone(), authenticator.clone()),
            drive: DriveHub::new(client, authenticator),
        })
    }

    async fn read_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
    ) -> SpreadsheetResult<ValueRange> {
        let (_, value_range) = self
            .sheets
            .spreadsheets()
            .values_get(spreadsheet_id, range.as_ref())
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(sheets_report)
            .attach_printable_lazy(|| format!("Failed to read range {}", range))?;

        Ok(value_range)
    }

    async fn write_range(
        &self,
        spreadsheet_id: &str,
        range: &A1Notation,
        value_range: ValueRange,
    ) -> SpreadsheetResult<()> {
        self.sheets
            .spreadsheets()
            .values_update(value_range, spreadsheet_id, range.as_ref())
            .value_input_option("USER_ENTERED")
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map(|_| ())
            .map_err(sheets_report)
            .attach_printable_lazy(|| format!("Failed to write to range {}", range))
    }
}

fn worksheet_handle(
    spreadsheet_id: &str,
    properties: SheetProperties,
) -> SpreadsheetResult<WorksheetHandle> {
    let grid = properties.grid_properties.unwrap_or_default();
    let to_u32 = |value: Option<i32>| value.and_then(|v| u32::try_from(v).ok()).unwrap_or(0);

    Ok(WorksheetHandle {
        spreadsheet_id: spreadsheet_id.to_string(),
        sheet_id: properties
            .sheet_id
            .ok_or_else(|| report!(SpreadsheetError::Unexpected))
            .attach_printable("Sheet id not present in sheet properties")?,
        title: properties
            .title
            .ok_or_else(|| report!(SpreadsheetError::Unexpected))
            .attach_printable("Sheet title not present in sheet properties")?,
        index: to_u32(properties.index),
        row_count: to_u32(grid.row_count),
        column_count: to_u32(grid.column_count),
    })
}

/// Drive query string literal: backslashes and single quotes are escaped.
fn drive_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

#[async_trait::async_trait]
impl SpreadsheetService for SpreadsheetManager {
    #[instrument(skip(self))]
    async fn open(&self, name: &str) -> SpreadsheetResult<SpreadsheetHandle> {
        let query = format!(
            "name = '{}' and mimeType = '{}' and trashed = false",
            drive_query_literal(name),
            SPREADSHEET_MIME_TYPE
        );

        let (_, file_list) = self
            .drive
            .files()
            .list()
            .q(&query)
            .supports_all_drives(true)
            .include_items_from_all_drives(true)
            .add_scope(DriveScope::Full)
            .doit()
            .await
            .map_err(drive_report)
            .attach_printable_lazy(|| format!("Failed to search Drive for '{}'", name))?;

        let file = file_list
            .files
            .unwrap_or_default()
            .into_iter()
            .find(|file| file.id.is_some())
            .ok_or(report!(SpreadsheetError::NotFound))
            .attach_printable_lazy(|| format!("No spreadsheet named '{}'", name))?;

        Ok(SpreadsheetHandle {
            id: file.id.unwrap_or_default(),
            name: file.name.unwrap_or_else(|| name.to_string()),
        })
    }

    #[instrument(skip(self))]
    async fn create(&self, name: &str) -> SpreadsheetResult<SpreadsheetHandle> {
        let request = Spreadsheet {
            properties: Some(SpreadsheetProperties {
                title: Some(name.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        let (_, created) = self
            .sheets
            .spreadsheets()
            .create(request)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(sheets_report)
            .attach_printable_lazy(|| format!("Failed to create spreadsheet '{}'", name))?;

        let id = created
            .spreadsheet_id
            .ok_or_else(|| report!(SpreadsheetError::Unexpected))
            .attach_printable("Spreadsheet id not present in create response")?;

        Ok(SpreadsheetHandle {
            id,
            name: name.to_string(),
        })
    }

    #[instrument(skip(self))]
    async fn share(
        &self,
        spreadsheet: &SpreadsheetHandle,
        grant: &ShareGrant,
    ) -> SpreadsheetResult<()> {
        let permission = Permission {
            email_address: Some(grant.email.clone()),
            role: Some(grant.role.to_string()),
            type_: Some(grant.permission_type.to_string()),
            ..Default::default()
        };

        self.drive
            .permissions()
            .create(permission, &spreadsheet.id)
            .send_notification_email(true)
            .supports_all_drives(true)
            .add_scope(DriveScope::Full)
            .doit()
            .await
            .map(|_| ())
            .map_err(drive_report)
            .attach_printable_lazy(|| {
                format!("Failed to share '{}' with {}", spreadsheet.name, grant.email)
            })
    }

    #[instrument(skip(self))]
    async fn worksheets(
        &self,
        spreadsheet: &SpreadsheetHandle,
    ) -> SpreadsheetResult<Vec<WorksheetHandle>> {
        let (_, response) = self
            .sheets
            .spreadsheets()
            .get(&spreadsheet.id)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(sheets_report)
            .attach_printable_lazy(|| format!("Failed to fetch spreadsheet '{}'", spreadsheet.name))?;

        let mut worksheets = response
            .sheets
            .unwrap_or_default()
            .into_iter()
            .filter_map(|sheet| sheet.properties)
            .map(|properties| worksheet_handle(&spreadsheet.id, properties))
            .collect::<SpreadsheetResult<Vec<_>>>()?;

        worksheets.sort_by_key(|worksheet| worksheet.index);
        Ok(worksheets)
    }

    #[instrument(skip(self))]
    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        worksheet: &NewWorksheet,
    ) -> SpreadsheetResult<WorksheetHandle> {
        let to_i32 = |value: u32| {
            i32::try_from(value)
                .change_context(SpreadsheetError::InvalidInput)
                .attach_printable_lazy(|| format!("Grid size {} is too large", value))
        };

        let request = BatchUpdateSpreadsheetRequest {
            requests: Some(vec![Request {
                add_sheet: Some(AddSheetRequest {
                    properties: Some(SheetProperties {
                        title: Some(worksheet.title.clone()),
                        grid_properties: Some(GridProperties {
                            row_count: Some(to_i32(worksheet.rows)?),
                            column_count: Some(to_i32(worksheet.cols)?),
                            ..Default::default()
                        }),
                        ..Default::default()
                    }),
                }),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let (_, response) = self
            .sheets
            .spreadsheets()
            .batch_update(request, &spreadsheet.id)
            .add_scope(Scope::Spreadsheet)
            .doit()
            .await
            .map_err(sheets_report)
            .attach_printable_lazy(|| format!("Failed to add worksheet '{}'", worksheet.title))?;

        let properties = response
            .replies
            .unwrap_or_default()
            .into_iter()
            .find_map(|reply| reply.add_sheet)
            .and_then(|added| added.properties)
            .ok_or_else(|| report!(SpreadsheetError::Unexpected))
            .attach_printable("addSheet reply not present in batch update response")?;

        worksheet_handle(&spreadsheet.id, properties)
    }

    #[instrument(skip(self))]
    async fn get_all_values(&self, worksheet: &WorksheetHandle) -> SpreadsheetResult<Vec<Vec<String>>> {
        let value_range = self
            .read_range(&worksheet.spreadsheet_id, &whole_sheet(&worksheet.title))
            .await?;

        Ok(value_range.into_string_grid())
    }

    #[instrument(skip(self))]
    async fn cell(
        &self,
        worksheet: &WorksheetHandle,
        position: CellPosition,
    ) -> SpreadsheetResult<String> {
        let range = position.to_a1_notation(Some(&worksheet.title));
        let value = self
            .read_range(&worksheet.spreadsheet_id, &range)
            .await?
            .into_string_grid()
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or_default();

        Ok(value)
    }

    #[instrument(skip(self))]
    async fn update_cell(
        &self,
        worksheet: &WorksheetHandle,
        position: CellPosition,
        value: &str,
    ) -> SpreadsheetResult<()> {
        let range = position.to_a1_notation(Some(&worksheet.title));
        self.write_range(
            &worksheet.spreadsheet_id,
            &range,
            ValueRange::from_single_cell(value),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn update_column(
        &self,
        worksheet: &WorksheetHandle,
        start: CellPosition,
        values: &[String],
    ) -> SpreadsheetResult<()> {
        if values.is_empty() {
            return Ok(());
        }

        let range = CellSpan::column_from(start, values.len() as u32)
            .to_a1_notation(Some(&worksheet.title));
        self.write_range(
            &worksheet.spreadsheet_id,
            &range,
            ValueRange::from_single_column(values),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drive_query_literal_escapes_quotes() {
        assert_eq!(drive_query_literal("plain"), "plain");
        assert_eq!(drive_query_literal("O'Neil's grades"), "O\\'Neil\\'s grades");
        assert_eq!(drive_query_literal("a\\b"), "a\\\\b");
    }

    #[test]
    fn test_worksheet_handle_from_properties() {
        let properties = SheetProperties {
            sheet_id: Some(42),
            title: Some("Period 1".to_string()),
            index: Some(2),
            grid_properties: Some(GridProperties {
                row_count: Some(100),
                column_count: Some(8),
                ..Default::default()
            }),
            ..Default::default()
        };

        let handle = worksheet_handle("abc", properties).unwrap();
        assert_eq!(
            handle,
            WorksheetHandle {
                spreadsheet_id: "abc".to_string(),
                sheet_id: 42,
                title: "Period 1".to_string(),
                index: 2,
                row_count: 100,
                column_count: 8,
            }
        );
    }

    #[test]
    fn test_worksheet_handle_requires_title() {
        let properties = SheetProperties {
            sheet_id: Some(1),
            ..Default::default()
        };
        let err = worksheet_handle("abc", properties).unwrap_err();
        assert_eq!(*err.current_context(), SpreadsheetError::Unexpected);
    }

    #[tokio::test]
    async fn test_authorize_reports_startup_failures() {
        let err = SpreadsheetManager::authorize("does-not-exist/credentials.json")
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            AuthError::HttpClient | AuthError::CredentialsUnreadable
        ));
    }
}
