use thiserror::Error;

use crate::domain::sheets::cell_position::CellPosition;

/// Failure classes of the remote spreadsheet service. The adapter picks the variant; callers branch
/// on it through `Report::current_context`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpreadsheetError {
    #[error("not found")]
    NotFound,
    #[error("permission denied")]
    PermissionDenied,
    #[error("request rejected as invalid")]
    InvalidInput,
    #[error("temporary service or network failure")]
    Transient,
    #[error("unexpected service response")]
    Unexpected,
}

pub type SpreadsheetResult<T> = error_stack::Result<T, SpreadsheetError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpreadsheetHandle {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorksheetHandle {
    pub spreadsheet_id: String,
    pub sheet_id: i32,
    pub title: String,
    pub index: u32,
    pub row_count: u32,
    pub column_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum PermissionType {
    User,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Writer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareGrant {
    pub email: String,
    pub permission_type: PermissionType,
    pub role: Role,
}

impl ShareGrant {
    pub fn writer(email: impl Into<String>) -> Self {
        ShareGrant {
            email: email.into(),
            permission_type: PermissionType::User,
            role: Role::Writer,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWorksheet {
    pub title: String,
    pub rows: u32,
    pub cols: u32,
}

/// Client side of the remote spreadsheet contract.
#[async_trait::async_trait]
pub trait SpreadsheetService: Send + Sync {
    /// Opens an existing spreadsheet by name. Fails with [`SpreadsheetError::NotFound`] when no
    /// spreadsheet of that name is visible to the client.
    async fn open(&self, name: &str) -> SpreadsheetResult<SpreadsheetHandle>;

    async fn create(&self, name: &str) -> SpreadsheetResult<SpreadsheetHandle>;

    async fn share(&self, spreadsheet: &SpreadsheetHandle, grant: &ShareGrant)
        -> SpreadsheetResult<()>;

    /// Worksheets in tab order.
    async fn worksheets(&self, spreadsheet: &SpreadsheetHandle)
        -> SpreadsheetResult<Vec<WorksheetHandle>>;

    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        worksheet: &NewWorksheet,
    ) -> SpreadsheetResult<WorksheetHandle>;

    /// All values of the worksheet as displayed strings. Rows may be ragged; trailing empty rows
    /// and cells are omitted, so an empty sheet yields an empty vector.
    async fn get_all_values(&self, worksheet: &WorksheetHandle)
        -> SpreadsheetResult<Vec<Vec<String>>>;

    /// Value of a single cell; an empty cell reads as `""`.
    async fn cell(&self, worksheet: &WorksheetHandle, position: CellPosition)
        -> SpreadsheetResult<String>;

    async fn update_cell(
        &self,
        worksheet: &WorksheetHandle,
        position: CellPosition,
        value: &str,
    ) -> SpreadsheetResult<()>;

    /// Writes `values` downward from `start`, one value per row.
    async fn update_column(
        &self,
        worksheet: &WorksheetHandle,
        start: CellPosition,
        values: &[String],
    ) -> SpreadsheetResult<()>;
}
