use error_stack::Report;

use crate::ports::spreadsheet_service::SpreadsheetError;

pub fn classify_status(status: u16) -> SpreadsheetError {
    match status {
        404 => SpreadsheetError::NotFound,
        401 | 403 => SpreadsheetError::PermissionDenied,
        400 | 409 | 412 | 422 => SpreadsheetError::InvalidInput,
        408 | 429 | 500..=599 => SpreadsheetError::Transient,
        _ => SpreadsheetError::Unexpected,
    }
}

/// Google error bodies look like `{"error": {"code": 404, "message": "...", "status": "NOT_FOUND"}}`.
pub fn classify_error_body(body: &serde_json::Value) -> SpreadsheetError {
    body.get("error")
        .and_then(|error| error.get("code"))
        .and_then(|code| code.as_u64())
        .and_then(|code| u16::try_from(code).ok())
        .map(classify_status)
        .unwrap_or(SpreadsheetError::InvalidInput)
}

pub fn classify_sheets_error(error: &google_sheets4::Error) -> SpreadsheetError {
    use google_sheets4::Error;
    match error {
        Error::BadRequest(body) => classify_error_body(body),
        Error::Failure(response) => classify_status(response.status().as_u16()),
        Error::HttpError(_) => SpreadsheetError::Transient,
        Error::MissingToken(_) => SpreadsheetError::PermissionDenied,
        _ => SpreadsheetError::Unexpected,
    }
}

pub fn classify_drive_error(error: &google_drive3::Error) -> SpreadsheetError {
    use google_drive3::Error;
    match error {
        Error::BadRequest(body) => classify_error_body(body),
        Error::Failure(response) => classify_status(response.status().as_u16()),
        Error::HttpError(_) => SpreadsheetError::Transient,
        Error::MissingToken(_) => SpreadsheetError::PermissionDenied,
        _ => SpreadsheetError::Unexpected,
    }
}

pub fn sheets_report(error: google_sheets4::Error) -> Report<SpreadsheetError> {
    let context = classify_sheets_error(&error);
    Report::new(error).change_context(context)
}

pub fn drive_report(error: google_drive3::Error) -> Report<SpreadsheetError> {
    let context = classify_drive_error(&error);
    Report::new(error).change_context(context)
}
