use thiserror::Error;

use crate::ports::spreadsheet_service::WorksheetHandle;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    #[error("no worksheets available")]
    NoWorksheets,
    #[error("'{0}' is not a number")]
    NotANumber(String),
    #[error("{index} is out of range, choose between 1 and {len}")]
    OutOfRange { index: i64, len: usize },
    #[error("could not list worksheets")]
    Listing,
}

/// Picks a worksheet from a 1-based answer, as shown in the listing.
pub fn pick_worksheet(
    worksheets: &[WorksheetHandle],
    answer: &str,
) -> Result<WorksheetHandle, SelectionError> {
    if worksheets.is_empty() {
        return Err(SelectionError::NoWorksheets);
    }

    let answer = answer.trim();
    let index = answer
        .parse::<i64>()
        .map_err(|_| SelectionError::NotANumber(answer.to_string()))?;

    usize::try_from(index)
        .ok()
        .and_then(|index| index.checked_sub(1))
        .and_then(|index| worksheets.get(index))
        .cloned()
        .ok_or(SelectionError::OutOfRange {
            index,
            len: worksheets.len(),
        })
}
