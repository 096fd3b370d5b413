//! In-process [`SpreadsheetService`] used by the test suites of both crates. It mirrors the
//! service's observable behaviour: names resolve to ids, grids have fixed bounds, reads omit
//! trailing empty rows and cells.

use std::collections::HashMap;

use error_stack::{report, ResultExt};
use tokio::sync::Mutex;

use crate::domain::sheets::cell_position::CellPosition;
use crate::ports::spreadsheet_service::{
    NewWorksheet, ShareGrant, SpreadsheetError, SpreadsheetHandle, SpreadsheetResult,
    SpreadsheetService, WorksheetHandle,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Open,
    Create,
    Share,
    Worksheets,
    AddWorksheet,
    GetAllValues,
    Cell,
    UpdateCell,
    UpdateColumn,
}

#[derive(Debug)]
struct StoredWorksheet {
    handle: WorksheetHandle,
    cells: Vec<Vec<String>>,
}

#[derive(Debug, Default)]
struct StoredSpreadsheet {
    name: String,
    worksheets: Vec<StoredWorksheet>,
    shares: Vec<ShareGrant>,
}

#[derive(Debug, Default)]
struct State {
    spreadsheets: Vec<StoredSpreadsheet>,
    next_sheet_id: i32,
    failures: HashMap<Operation, SpreadsheetError>,
    writes: usize,
}

#[derive(Debug, Default)]
pub struct MemorySpreadsheetService {
    state: Mutex<State>,
}

impl MemorySpreadsheetService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next call of `operation` fail with `error`.
    pub async fn fail_next(&self, operation: Operation, error: SpreadsheetError) {
        self.state.lock().await.failures.insert(operation, error);
    }

    pub async fn spreadsheet_count(&self) -> usize {
        self.state.lock().await.spreadsheets.len()
    }

    pub async fn shares(&self, spreadsheet: &SpreadsheetHandle) -> Vec<ShareGrant> {
        let state = self.state.lock().await;
        spreadsheet_index(&state, &spreadsheet.id)
            .map(|index| state.spreadsheets[index].shares.clone())
            .unwrap_or_default()
    }

    /// Number of successful `update_cell`/`update_column` calls.
    pub async fn write_count(&self) -> usize {
        self.state.lock().await.writes
    }

    /// Replaces the worksheet's content starting at `A1`.
    pub async fn fill(&self, worksheet: &WorksheetHandle, rows: &[&[&str]]) {
        let mut state = self.state.lock().await;
        if let Some(stored) = worksheet_mut(&mut state, worksheet) {
            let mut cells = blank_grid(stored.handle.row_count, stored.handle.column_count);
            for (r, row) in rows.iter().enumerate() {
                for (c, value) in row.iter().enumerate() {
                    if let Some(cell) = cells.get_mut(r).and_then(|cells| cells.get_mut(c)) {
                        *cell = value.to_string();
                    }
                }
            }
            stored.cells = cells;
        }
    }

    fn take_failure(state: &mut State, operation: Operation) -> SpreadsheetResult<()> {
        match state.failures.remove(&operation) {
            Some(error) => Err(report!(error))
                .attach_printable_lazy(|| format!("injected failure for {:?}", operation)),
            None => Ok(()),
        }
    }
}

fn blank_grid(rows: u32, cols: u32) -> Vec<Vec<String>> {
    vec![vec![String::new(); cols as usize]; rows as usize]
}

fn spreadsheet_index(state: &State, id: &str) -> Option<usize> {
    id.strip_prefix("memory-")
        .and_then(|index| index.parse::<usize>().ok())
        .filter(|index| *index < state.spreadsheets.len())
}

fn worksheet_mut<'a>(
    state: &'a mut State,
    worksheet: &WorksheetHandle,
) -> Option<&'a mut StoredWorksheet> {
    let index = spreadsheet_index(state, &worksheet.spreadsheet_id)?;
    state.spreadsheets[index]
        .worksheets
        .iter_mut()
        .find(|stored| stored.handle.sheet_id == worksheet.sheet_id)
}

fn not_found(what: String) -> error_stack::Report<SpreadsheetError> {
    report!(SpreadsheetError::NotFound).attach_printable(what)
}

fn cell_mut<'a>(
    stored: &'a mut StoredWorksheet,
    position: CellPosition,
) -> SpreadsheetResult<&'a mut String> {
    stored
        .cells
        .get_mut(position.row.index() as usize)
        .and_then(|row| row.get_mut(position.col.index() as usize))
        .ok_or(report!(SpreadsheetError::InvalidInput))
        .attach_printable_lazy(|| format!("Range {} exceeds grid limits", position))
}

#[async_trait::async_trait]
impl SpreadsheetService for MemorySpreadsheetService {
    async fn open(&self, name: &str) -> SpreadsheetResult<SpreadsheetHandle> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::Open)?;

        state
            .spreadsheets
            .iter()
            .position(|stored| stored.name == name)
            .map(|index| SpreadsheetHandle {
                id: format!("memory-{}", index),
                name: name.to_string(),
            })
            .ok_or_else(|| not_found(format!("No spreadsheet named '{}'", name)))
    }

    async fn create(&self, name: &str) -> SpreadsheetResult<SpreadsheetHandle> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::Create)?;

        // New spreadsheets come with one default worksheet, as the real service does.
        let sheet_id = state.next_sheet_id;
        state.next_sheet_id += 1;
        let id = format!("memory-{}", state.spreadsheets.len());
        let handle = WorksheetHandle {
            spreadsheet_id: id.clone(),
            sheet_id,
            title: "Sheet1".to_string(),
            index: 0,
            row_count: 1000,
            column_count: 26,
        };
        state.spreadsheets.push(StoredSpreadsheet {
            name: name.to_string(),
            worksheets: vec![StoredWorksheet {
                cells: blank_grid(handle.row_count, handle.column_count),
                handle,
            }],
            shares: Vec::new(),
        });

        Ok(SpreadsheetHandle {
            id,
            name: name.to_string(),
        })
    }

    async fn share(
        &self,
        spreadsheet: &SpreadsheetHandle,
        grant: &ShareGrant,
    ) -> SpreadsheetResult<()> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::Share)?;

        let index = spreadsheet_index(&state, &spreadsheet.id)
            .ok_or_else(|| not_found(format!("No spreadsheet with id {}", spreadsheet.id)))?;
        state.spreadsheets[index].shares.push(grant.clone());
        Ok(())
    }

    async fn worksheets(
        &self,
        spreadsheet: &SpreadsheetHandle,
    ) -> SpreadsheetResult<Vec<WorksheetHandle>> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::Worksheets)?;

        let index = spreadsheet_index(&state, &spreadsheet.id)
            .ok_or_else(|| not_found(format!("No spreadsheet with id {}", spreadsheet.id)))?;
        Ok(state.spreadsheets[index]
            .worksheets
            .iter()
            .map(|stored| stored.handle.clone())
            .collect())
    }

    async fn add_worksheet(
        &self,
        spreadsheet: &SpreadsheetHandle,
        worksheet: &NewWorksheet,
    ) -> SpreadsheetResult<WorksheetHandle> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::AddWorksheet)?;

        let index = spreadsheet_index(&state, &spreadsheet.id)
            .ok_or_else(|| not_found(format!("No spreadsheet with id {}", spreadsheet.id)))?;

        if worksheet.rows == 0 || worksheet.cols == 0 {
            return Err(report!(SpreadsheetError::InvalidInput))
                .attach_printable("Worksheet grid must have at least one row and one column");
        }
        let duplicate = state.spreadsheets[index]
            .worksheets
            .iter()
            .any(|stored| stored.handle.title == worksheet.title);
        if duplicate {
            return Err(report!(SpreadsheetError::InvalidInput)).attach_printable_lazy(|| {
                format!("A sheet with the name '{}' already exists", worksheet.title)
            });
        }

        let sheet_id = state.next_sheet_id;
        state.next_sheet_id += 1;
        let stored = &mut state.spreadsheets[index];
        let handle = WorksheetHandle {
            spreadsheet_id: spreadsheet.id.clone(),
            sheet_id,
            title: worksheet.title.clone(),
            index: stored.worksheets.len() as u32,
            row_count: worksheet.rows,
            column_count: worksheet.cols,
        };
        stored.worksheets.push(StoredWorksheet {
            handle: handle.clone(),
            cells: blank_grid(worksheet.rows, worksheet.cols),
        });
        Ok(handle)
    }

    async fn get_all_values(
        &self,
        worksheet: &WorksheetHandle,
    ) -> SpreadsheetResult<Vec<Vec<String>>> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::GetAllValues)?;

        let stored = worksheet_mut(&mut state, worksheet)
            .ok_or_else(|| not_found(format!("No worksheet '{}'", worksheet.title)))?;

        let mut values: Vec<Vec<String>> = stored
            .cells
            .iter()
            .map(|row| {
                let len = row.iter().rposition(|c| !c.is_empty()).map_or(0, |i| i + 1);
                row[..len].to_vec()
            })
            .collect();
        while values.last().is_some_and(|row| row.is_empty()) {
            values.pop();
        }
        Ok(values)
    }

    async fn cell(
        &self,
        worksheet: &WorksheetHandle,
        position: CellPosition,
    ) -> SpreadsheetResult<String> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::Cell)?;

        let stored = worksheet_mut(&mut state, worksheet)
            .ok_or_else(|| not_found(format!("No worksheet '{}'", worksheet.title)))?;
        cell_mut(stored, position).map(|cell| cell.clone())
    }

    async fn update_cell(
        &self,
        worksheet: &WorksheetHandle,
        position: CellPosition,
        value: &str,
    ) -> SpreadsheetResult<()> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::UpdateCell)?;

        let stored = worksheet_mut(&mut state, worksheet)
            .ok_or_else(|| not_found(format!("No worksheet '{}'", worksheet.title)))?;
        *cell_mut(stored, position)? = value.to_string();
        state.writes += 1;
        Ok(())
    }

    async fn update_column(
        &self,
        worksheet: &WorksheetHandle,
        start: CellPosition,
        values: &[String],
    ) -> SpreadsheetResult<()> {
        let mut state = self.state.lock().await;
        Self::take_failure(&mut state, Operation::UpdateColumn)?;

        let stored = worksheet_mut(&mut state, worksheet)
            .ok_or_else(|| not_found(format!("No worksheet '{}'", worksheet.title)))?;

        // Validate the whole span first so a rejected write leaves the grid untouched.
        let last = start.below((values.len() as u32).saturating_sub(1));
        cell_mut(stored, last)?;
        for (offset, value) in values.iter().enumerate() {
            *cell_mut(stored, start.below(offset as u32))? = value.clone();
        }
        state.writes += 1;
        Ok(())
    }
}
