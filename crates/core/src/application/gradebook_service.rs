use std::sync::Arc;

use error_stack::{report, ResultExt};
use thiserror::Error;
use tracing::{info, instrument};

use crate::domain::gradebook::{
    grading::{attendance_percentage, final_grade, format_number},
    record::{records, RecordFieldError},
    schema::{GradebookField, GradebookSchema},
};
use crate::domain::sheets::{
    cell_position::CellPosition, column::Column, row::Row,
};
use crate::ports::spreadsheet_service::{
    NewWorksheet, SpreadsheetHandle, SpreadsheetService, WorksheetHandle,
};

#[derive(Error, Debug)]
pub enum WorksheetError {
    #[error("failed to list worksheets")]
    List,
    #[error("failed to create worksheet")]
    Create,
    #[error("invalid worksheet request: {0}")]
    InvalidRequest(&'static str),
    #[error("failed to read worksheet values")]
    Read,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    #[error("spreadsheet request failed")]
    Spreadsheet,
    #[error("student '{0}' not found")]
    StudentNotFound(String),
    #[error("value '{value}' in {position} is not a whole number")]
    NotAnInteger { position: String, value: String },
    #[error("worksheet rows do not hold the expected values")]
    InvalidData,
    #[error("grade is empty")]
    EmptyGrade,
}

/// Worksheet and record operations on the spreadsheet resolved at startup.
pub struct GradebookService {
    service: Arc<dyn SpreadsheetService>,
    spreadsheet: SpreadsheetHandle,
}

impl std::fmt::Debug for GradebookService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GradebookService")
            .field("spreadsheet", &self.spreadsheet)
            .finish()
    }
}

impl GradebookService {
    pub fn new(service: Arc<dyn SpreadsheetService>, spreadsheet: SpreadsheetHandle) -> Self {
        Self {
            service,
            spreadsheet,
        }
    }

    pub fn spreadsheet(&self) -> &SpreadsheetHandle {
        &self.spreadsheet
    }

    #[instrument(skip(self))]
    pub async fn list_worksheets(
        &self,
    ) -> error_stack::Result<Vec<WorksheetHandle>, WorksheetError> {
        self.service
            .worksheets(&self.spreadsheet)
            .await
            .change_context(WorksheetError::List)
    }

    #[instrument(skip(self))]
    pub async fn create_worksheet(
        &self,
        title: &str,
        rows: u32,
        cols: u32,
    ) -> error_stack::Result<WorksheetHandle, WorksheetError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(report!(WorksheetError::InvalidRequest("title is empty")));
        }
        if rows == 0 || cols == 0 {
            return Err(report!(WorksheetError::InvalidRequest(
                "rows and columns must be positive"
            )));
        }

        let worksheet = self
            .service
            .add_worksheet(
                &self.spreadsheet,
                &NewWorksheet {
                    title: title.to_string(),
                    rows,
                    cols,
                },
            )
            .await
            .change_context(WorksheetError::Create)?;

        info!("Created worksheet '{}' ({}x{})", worksheet.title, rows, cols);
        Ok(worksheet)
    }

    /// All values, with rows padded to the width of the widest one.
    #[instrument(skip(self))]
    pub async fn fetch_all_values(
        &self,
        worksheet: &WorksheetHandle,
    ) -> error_stack::Result<Vec<Vec<String>>, WorksheetError> {
        let mut values = self
            .service
            .get_all_values(worksheet)
            .await
            .change_context(WorksheetError::Read)?;

        let width = values.iter().map(Vec::len).max().unwrap_or(0);
        for row in &mut values {
            row.resize(width, String::new());
        }
        Ok(values)
    }

    /// First cell equal to `value`, scanning row by row.
    #[instrument(skip(self))]
    pub async fn find(
        &self,
        worksheet: &WorksheetHandle,
        value: &str,
    ) -> error_stack::Result<Option<CellPosition>, RecordError> {
        if value.is_empty() {
            return Ok(None);
        }

        let values = self
            .service
            .get_all_values(worksheet)
            .await
            .change_context(RecordError::Spreadsheet)?;

        Ok(values.iter().enumerate().find_map(|(row_index, row)| {
            row.iter()
                .position(|cell| cell == value)
                .map(|col_index| CellPosition::from_indices(row_index, col_index))
        }))
    }

    async fn student_row(
        &self,
        worksheet: &WorksheetHandle,
        student_id: &str,
    ) -> error_stack::Result<Row, RecordError> {
        self.find(worksheet, student_id)
            .await?
            .map(|position| position.row)
            .ok_or_else(|| report!(RecordError::StudentNotFound(student_id.to_string())))
            .attach_printable_lazy(|| format!("worksheet '{}'", worksheet.title))
    }

    /// Writes `grade` into `column` of the student's row.
    #[instrument(skip(self))]
    pub async fn update_grade(
        &self,
        worksheet: &WorksheetHandle,
        student_id: &str,
        column: Column,
        grade: &str,
    ) -> error_stack::Result<CellPosition, RecordError> {
        let grade = grade.trim();
        if grade.is_empty() {
            return Err(report!(RecordError::EmptyGrade));
        }

        let row = self.student_row(worksheet, student_id).await?;
        let position = CellPosition::new(row, column);

        self.service
            .update_cell(worksheet, position, grade)
            .await
            .change_context(RecordError::Spreadsheet)?;

        info!("Grade {} written to {} for {}", grade, position, student_id);
        Ok(position)
    }

    /// Increments the student's attendance count and returns the new value.
    #[instrument(skip(self, schema))]
    pub async fn update_attendance(
        &self,
        worksheet: &WorksheetHandle,
        schema: &GradebookSchema,
        student_id: &str,
    ) -> error_stack::Result<i64, RecordError> {
        let row = self.student_row(worksheet, student_id).await?;
        let position = CellPosition::new(row, schema.column(GradebookField::Attendance));

        let current = self
            .service
            .cell(worksheet, position)
            .await
            .change_context(RecordError::Spreadsheet)?;

        let count = current
            .trim()
            .parse::<i64>()
            .map_err(|_| {
                report!(RecordError::NotAnInteger {
                    position: position.to_string(),
                    value: current.clone(),
                })
            })?
            .checked_add(1)
            .ok_or_else(|| report!(RecordError::InvalidData))
            .attach_printable("attendance count overflow")?;

        self.service
            .update_cell(worksheet, position, &count.to_string())
            .await
            .change_context(RecordError::Spreadsheet)?;

        info!("Attendance for {} is now {}", student_id, count);
        Ok(count)
    }

    /// Recomputes the final grade of every row. Every row is computed before anything is written,
    /// so one bad row leaves the sheet untouched. Returns the number of rows written.
    #[instrument(skip(self, schema))]
    pub async fn compute_final_grades(
        &self,
        worksheet: &WorksheetHandle,
        schema: &GradebookSchema,
    ) -> error_stack::Result<usize, RecordError> {
        let values = self
            .service
            .get_all_values(worksheet)
            .await
            .change_context(RecordError::Spreadsheet)?;

        let grades = records(&values, schema)
            .map(|record| {
                Ok(format_number(final_grade(
                    record.number(GradebookField::Assignment1)?,
                    record.number(GradebookField::Quiz1)?,
                    record.number(GradebookField::Exam1)?,
                )))
            })
            .collect::<Result<Vec<String>, RecordFieldError>>()
            .change_context(RecordError::InvalidData)?;

        self.write_derived_column(worksheet, schema, GradebookField::FinalGrade, &grades)
            .await?;

        info!("Final grades computed for {} rows", grades.len());
        Ok(grades.len())
    }

    /// Recomputes `Attendance %` from the attendance count of every row. Same all-or-nothing
    /// behaviour as [`GradebookService::compute_final_grades`].
    #[instrument(skip(self, schema))]
    pub async fn compute_attendance_percentage(
        &self,
        worksheet: &WorksheetHandle,
        schema: &GradebookSchema,
        total_classes: u32,
    ) -> error_stack::Result<usize, RecordError> {
        if total_classes == 0 {
            return Err(report!(RecordError::InvalidData))
                .attach_printable("total classes must be greater than zero");
        }

        let values = self
            .service
            .get_all_values(worksheet)
            .await
            .change_context(RecordError::Spreadsheet)?;

        let percentages = records(&values, schema)
            .map(|record| {
                record
                    .number(GradebookField::Attendance)
                    .map(|attended| format_number(attendance_percentage(attended, total_classes)))
            })
            .collect::<Result<Vec<_>, _>>()
            .change_context(RecordError::InvalidData)?;

        self.write_derived_column(
            worksheet,
            schema,
            GradebookField::AttendancePercentage,
            &percentages,
        )
        .await?;

        info!("Attendance percentage computed for {} rows", percentages.len());
        Ok(percentages.len())
    }

    async fn write_derived_column(
        &self,
        worksheet: &WorksheetHandle,
        schema: &GradebookSchema,
        field: GradebookField,
        values: &[String],
    ) -> error_stack::Result<(), RecordError> {
        if values.is_empty() {
            return Ok(());
        }

        // Records start right below the header row.
        let start = CellPosition::new(Row::from_index(1), schema.column(field));
        self.service
            .update_column(worksheet, start, values)
            .await
            .change_context(RecordError::Spreadsheet)
            .attach_printable_lazy(|| format!("writing '{}' from {}", field, start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemorySpreadsheetService, Operation};
    use crate::ports::spreadsheet_service::SpreadsheetError;

    const HEADER: &[&str] = &[
        "Student ID",
        "Name",
        "Assignment 1",
        "Quiz 1",
        "Exam 1",
        "Final Grade",
        "Attendance",
        "Attendance %",
    ];

    struct Fixture {
        memory: Arc<MemorySpreadsheetService>,
        gradebook: GradebookService,
        worksheet: WorksheetHandle,
        schema: GradebookSchema,
    }

    async fn fixture(rows: &[&[&str]]) -> Fixture {
        let memory = Arc::new(MemorySpreadsheetService::new());
        let spreadsheet = memory.create("grades").await.unwrap();
        let gradebook = GradebookService::new(memory.clone(), spreadsheet);
        let worksheet = gradebook.create_worksheet("Period 1", 20, 8).await.unwrap();

        let mut content = vec![HEADER];
        content.extend_from_slice(rows);
        memory.fill(&worksheet, &content).await;

        Fixture {
            memory,
            gradebook,
            worksheet,
            schema: GradebookSchema::resolve(
                &HEADER.iter().map(|h| h.to_string()).collect::<Vec<_>>(),
            )
            .unwrap(),
        }
    }

    async fn cell(f: &Fixture, a1: (usize, usize)) -> String {
        f.memory
            .cell(&f.worksheet, CellPosition::from_indices(a1.0, a1.1))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_then_list_adds_exactly_one() {
        let memory = Arc::new(MemorySpreadsheetService::new());
        let spreadsheet = memory.create("grades").await.unwrap();
        let gradebook = GradebookService::new(memory, spreadsheet);

        let before = gradebook.list_worksheets().await.unwrap();
        let created = gradebook.create_worksheet("Period 2", 50, 10).await.unwrap();
        let after = gradebook.list_worksheets().await.unwrap();

        assert_eq!(after.len(), before.len() + 1);
        assert!(after.iter().any(|w| w.title == "Period 2"));
        assert_eq!(created.row_count, 50);
        assert_eq!(created.column_count, 10);
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_requests() {
        let memory = Arc::new(MemorySpreadsheetService::new());
        let spreadsheet = memory.create("grades").await.unwrap();
        let gradebook = GradebookService::new(memory, spreadsheet);

        for (title, rows, cols) in [("  ", 10, 10), ("T", 0, 10), ("T", 10, 0)] {
            let err = gradebook
                .create_worksheet(title, rows, cols)
                .await
                .unwrap_err();
            assert!(matches!(
                err.current_context(),
                WorksheetError::InvalidRequest(_)
            ));
        }
    }

    #[tokio::test]
    async fn test_list_failure_is_distinguishable_from_empty() {
        let f = fixture(&[]).await;
        f.memory
            .fail_next(Operation::Worksheets, SpreadsheetError::Transient)
            .await;

        let err = f.gradebook.list_worksheets().await.unwrap_err();
        assert!(matches!(err.current_context(), WorksheetError::List));
        assert_eq!(
            err.downcast_ref::<SpreadsheetError>(),
            Some(&SpreadsheetError::Transient)
        );
    }

    #[tokio::test]
    async fn test_fetch_all_values_pads_rows() {
        let f = fixture(&[&["s1", "Ana"]]).await;
        let values = f.gradebook.fetch_all_values(&f.worksheet).await.unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values[1].len(), 8);
        assert_eq!(values[1][7], "");
    }

    #[tokio::test]
    async fn test_find_is_row_major() {
        let f = fixture(&[&["s1", "s2"], &["s2", "Bo"]]).await;
        let position = f.gradebook.find(&f.worksheet, "s2").await.unwrap();
        assert_eq!(position.map(|p| p.to_string()), Some("B2".to_string()));
        assert_eq!(f.gradebook.find(&f.worksheet, "zz").await.unwrap(), None);
        assert_eq!(f.gradebook.find(&f.worksheet, "").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_update_grade_writes_in_student_row() {
        let f = fixture(&[&["s1", "Ana"], &["s2", "Bo"]]).await;

        let position = f
            .gradebook
            .update_grade(&f.worksheet, "s2", "D".parse().unwrap(), " 88 ")
            .await
            .unwrap();

        assert_eq!(position.to_string(), "D3");
        assert_eq!(cell(&f, (2, 3)).await, "88");
    }

    #[tokio::test]
    async fn test_update_grade_unknown_student() {
        let f = fixture(&[&["s1", "Ana"]]).await;
        let err = f
            .gradebook
            .update_grade(&f.worksheet, "s9", Column::from_index(2), "90")
            .await
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &RecordError::StudentNotFound("s9".to_string())
        );
        assert_eq!(f.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_update_grade_outside_grid_is_rejected() {
        let f = fixture(&[&["s1", "Ana"]]).await;
        let err = f
            .gradebook
            .update_grade(&f.worksheet, "s1", "Z".parse().unwrap(), "90")
            .await
            .unwrap_err();
        assert_eq!(err.current_context(), &RecordError::Spreadsheet);
        assert_eq!(
            err.downcast_ref::<SpreadsheetError>(),
            Some(&SpreadsheetError::InvalidInput)
        );
    }

    #[tokio::test]
    async fn test_update_attendance_increments() {
        let f = fixture(&[&["s1", "Ana", "", "", "", "", "4"]]).await;

        let count = f
            .gradebook
            .update_attendance(&f.worksheet, &f.schema, "s1")
            .await
            .unwrap();
        assert_eq!(count, 5);
        assert_eq!(cell(&f, (1, 6)).await, "5");

        for _ in 0..2 {
            f.gradebook
                .update_attendance(&f.worksheet, &f.schema, "s1")
                .await
                .unwrap();
        }
        assert_eq!(cell(&f, (1, 6)).await, "7");
    }

    #[tokio::test]
    async fn test_update_attendance_rejects_non_integer() {
        let f = fixture(&[&["s1", "Ana", "", "", "", "", "four"], &["s2", "Bo"]]).await;

        let err = f
            .gradebook
            .update_attendance(&f.worksheet, &f.schema, "s1")
            .await
            .unwrap_err();
        assert_eq!(
            err.current_context(),
            &RecordError::NotAnInteger {
                position: "G2".to_string(),
                value: "four".to_string()
            }
        );

        // An empty cell is not a number either.
        let err = f
            .gradebook
            .update_attendance(&f.worksheet, &f.schema, "s2")
            .await
            .unwrap_err();
        assert!(matches!(
            err.current_context(),
            RecordError::NotAnInteger { .. }
        ));
        assert_eq!(f.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_compute_final_grades() {
        let f = fixture(&[
            &["s1", "Ana", "80", "90", "70"],
            &["s2", "Bo", "100", "100", "100"],
            &["s3", "Cy", "33", "67", "66.67"],
        ])
        .await;

        let rows = f
            .gradebook
            .compute_final_grades(&f.worksheet, &f.schema)
            .await
            .unwrap();

        assert_eq!(rows, 3);
        assert_eq!(cell(&f, (1, 5)).await, "79.0");
        assert_eq!(cell(&f, (2, 5)).await, "100.0");
        assert_eq!(cell(&f, (3, 5)).await, "56.67");
    }

    #[tokio::test]
    async fn test_compute_final_grades_aborts_on_bad_row() {
        let f = fixture(&[
            &["s1", "Ana", "80", "90", "70"],
            &["s2", "Bo", "80", "absent", "70"],
        ])
        .await;

        let err = f
            .gradebook
            .compute_final_grades(&f.worksheet, &f.schema)
            .await
            .unwrap_err();

        assert_eq!(err.current_context(), &RecordError::InvalidData);
        assert_eq!(
            err.downcast_ref::<RecordFieldError>(),
            Some(&RecordFieldError::NotNumeric {
                row: 3,
                field: "Quiz 1",
                value: "absent".to_string()
            })
        );
        assert_eq!(cell(&f, (1, 5)).await, "");
        assert_eq!(f.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_compute_on_header_only_sheet_writes_nothing() {
        let f = fixture(&[]).await;
        let rows = f
            .gradebook
            .compute_final_grades(&f.worksheet, &f.schema)
            .await
            .unwrap();
        assert_eq!(rows, 0);
        assert_eq!(f.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_compute_attendance_percentage() {
        let f = fixture(&[
            &["s1", "Ana", "", "", "", "", "8"],
            &["s2", "Bo", "", "", "", "", "10"],
            &["s3", "Cy", "", "", "", "", "0"],
        ])
        .await;

        let rows = f
            .gradebook
            .compute_attendance_percentage(&f.worksheet, &f.schema, 10)
            .await
            .unwrap();

        assert_eq!(rows, 3);
        assert_eq!(cell(&f, (1, 7)).await, "80.0");
        assert_eq!(cell(&f, (2, 7)).await, "100.0");
        assert_eq!(cell(&f, (3, 7)).await, "0.0");
    }

    #[tokio::test]
    async fn test_compute_attendance_percentage_missing_count() {
        let f = fixture(&[&["s1", "Ana", "", "", "", "", "8"], &["s2", "Bo"]]).await;

        let err = f
            .gradebook
            .compute_attendance_percentage(&f.worksheet, &f.schema, 10)
            .await
            .unwrap_err();

        assert_eq!(
            err.downcast_ref::<RecordFieldError>(),
            Some(&RecordFieldError::Missing {
                row: 3,
                field: "Attendance"
            })
        );
        assert_eq!(cell(&f, (1, 7)).await, "");
    }
}
