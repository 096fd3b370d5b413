use std::io::{BufRead, Write};

use error_stack::ResultExt;
use gradebook_core::{
    application::{
        gradebook_service::{GradebookService, RecordError},
        selection::{pick_worksheet, SelectionError},
    },
    domain::{
        gradebook::{
            record::RecordFieldError,
            schema::{GradebookSchema, SchemaMismatch},
        },
        sheets::column::Column,
    },
    ports::spreadsheet_service::WorksheetHandle,
};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::menu::{render_menu, MenuChoice};
use crate::prettyprint::render_table;

#[derive(Error, Debug)]
pub enum MenuError {
    #[error("console I/O failed")]
    Io,
}

type MenuResult<T> = error_stack::Result<T, MenuError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Exit,
}

#[derive(Debug)]
struct SelectedWorksheet {
    handle: WorksheetHandle,
    schema: Result<GradebookSchema, SchemaMismatch>,
}

/// Interactive menu over a line-oriented console. End of input at any prompt ends the loop.
pub struct MenuLoop<R, W> {
    gradebook: GradebookService,
    total_classes: u32,
    input: R,
    output: W,
    current: Option<SelectedWorksheet>,
}

impl<R, W> std::fmt::Debug for MenuLoop<R, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MenuLoop")
            .field("gradebook", &self.gradebook)
            .field("current", &self.current)
            .finish()
    }
}

impl<R: BufRead, W: Write> MenuLoop<R, W> {
    pub fn new(gradebook: GradebookService, total_classes: u32, input: R, output: W) -> Self {
        Self {
            gradebook,
            total_classes,
            input,
            output,
            current: None,
        }
    }

    pub fn current_worksheet(&self) -> Option<&WorksheetHandle> {
        self.current.as_ref().map(|selected| &selected.handle)
    }

    pub fn into_output(self) -> W {
        self.output
    }

    #[instrument(skip(self))]
    pub async fn run(&mut self) -> MenuResult<()> {
        info!(
            "Menu started on spreadsheet '{}'",
            self.gradebook.spreadsheet().name
        );

        loop {
            let menu = render_menu(self.current_worksheet().map(|ws| ws.title.as_str()));
            self.print(&menu)?;

            let Some(answer) = self.prompt("Choose an option: ")? else {
                break;
            };

            let Some(choice) = MenuChoice::parse(&answer) else {
                self.println(&format!("Unrecognized option '{}'.", answer.trim()))?;
                continue;
            };

            if self.dispatch(choice).await? == Flow::Exit {
                break;
            }
        }

        info!("Menu finished");
        Ok(())
    }

    async fn dispatch(&mut self, choice: MenuChoice) -> MenuResult<Flow> {
        if choice.requires_worksheet() {
            let Some(selected) = &self.current else {
                self.println("No worksheet selected. Select one first (option 3).")?;
                return Ok(Flow::Continue);
            };
            if let Err(mismatch) = &selected.schema {
                let message = format!("Worksheet '{}': {}", selected.handle.title, mismatch);
                self.println(&message)?;
                return Ok(Flow::Continue);
            }
        }

        match choice {
            MenuChoice::ListWorksheets => self.list_worksheets().await,
            MenuChoice::CreateWorksheet => self.create_worksheet().await,
            MenuChoice::SelectWorksheet => self.select_worksheet().await,
            MenuChoice::UpdateGrade => self.update_grade().await,
            MenuChoice::UpdateAttendance => self.update_attendance().await,
            MenuChoice::ComputeFinalGrades => self.compute_final_grades().await,
            MenuChoice::ComputeAttendancePercentage => self.compute_attendance_percentage().await,
            MenuChoice::Exit => {
                self.println("Goodbye.")?;
                Ok(Flow::Exit)
            }
        }
    }

    async fn list_worksheets(&mut self) -> MenuResult<Flow> {
        match self.gradebook.list_worksheets().await {
            Ok(worksheets) => {
                let listing = render_listing(&worksheets);
                self.print(&listing)?;
            }
            Err(report) => {
                error!("Failed to list worksheets: {:?}", report);
                self.println("Could not list worksheets.")?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn create_worksheet(&mut self) -> MenuResult<Flow> {
        let Some(title) = self.prompt("Worksheet title: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(rows) = self.prompt("Rows: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(cols) = self.prompt("Columns: ")? else {
            return Ok(Flow::Exit);
        };

        let (Ok(rows), Ok(cols)) = (rows.trim().parse::<u32>(), cols.trim().parse::<u32>()) else {
            self.println("Rows and columns must be positive whole numbers.")?;
            return Ok(Flow::Continue);
        };

        match self.gradebook.create_worksheet(&title, rows, cols).await {
            Ok(worksheet) => {
                let message = format!("Worksheet '{}' created.", worksheet.title);
                self.println(&message)?;
            }
            Err(report) => {
                error!("Failed to create worksheet: {:?}", report);
                let message = format!("Could not create worksheet: {}", report.current_context());
                self.println(&message)?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn select_worksheet(&mut self) -> MenuResult<Flow> {
        let worksheets = match self.gradebook.list_worksheets().await {
            Ok(worksheets) => worksheets,
            Err(report) => {
                error!("Failed to list worksheets: {:?}", report);
                self.println(&SelectionError::Listing.to_string())?;
                return Ok(Flow::Continue);
            }
        };

        if worksheets.is_empty() {
            self.println(&SelectionError::NoWorksheets.to_string())?;
            return Ok(Flow::Continue);
        }

        let listing = render_listing(&worksheets);
        self.print(&listing)?;
        let Some(answer) = self.prompt("Worksheet number: ")? else {
            return Ok(Flow::Exit);
        };

        let handle = match pick_worksheet(&worksheets, &answer) {
            Ok(handle) => handle,
            Err(selection_error) => {
                info!("Worksheet selection rejected: {}", selection_error);
                self.println(&format!("Invalid selection: {}", selection_error))?;
                return Ok(Flow::Continue);
            }
        };

        let values = match self.gradebook.fetch_all_values(&handle).await {
            Ok(values) => values,
            Err(report) => {
                error!("Failed to read worksheet '{}': {:?}", handle.title, report);
                self.println(&format!("Could not read worksheet '{}'.", handle.title))?;
                return Ok(Flow::Continue);
            }
        };

        let schema = GradebookSchema::resolve(values.first().map(Vec::as_slice).unwrap_or(&[]));
        if let Err(mismatch) = &schema {
            warn!("Worksheet '{}' is not a gradebook: {}", handle.title, mismatch);
        }

        self.println(&format!("Selected worksheet '{}'.", handle.title))?;
        self.print(&render_table(&values))?;
        if let Err(mismatch) = &schema {
            self.println(&format!("Note: {}", mismatch))?;
        }

        self.current = Some(SelectedWorksheet { handle, schema });
        Ok(Flow::Continue)
    }

    async fn update_grade(&mut self) -> MenuResult<Flow> {
        let Some(student_id) = self.prompt("Student ID: ")? else {
            return Ok(Flow::Exit);
        };
        let Some(column) = self.prompt("Column (number or letters): ")? else {
            return Ok(Flow::Exit);
        };
        let Some(grade) = self.prompt("Grade: ")? else {
            return Ok(Flow::Exit);
        };

        let column = match column.parse::<Column>() {
            Ok(column) => column,
            Err(parse_error) => {
                self.println(&format!("Invalid column: {}", parse_error))?;
                return Ok(Flow::Continue);
            }
        };

        let Some((worksheet, _)) = self.selection() else {
            return Ok(Flow::Continue);
        };
        let result = self
            .gradebook
            .update_grade(&worksheet, student_id.trim(), column, &grade)
            .await;

        match result {
            Ok(position) => self.println(&format!("Grade updated at {}.", position))?,
            Err(report) => {
                error!("Failed to update grade: {:?}", report);
                self.println(&format!("Could not update grade: {}", report.current_context()))?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn update_attendance(&mut self) -> MenuResult<Flow> {
        let Some(student_id) = self.prompt("Student ID: ")? else {
            return Ok(Flow::Exit);
        };

        let Some((worksheet, schema)) = self.selection() else {
            return Ok(Flow::Continue);
        };
        let result = self
            .gradebook
            .update_attendance(&worksheet, &schema, student_id.trim())
            .await;

        match result {
            Ok(count) => self.println(&format!("Attendance is now {}.", count))?,
            Err(report) => {
                error!("Failed to update attendance: {:?}", report);
                let message = format!("Could not update attendance: {}", report.current_context());
                self.println(&message)?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn compute_final_grades(&mut self) -> MenuResult<Flow> {
        let Some((worksheet, schema)) = self.selection() else {
            return Ok(Flow::Continue);
        };

        match self.gradebook.compute_final_grades(&worksheet, &schema).await {
            Ok(rows) => self.println(&format!("Final grades computed for {} rows.", rows))?,
            Err(report) => {
                error!("Failed to compute final grades: {:?}", report);
                self.println(&describe_record_failure("final grades", &report))?;
            }
        }
        Ok(Flow::Continue)
    }

    async fn compute_attendance_percentage(&mut self) -> MenuResult<Flow> {
        let Some((worksheet, schema)) = self.selection() else {
            return Ok(Flow::Continue);
        };

        let result = self
            .gradebook
            .compute_attendance_percentage(&worksheet, &schema, self.total_classes)
            .await;

        match result {
            Ok(rows) => {
                self.println(&format!("Attendance percentage computed for {} rows.", rows))?
            }
            Err(report) => {
                error!("Failed to compute attendance percentage: {:?}", report);
                self.println(&describe_record_failure("attendance percentage", &report))?;
            }
        }
        Ok(Flow::Continue)
    }

    /// Current worksheet and its schema, cloned so the service can be borrowed alongside.
    fn selection(&self) -> Option<(WorksheetHandle, GradebookSchema)> {
        let selected = self.current.as_ref()?;
        let schema = selected.schema.as_ref().ok()?.clone();
        Some((selected.handle.clone(), schema))
    }

    fn prompt(&mut self, label: &str) -> MenuResult<Option<String>> {
        self.print(label)?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .change_context(MenuError::Io)
            .attach_printable("reading from console")?;

        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
    }

    fn print(&mut self, text: &str) -> MenuResult<()> {
        self.output
            .write_all(text.as_bytes())
            .and_then(|_| self.output.flush())
            .change_context(MenuError::Io)
    }

    fn println(&mut self, text: &str) -> MenuResult<()> {
        self.print(text)?;
        self.print("\n")
    }
}

fn render_listing(worksheets: &[WorksheetHandle]) -> String {
    if worksheets.is_empty() {
        return "No worksheets.\n".to_string();
    }

    worksheets
        .iter()
        .enumerate()
        .map(|(index, ws)| {
            format!(
                "{}. {} ({} rows x {} columns)\n",
                index + 1,
                ws.title,
                ws.row_count,
                ws.column_count
            )
        })
        .collect()
}

/// Short operator message for a failed batch computation, naming the offending row when known.
fn describe_record_failure(what: &str, report: &error_stack::Report<RecordError>) -> String {
    match report.downcast_ref::<RecordFieldError>() {
        Some(field_error) => format!(
            "Could not compute {}: {}. Nothing was written.",
            what, field_error
        ),
        None => format!("Could not compute {}: {}", what, report.current_context()),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use gradebook_core::{
        adapters::memory::{MemorySpreadsheetService, Operation},
        domain::sheets::cell_position::CellPosition,
        ports::spreadsheet_service::{SpreadsheetError, SpreadsheetService},
    };

    use super::*;

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

    struct Harness {
        memory: Arc<MemorySpreadsheetService>,
        worksheet: WorksheetHandle,
    }

    async fn harness(rows: &[&[&str]]) -> Harness {
        let memory = Arc::new(MemorySpreadsheetService::new());
        let spreadsheet = memory.create("grades").await.unwrap();
        let worksheet = memory
            .worksheets(&spreadsheet)
            .await
            .unwrap()
            .remove(0);
        let mut content = vec![HEADER];
        content.extend_from_slice(rows);
        memory.fill(&worksheet, &content).await;
        Harness { memory, worksheet }
    }

    async fn menu(h: &Harness, script: &str) -> MenuLoop<Cursor<Vec<u8>>, Vec<u8>> {
        let service: Arc<dyn SpreadsheetService> = h.memory.clone();
        let spreadsheet = h.memory.open("grades").await.unwrap();
        MenuLoop::new(
            GradebookService::new(service, spreadsheet),
            10,
            Cursor::new(script.as_bytes().to_vec()),
            Vec::new(),
        )
    }

    async fn run(h: &Harness, script: &str) -> (Option<String>, String) {
        let mut menu = menu(h, script).await;
        menu.run().await.unwrap();
        let current = menu.current_worksheet().map(|ws| ws.title.clone());
        let output = String::from_utf8(menu.into_output()).unwrap();
        (current, output)
    }

    async fn cell(h: &Harness, row: usize, col: usize) -> String {
        h.memory
            .cell(&h.worksheet, CellPosition::from_indices(row, col))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_eof_without_selection_exits_cleanly() {
        let h = harness(&[]).await;
        let (current, output) = run(&h, "").await;
        assert_eq!(current, None);
        assert!(output.contains("8. Exit"));
    }

    #[tokio::test]
    async fn test_eof_with_selection_exits_cleanly() {
        let h = harness(&[&["s1", "Ana"]]).await;
        let (current, _) = run(&h, "3\n1\n").await;
        assert_eq!(current, Some("Sheet1".to_string()));
    }

    #[tokio::test]
    async fn test_eof_inside_operation_prompt_exits() {
        let h = harness(&[&["s1", "Ana"]]).await;
        let (_, output) = run(&h, "3\n1\n4\ns1\n").await;
        assert!(output.ends_with("Column (number or letters): "));
        assert_eq!(h.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_unrecognized_command_redisplays_menu() {
        let h = harness(&[]).await;
        let (current, output) = run(&h, "42\nhello\n8\n").await;
        assert_eq!(current, None);
        assert!(output.contains("Unrecognized option '42'."));
        assert!(output.contains("Unrecognized option 'hello'."));
        assert_eq!(output.matches("=== Gradebook ===").count(), 3);
        assert!(output.contains("Goodbye."));
    }

    #[tokio::test]
    async fn test_unrecognized_command_keeps_selected_worksheet() {
        let h = harness(&[&["s1", "Ana", "80", "90", "70", "", "8"]]).await;
        let (current, output) = run(&h, "3\n1\nzz\n9\n6\n7\n8\n").await;

        assert_eq!(current, Some("Sheet1".to_string()));
        assert!(output.contains("Unrecognized option 'zz'."));
        assert!(output.contains("Unrecognized option '9'."));
        assert_eq!(output.matches("Worksheet: Sheet1").count(), 5);
        assert_eq!(cell(&h, 1, 5).await, "79.0");
        assert_eq!(cell(&h, 1, 7).await, "80.0");
    }

    #[tokio::test]
    async fn test_record_commands_need_a_worksheet() {
        let h = harness(&[&["s1", "Ana", "80", "90", "70"]]).await;
        let (current, output) = run(&h, "4\n5\n6\n7\n8\n").await;
        assert_eq!(current, None);
        assert_eq!(output.matches("No worksheet selected.").count(), 4);
        assert_eq!(h.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_invalid_selection_keeps_current_worksheet() {
        let h = harness(&[]).await;
        for answer in ["0", "-1", "2", "abc"] {
            let script = format!("3\n{}\n8\n", answer);
            let (current, output) = run(&h, &script).await;
            assert_eq!(current, None, "answer {answer}");
            assert!(output.contains("Invalid selection"), "answer {answer}");
        }

        let (current, _) = run(&h, "3\n1\n3\n5\n8\n").await;
        assert_eq!(current, Some("Sheet1".to_string()));
    }

    #[tokio::test]
    async fn test_select_shows_values() {
        let h = harness(&[&["s1", "Ana"]]).await;
        let (_, output) = run(&h, "3\n1\n8\n").await;
        assert!(output.contains("Selected worksheet 'Sheet1'."));
        assert!(output.contains("Student ID | Name"));
        assert!(output.contains("s1         | Ana"));
        assert!(output.contains("Worksheet: Sheet1"));
    }

    #[tokio::test]
    async fn test_create_and_list_worksheets() {
        let h = harness(&[]).await;
        let (_, output) = run(&h, "2\nPeriod 2\n30\n8\n1\n8\n").await;
        assert!(output.contains("Worksheet 'Period 2' created."));
        assert!(output.contains("2. Period 2 (30 rows x 8 columns)"));
    }

    #[tokio::test]
    async fn test_create_rejects_non_numeric_sizes() {
        let h = harness(&[]).await;
        let (_, output) = run(&h, "2\nPeriod 2\nmany\n8\n8\n").await;
        assert!(output.contains("Rows and columns must be positive whole numbers."));
        let listing = run(&h, "1\n8\n").await.1;
        assert!(!listing.contains("Period 2"));
    }

    #[tokio::test]
    async fn test_list_failure_is_reported() {
        let h = harness(&[]).await;
        h.memory
            .fail_next(Operation::Worksheets, SpreadsheetError::Transient)
            .await;
        let (_, output) = run(&h, "1\n8\n").await;
        assert!(output.contains("Could not list worksheets."));
    }

    #[tokio::test]
    async fn test_full_session() {
        let h = harness(&[
            &["s1", "Ana", "80", "", "70", "", "4"],
            &["s2", "Bo", "100", "100", "100", "", "8"],
        ])
        .await;

        let script = "3\n1\n\
                      4\ns1\nD\n90\n\
                      5\ns1\n\
                      6\n\
                      7\n\
                      8\n";
        let (_, output) = run(&h, script).await;

        assert!(output.contains("Grade updated at D2."));
        assert!(output.contains("Attendance is now 5."));
        assert!(output.contains("Final grades computed for 2 rows."));
        assert!(output.contains("Attendance percentage computed for 2 rows."));
        assert_eq!(cell(&h, 1, 5).await, "79.0");
        assert_eq!(cell(&h, 2, 5).await, "100.0");
        assert_eq!(cell(&h, 1, 7).await, "50.0");
        assert_eq!(cell(&h, 2, 7).await, "80.0");
    }

    #[tokio::test]
    async fn test_failed_computation_keeps_the_loop_running() {
        let h = harness(&[&["s1", "Ana", "80", "absent", "70"]]).await;
        let (current, output) = run(&h, "3\n1\n6\n8\n").await;
        assert_eq!(current, Some("Sheet1".to_string()));
        assert!(output.contains("'Quiz 1' is not a number"));
        assert!(output.contains("Nothing was written."));
        assert!(output.contains("Goodbye."));
        assert_eq!(h.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_unknown_student_and_bad_column() {
        let h = harness(&[&["s1", "Ana"]]).await;
        let (_, output) = run(&h, "3\n1\n4\ns9\nC\n90\n4\ns1\n0\n90\n8\n").await;
        assert!(output.contains("Could not update grade: student 's9' not found"));
        assert!(output.contains("Invalid column"));
        assert_eq!(h.memory.write_count().await, 0);
    }

    #[tokio::test]
    async fn test_schema_mismatch_blocks_record_commands() {
        let memory = Arc::new(MemorySpreadsheetService::new());
        let spreadsheet = memory.create("grades").await.unwrap();
        let worksheet = memory.worksheets(&spreadsheet).await.unwrap().remove(0);
        memory
            .fill(&worksheet, &[&["Student ID", "Name", "Quiz 1"], &["s1", "Ana", "9"]])
            .await;
        let h = Harness { memory, worksheet };

        let (current, output) = run(&h, "3\n1\n5\n6\n8\n").await;
        assert_eq!(current, Some("Sheet1".to_string()));
        assert!(output.contains("missing columns: Assignment 1, Exam 1"));
        assert_eq!(
            output
                .matches("Worksheet 'Sheet1': worksheet header does not match")
                .count(),
            2
        );
        assert_eq!(h.memory.write_count().await, 0);
    }
}
