use strum::{EnumIter, IntoEnumIterator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, strum::Display)]
pub enum MenuChoice {
    #[strum(to_string = "List worksheets")]
    ListWorksheets,
    #[strum(to_string = "Create worksheet")]
    CreateWorksheet,
    #[strum(to_string = "Select worksheet")]
    SelectWorksheet,
    #[strum(to_string = "Update grade")]
    UpdateGrade,
    #[strum(to_string = "Update attendance")]
    UpdateAttendance,
    #[strum(to_string = "Compute final grades")]
    ComputeFinalGrades,
    #[strum(to_string = "Compute attendance percentage")]
    ComputeAttendancePercentage,
    #[strum(to_string = "Exit")]
    Exit,
}

impl MenuChoice {
    pub fn key(&self) -> u8 {
        match self {
            MenuChoice::ListWorksheets => 1,
            MenuChoice::CreateWorksheet => 2,
            MenuChoice::SelectWorksheet => 3,
            MenuChoice::UpdateGrade => 4,
            MenuChoice::UpdateAttendance => 5,
            MenuChoice::ComputeFinalGrades => 6,
            MenuChoice::ComputeAttendancePercentage => 7,
            MenuChoice::Exit => 8,
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let key = input.trim().parse::<u8>().ok()?;
        MenuChoice::iter().find(|choice| choice.key() == key)
    }

    pub fn requires_worksheet(&self) -> bool {
        matches!(
            self,
            MenuChoice::UpdateGrade
                | MenuChoice::UpdateAttendance
                | MenuChoice::ComputeFinalGrades
                | MenuChoice::ComputeAttendancePercentage
        )
    }
}

pub fn render_menu(current_worksheet: Option<&str>) -> String {
    let mut menu = String::from("\n=== Gradebook ===\n");
    if let Some(title) = current_worksheet {
        menu.push_str(&format!("Worksheet: {}\n", title));
    }
    for choice in MenuChoice::iter() {
        menu.push_str(&format!("{}. {}\n", choice.key(), choice));
    }
    menu
}
