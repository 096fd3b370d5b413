pub mod spreadsheet_service;
