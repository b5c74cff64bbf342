//! Tabular renderers over the printable area.
//!
//! Both renderers iterate rows 0..rows and cols 0..cols of the sheet's
//! printable size, writing a tab between fields and a newline after each
//! row. Positions without a cell render as an empty field.

use std::io::{self, Write};

use crate::position::Position;
use crate::sheet::Sheet;

/// Render evaluated values: numbers per `f64` display, text verbatim,
/// errors by their `#...!` form.
pub fn print_values(sheet: &Sheet, out: &mut impl Write) -> io::Result<()> {
    let size = sheet.printable_size();
    for row in 0..size.rows {
        for col in 0..size.cols {
            if col > 0 {
                out.write_all(b"\t")?;
            }
            if let Ok(Some(value)) = sheet.value(Position::new(row, col)) {
                write!(out, "{}", value)?;
            }
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Render raw cell texts: exactly what was entered for text cells, the
/// canonical formula text for formula cells.
pub fn print_texts(sheet: &Sheet, out: &mut impl Write) -> io::Result<()> {
    let size = sheet.printable_size();
    for row in 0..size.rows {
        for col in 0..size.cols {
            if col > 0 {
                out.write_all(b"\t")?;
            }
            if let Ok(Some(cell)) = sheet.cell(Position::new(row, col)) {
                write!(out, "{}", cell.text())?;
            }
        }
        out.write_all(b"\n")?;
    }
    Ok(())
}
